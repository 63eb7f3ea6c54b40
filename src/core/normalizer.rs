//! String → string normalization applied to every ordinary text segment.

use unicode_normalization::UnicodeNormalization;

use super::config::NormalizerConfig;
use super::error::Result;
use super::pattern::Pattern;

/// A normalization step resolved from its tagged configuration.
#[derive(Debug)]
pub enum Normalizer {
    Sequence(Vec<Normalizer>),
    Bert {
        clean_text: bool,
        handle_chinese_chars: bool,
        strip_accents: Option<bool>,
        lowercase: bool,
    },
    /// `pattern` is `None` when the configured shape was not understood; the
    /// text then passes through untouched.
    Replace {
        pattern: Option<Pattern>,
        content: String,
    },
    Nfc,
    Nfd,
    Nfkc,
    Nfkd,
    StripAccents,
    Lowercase,
    Strip {
        left: bool,
        right: bool,
    },
    Prepend(String),
    /// SentencePiece charsmap; applied as identity.
    Precompiled,
}

impl Normalizer {
    pub fn from_config(config: &NormalizerConfig) -> Result<Self> {
        Ok(match config {
            NormalizerConfig::Sequence { normalizers } => Normalizer::Sequence(
                normalizers
                    .iter()
                    .map(Normalizer::from_config)
                    .collect::<Result<_>>()?,
            ),
            NormalizerConfig::BertNormalizer {
                clean_text,
                handle_chinese_chars,
                strip_accents,
                lowercase,
            } => Normalizer::Bert {
                clean_text: *clean_text,
                handle_chinese_chars: *handle_chinese_chars,
                strip_accents: *strip_accents,
                lowercase: *lowercase,
            },
            NormalizerConfig::Replace { pattern, content } => Normalizer::Replace {
                pattern: Pattern::from_config(pattern)?,
                content: content.clone(),
            },
            NormalizerConfig::NFC {} => Normalizer::Nfc,
            NormalizerConfig::NFD {} => Normalizer::Nfd,
            NormalizerConfig::NFKC {} => Normalizer::Nfkc,
            NormalizerConfig::NFKD {} => Normalizer::Nfkd,
            NormalizerConfig::StripAccents {} => Normalizer::StripAccents,
            NormalizerConfig::Lowercase {} => Normalizer::Lowercase,
            NormalizerConfig::Strip {
                strip_left,
                strip_right,
            } => Normalizer::Strip {
                left: *strip_left,
                right: *strip_right,
            },
            NormalizerConfig::Prepend { prepend } => Normalizer::Prepend(prepend.clone()),
            NormalizerConfig::Precompiled {} => Normalizer::Precompiled,
        })
    }

    pub fn normalize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        match self {
            Normalizer::Sequence(children) => children
                .iter()
                .fold(text.to_string(), |acc, child| child.normalize(&acc)),
            Normalizer::Bert {
                clean_text,
                handle_chinese_chars,
                strip_accents,
                lowercase,
            } => {
                let mut out = if *clean_text {
                    do_clean_text(text)
                } else {
                    text.to_string()
                };
                if *handle_chinese_chars {
                    out = pad_chinese_chars(&out);
                }
                if *lowercase {
                    out = out.to_lowercase();
                    if *strip_accents != Some(false) {
                        out = strip_accents_nfd(&out);
                    }
                } else if *strip_accents == Some(true) {
                    out = strip_accents_nfd(&out);
                }
                out
            }
            Normalizer::Replace { pattern, content } => match pattern {
                Some(pattern) => pattern.replace_all(text, content),
                None => text.to_string(),
            },
            Normalizer::Nfc => text.nfc().collect(),
            Normalizer::Nfd => text.nfd().collect(),
            Normalizer::Nfkc => text.nfkc().collect(),
            Normalizer::Nfkd => text.nfkd().collect(),
            Normalizer::StripAccents => text.chars().filter(|&c| !is_accent_mark(c)).collect(),
            Normalizer::Lowercase => text.to_lowercase(),
            Normalizer::Strip { left, right } => {
                let mut out = text;
                if *left {
                    out = out.trim_start();
                }
                if *right {
                    out = out.trim_end();
                }
                out.to_string()
            }
            Normalizer::Prepend(prefix) => format!("{prefix}{text}"),
            Normalizer::Precompiled => text.to_string(),
        }
    }
}

#[inline]
fn is_accent_mark(ch: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&ch)
}

fn strip_accents_nfd(text: &str) -> String {
    text.nfd().filter(|&c| !is_accent_mark(c)).collect()
}

/// Code points the Bert normalizer surrounds with spaces.
pub(crate) fn is_chinese_char(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2B73F
            | 0x2B740..=0x2B81F
            | 0x2B820..=0x2CEAF
            | 0xF900..=0xFAFF
            | 0x2F800..=0x2FA1F
    )
}

fn pad_chinese_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if is_chinese_char(ch) {
            out.push(' ');
            out.push(ch);
            out.push(' ');
        } else {
            out.push(ch);
        }
    }
    out
}

/// Drop NUL, U+FFFD and control characters; turn any whitespace into `' '`.
fn do_clean_text(text: &str) -> String {
    text.chars()
        .filter(|&ch| {
            let is_control = ch.is_control() && !matches!(ch, '\t' | '\n' | '\r');
            ch != '\0' && ch != '\u{FFFD}' && !is_control
        })
        .map(|ch| if ch.is_whitespace() { ' ' } else { ch })
        .collect()
}
