//! Token strings back to text.

use rustc_hash::FxHashSet;

use super::byte_level::byte_level_decode_lossless;
use super::config::DecoderConfig;
use super::error::Result;
use super::pre_tokenizer::PrependScheme;

/// Text that loses the space in front of it during cleanup.
const CLEANUP_FOLLOWERS: [&str; 9] = [".", "?", "!", ",", "n't", "'m", "'s", "'ve", "'re"];

/// Remove the spaces in front of English punctuation and contraction suffixes.
///
/// A whole run of spaces is removed, so applying this twice changes nothing.
pub fn clean_up_tokenization(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find(' ') {
        out.push_str(&rest[..idx]);
        let after = rest[idx..].trim_start_matches(' ');
        if !CLEANUP_FOLLOWERS.iter().any(|f| after.starts_with(f)) {
            out.push_str(&rest[idx..rest.len() - after.len()]);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone)]
pub enum Decoder {
    WordPiece {
        prefix: String,
        cleanup: bool,
    },
    Metaspace {
        replacement: String,
        prepend_scheme: PrependScheme,
    },
    ByteLevel {
        end_of_word_suffix: Option<String>,
        /// Passed through verbatim instead of being byte-decoded.
        added_tokens: FxHashSet<String>,
    },
}

impl Decoder {
    pub fn from_config<I>(
        config: &DecoderConfig,
        end_of_word_suffix: Option<&str>,
        added_tokens: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        Ok(match config {
            DecoderConfig::WordPiece { prefix, cleanup } => Decoder::WordPiece {
                prefix: prefix.clone(),
                cleanup: *cleanup,
            },
            DecoderConfig::Metaspace {
                replacement,
                add_prefix_space,
                prepend_scheme,
            } => Decoder::Metaspace {
                replacement: replacement.clone(),
                prepend_scheme: PrependScheme::resolve(
                    *add_prefix_space,
                    prepend_scheme.as_deref(),
                )?,
            },
            DecoderConfig::ByteLevel {} => Decoder::ByteLevel {
                end_of_word_suffix: end_of_word_suffix.map(str::to_string),
                added_tokens: added_tokens.into_iter().collect(),
            },
        })
    }

    pub fn decode(&self, tokens: &[String]) -> String {
        match self {
            Decoder::WordPiece { prefix, cleanup } => {
                let joined = tokens.join(" ");
                let text = joined.replace(&format!(" {prefix}"), "");
                let text = text.trim();
                if *cleanup {
                    clean_up_tokenization(text)
                } else {
                    text.to_string()
                }
            }
            Decoder::Metaspace {
                replacement,
                prepend_scheme,
            } => {
                let mut out = String::new();
                for (i, token) in tokens.iter().enumerate() {
                    let piece = token.replace(replacement.as_str(), " ");
                    match piece.strip_prefix(' ') {
                        Some(stripped) if i == 0 && *prepend_scheme != PrependScheme::Never => {
                            out.push_str(stripped)
                        }
                        _ => out.push_str(&piece),
                    }
                }
                out
            }
            Decoder::ByteLevel {
                end_of_word_suffix,
                added_tokens,
            } => {
                let mut out = String::new();
                let mut run = String::new();
                for token in tokens {
                    if added_tokens.contains(token) {
                        flush_byte_run(&mut run, &mut out, end_of_word_suffix.as_deref());
                        out.push_str(token);
                    } else {
                        run.push_str(token);
                    }
                }
                flush_byte_run(&mut run, &mut out, end_of_word_suffix.as_deref());
                if end_of_word_suffix.is_some() {
                    out.trim_end().to_string()
                } else {
                    out
                }
            }
        }
    }

    /// Bytes a single token contributes when output is decoded incrementally.
    ///
    /// `first` marks the first token of the stream, which loses its leading
    /// space the same way [`Decoder::decode`] drops it. Nothing else is
    /// trimmed, and a byte-level token may end in the middle of a UTF-8
    /// sequence.
    pub fn token_bytes(&self, token: &str, first: bool) -> Vec<u8> {
        match self {
            Decoder::WordPiece { prefix, .. } => match token.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.as_bytes().to_vec(),
                None if first => token.as_bytes().to_vec(),
                None => format!(" {token}").into_bytes(),
            },
            Decoder::Metaspace {
                replacement,
                prepend_scheme,
            } => {
                let piece = token.replace(replacement.as_str(), " ");
                match piece.strip_prefix(' ') {
                    Some(stripped) if first && *prepend_scheme != PrependScheme::Never => {
                        stripped.as_bytes().to_vec()
                    }
                    _ => piece.into_bytes(),
                }
            }
            Decoder::ByteLevel {
                end_of_word_suffix, ..
            } => match end_of_word_suffix {
                Some(suffix) if !suffix.is_empty() => {
                    byte_level_decode_lossless(&token.replace(suffix.as_str(), " "))
                }
                _ => byte_level_decode_lossless(token),
            },
        }
    }
}

/// Decode a run of byte-level characters and append it to `out`.
fn flush_byte_run(run: &mut String, out: &mut String, end_of_word_suffix: Option<&str>) {
    if run.is_empty() {
        return;
    }
    let text = match end_of_word_suffix {
        Some(suffix) if !suffix.is_empty() => run.replace(suffix, " "),
        _ => std::mem::take(run),
    };
    let bytes = byte_level_decode_lossless(&text);
    out.push_str(&String::from_utf8_lossy(&bytes));
    run.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(config: serde_json::Value) -> Decoder {
        let config: DecoderConfig = serde_json::from_value(config).unwrap();
        Decoder::from_config(&config, None, Vec::new()).unwrap()
    }

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cleanup() {
        assert_eq!(
            clean_up_tokenization("hello , world ! I do n't know . they 're here"),
            "hello, world! I don't know. they're here"
        );
        assert_eq!(clean_up_tokenization("a  ?"), "a?");
        assert_eq!(clean_up_tokenization("keep  spaces"), "keep  spaces");
    }

    #[test]
    fn test_cleanup_idempotent() {
        let once = clean_up_tokenization("x , y 's . z n't");
        assert_eq!(clean_up_tokenization(&once), once);
    }

    #[test]
    fn test_wordpiece() {
        let d = build(json!({"type": "WordPiece", "prefix": "##", "cleanup": true}));
        assert_eq!(d.decode(&tokens(&["he", "##llo", "world", "!"])), "hello world!");
        let d = build(json!({"type": "WordPiece", "cleanup": false}));
        assert_eq!(d.decode(&tokens(&["he", "##llo", "!"])), "hello !");
    }

    #[test]
    fn test_metaspace_drops_one_leading_space() {
        let d = build(json!({
            "type": "Metaspace",
            "replacement": "\u{2581}",
            "add_prefix_space": true
        }));
        assert_eq!(d.decode(&tokens(&["\u{2581}Hey", "\u{2581}friend"])), "Hey friend");
        let d = build(json!({"type": "Metaspace", "add_prefix_space": false}));
        assert_eq!(d.decode(&tokens(&["\u{2581}Hey", "\u{2581}friend"])), " Hey friend");
    }

    #[test]
    fn test_byte_level_runs_and_added_tokens() {
        let config: DecoderConfig = serde_json::from_value(json!({"type": "ByteLevel"})).unwrap();
        let d = Decoder::from_config(&config, None, vec!["<|endoftext|>".to_string()]).unwrap();
        assert_eq!(
            d.decode(&tokens(&["Hello", "\u{120}w", "orld", "<|endoftext|>", "\u{120}Ã", "©"])),
            "Hello world<|endoftext|> é"
        );
    }

    #[test]
    fn test_byte_level_end_of_word_suffix() {
        let config: DecoderConfig = serde_json::from_value(json!({"type": "ByteLevel"})).unwrap();
        let d = Decoder::from_config(&config, Some("</w>"), Vec::new()).unwrap();
        assert_eq!(d.decode(&tokens(&["hi</w>", "there</w>"])), "hi there");
    }

    #[test]
    fn test_token_bytes() {
        let d = build(json!({"type": "ByteLevel"}));
        assert_eq!(d.token_bytes("\u{120}Ã", false), [b' ', 0xC3]);
        assert_eq!(d.token_bytes("\u{120}Ã", true), [b' ', 0xC3]);
        let d = build(json!({"type": "WordPiece"}));
        assert_eq!(d.token_bytes("##llo", false), b"llo");
        assert_eq!(d.token_bytes("world", false), b" world");
        let d = build(json!({"type": "Metaspace"}));
        assert_eq!(d.token_bytes("\u{2581}hi", false), b" hi");
    }

    #[test]
    fn test_first_token_bytes_match_decode() {
        let d = build(json!({"type": "WordPiece"}));
        assert_eq!(d.token_bytes("he", true), b"he");
        assert_eq!(d.token_bytes("##llo", true), b"llo");
        let d = build(json!({"type": "Metaspace", "add_prefix_space": true}));
        assert_eq!(d.token_bytes("\u{2581}hi", true), b"hi");
        let d = build(json!({"type": "Metaspace", "prepend_scheme": "never"}));
        assert_eq!(d.token_bytes("\u{2581}hi", true), b" hi");
    }

    #[test]
    fn test_byte_level_invalid_utf8_is_replaced() {
        let d = build(json!({"type": "ByteLevel"}));
        // lone 0xC3 lead byte
        assert_eq!(d.decode(&tokens(&["Ã"])), "\u{FFFD}");
    }
}
