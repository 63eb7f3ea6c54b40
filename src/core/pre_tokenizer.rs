//! Splitting of normalized text into the words handed to the model.

use super::config::PreTokenizerConfig;
use super::error::{Result, TokenizerError};
use super::pattern::{Pattern, RegexBackend, SplitBehavior};

/// GPT-2 splitting: contractions, letter runs, digit runs, punctuation runs,
/// trailing whitespace and whitespace runs.
pub const BYTE_LEVEL_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

const WHITESPACE_PATTERN: &str = r"\w+|[^\w\s]+";

const BERT_PATTERN: &str = r"\p{L}+|[^\s\p{L}]+";

/// When the Metaspace glyph is prepended to a word that lacks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrependScheme {
    Always,
    /// Only the first word of the first ordinary segment.
    First,
    Never,
}

impl PrependScheme {
    /// `prepend_scheme` wins over the legacy `add_prefix_space` flag.
    pub fn resolve(add_prefix_space: Option<bool>, prepend_scheme: Option<&str>) -> Result<Self> {
        match prepend_scheme {
            Some("always") => Ok(PrependScheme::Always),
            Some("first") => Ok(PrependScheme::First),
            Some("never") => Ok(PrependScheme::Never),
            Some(other) => Err(TokenizerError::config(format!(
                "unknown Metaspace prepend_scheme {other:?}"
            ))),
            None if add_prefix_space.unwrap_or(true) => Ok(PrependScheme::Always),
            None => Ok(PrependScheme::Never),
        }
    }
}

#[derive(Debug)]
pub enum PreTokenizer {
    Sequence(Vec<PreTokenizer>),
    WhitespaceSplit,
    /// Also backs `Whitespace`, `BertPreTokenizer` and `Digits`.
    ///
    /// `pattern` is `None` when the configured shape was not understood; such
    /// a splitter yields no words.
    Split {
        pattern: Option<Pattern>,
        behavior: SplitBehavior,
        invert: bool,
    },
    ByteLevel {
        add_prefix_space: bool,
        regex: Option<RegexBackend>,
    },
    Metaspace {
        replacement: String,
        prepend_scheme: PrependScheme,
        split: bool,
    },
}

impl PreTokenizer {
    pub fn from_config(config: &PreTokenizerConfig) -> Result<Self> {
        Ok(match config {
            PreTokenizerConfig::Sequence { pretokenizers } => PreTokenizer::Sequence(
                pretokenizers
                    .iter()
                    .map(PreTokenizer::from_config)
                    .collect::<Result<_>>()?,
            ),
            PreTokenizerConfig::WhitespaceSplit {} => PreTokenizer::WhitespaceSplit,
            PreTokenizerConfig::Whitespace {} => Self::matching(WHITESPACE_PATTERN)?,
            PreTokenizerConfig::BertPreTokenizer {} => Self::matching(BERT_PATTERN)?,
            PreTokenizerConfig::ByteLevel {
                add_prefix_space,
                use_regex,
            } => PreTokenizer::ByteLevel {
                add_prefix_space: *add_prefix_space,
                regex: if *use_regex {
                    Some(RegexBackend::new(BYTE_LEVEL_PATTERN)?)
                } else {
                    None
                },
            },
            PreTokenizerConfig::Metaspace {
                replacement,
                str_rep,
                add_prefix_space,
                prepend_scheme,
                split,
            } => PreTokenizer::Metaspace {
                replacement: str_rep.clone().unwrap_or_else(|| replacement.clone()),
                prepend_scheme: PrependScheme::resolve(
                    *add_prefix_space,
                    prepend_scheme.as_deref(),
                )?,
                split: *split,
            },
            PreTokenizerConfig::Split {
                pattern,
                behavior,
                invert,
            } => PreTokenizer::Split {
                pattern: Pattern::from_config(pattern)?,
                behavior: *behavior,
                invert: *invert,
            },
            PreTokenizerConfig::Digits { individual_digits } => PreTokenizer::Split {
                pattern: Some(Pattern::Regex(RegexBackend::new(r"\p{N}")?)),
                behavior: if *individual_digits {
                    SplitBehavior::Isolated
                } else {
                    SplitBehavior::Contiguous
                },
                invert: false,
            },
        })
    }

    /// A splitter whose words are exactly the regex matches.
    fn matching(pattern: &str) -> Result<Self> {
        Ok(PreTokenizer::Split {
            pattern: Some(Pattern::Regex(RegexBackend::new(pattern)?)),
            behavior: SplitBehavior::Isolated,
            invert: true,
        })
    }

    /// Whether the model should see byte-remapped words.
    pub fn is_byte_level(&self) -> bool {
        match self {
            PreTokenizer::ByteLevel { .. } => true,
            PreTokenizer::Sequence(children) => children.iter().any(PreTokenizer::is_byte_level),
            _ => false,
        }
    }

    /// Split one ordinary segment. `first_segment` marks the segment that
    /// opens the input, which matters for `PrependScheme::First`.
    pub fn pre_tokenize(&self, text: &str, first_segment: bool) -> Vec<String> {
        self.pre_tokenize_words(vec![text.to_string()], first_segment)
    }

    /// Split every word and flatten, preserving order.
    pub fn pre_tokenize_words(&self, words: Vec<String>, first_segment: bool) -> Vec<String> {
        if let PreTokenizer::Sequence(children) = self {
            return children
                .iter()
                .fold(words, |acc, child| child.pre_tokenize_words(acc, first_segment));
        }
        words
            .iter()
            .enumerate()
            .flat_map(|(i, word)| self.split_word(word, first_segment && i == 0))
            .collect()
    }

    fn split_word(&self, word: &str, is_first: bool) -> Vec<String> {
        if word.is_empty() {
            return Vec::new();
        }
        match self {
            PreTokenizer::Sequence(_) => self.pre_tokenize_words(vec![word.to_string()], is_first),
            PreTokenizer::WhitespaceSplit => word.split_whitespace().map(str::to_string).collect(),
            PreTokenizer::Split {
                pattern,
                behavior,
                invert,
            } => match pattern {
                Some(pattern) => pattern.split(word, *behavior, *invert),
                None => Vec::new(),
            },
            PreTokenizer::ByteLevel {
                add_prefix_space,
                regex,
            } => {
                let text = if *add_prefix_space && !word.starts_with(' ') {
                    format!(" {word}")
                } else {
                    word.to_string()
                };
                match regex {
                    Some(regex) => regex
                        .find_iter(&text)
                        .into_iter()
                        .map(|(start, end)| text[start..end].to_string())
                        .collect(),
                    None => vec![text],
                }
            }
            PreTokenizer::Metaspace {
                replacement,
                prepend_scheme,
                split,
            } => {
                let mut text = word.replace(' ', replacement);
                let prepend = match prepend_scheme {
                    PrependScheme::Always => true,
                    PrependScheme::First => is_first,
                    PrependScheme::Never => false,
                };
                if prepend && !text.starts_with(replacement.as_str()) {
                    text.insert_str(0, replacement);
                }
                if *split {
                    Pattern::Literal(replacement.clone()).split(
                        &text,
                        SplitBehavior::MergedWithNext,
                        false,
                    )
                } else {
                    vec![text]
                }
            }
        }
    }
}
