//! Typed view of the two tokenizer manifests.
//!
//! A tokenizer ships as a definition document (`tokenizer.json`) and a settings
//! document (`tokenizer_config.json`):
//!
//! ```text
//! {
//!   "normalizer":     { "type": "Sequence" | "BertNormalizer" | "Replace" | ... },
//!   "pre_tokenizer":  { "type": "Sequence" | "ByteLevel" | "Metaspace" | ... },
//!   "model":          { "type": "WordPiece" | "BPE" | "Unigram", "vocab": ... },
//!   "post_processor": { "type": "TemplateProcessing" | "RobertaProcessing" | ... },
//!   "decoder":        { "type": "WordPiece" | "Metaspace" | "ByteLevel" },
//!   "added_tokens":   [ { "id": 0, "content": "[PAD]", "special": true }, ... ]
//! }
//! ```
//!
//! Every stage is an internally tagged enum, so an unknown `type` fails while
//! the document is read and never at encode time. Pattern objects stay as raw
//! JSON because an unrecognized pattern shape is tolerated (see
//! [`Pattern::from_config`](super::pattern::Pattern::from_config)).

use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::pattern::SplitBehavior;
use super::wordpiece::DEFAULT_CONTINUING_SUBWORD_PREFIX;

fn default_true() -> bool {
    true
}

fn default_unk_token() -> String {
    "[UNK]".to_string()
}

fn default_continuing_subword_prefix() -> String {
    DEFAULT_CONTINUING_SUBWORD_PREFIX.to_string()
}

fn default_max_input_chars_per_word() -> usize {
    100
}

fn default_replacement() -> String {
    "\u{2581}".to_string()
}

/// Root of the definition document.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenizerJson {
    #[serde(default)]
    pub normalizer: Option<NormalizerConfig>,
    #[serde(default)]
    pub pre_tokenizer: Option<PreTokenizerConfig>,
    pub model: ModelConfig,
    #[serde(default)]
    pub post_processor: Option<PostProcessorConfig>,
    #[serde(default)]
    pub decoder: Option<DecoderConfig>,
    #[serde(default)]
    pub added_tokens: Vec<AddedToken>,
}

/// A token registered on top of the model vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddedToken {
    pub id: u32,
    pub content: String,
    #[serde(default)]
    pub special: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum NormalizerConfig {
    Sequence {
        normalizers: Vec<NormalizerConfig>,
    },
    BertNormalizer {
        #[serde(default = "default_true")]
        clean_text: bool,
        #[serde(default = "default_true")]
        handle_chinese_chars: bool,
        #[serde(default)]
        strip_accents: Option<bool>,
        #[serde(default = "default_true")]
        lowercase: bool,
    },
    Replace {
        #[serde(default)]
        pattern: Value,
        #[serde(default)]
        content: String,
    },
    NFC {},
    NFD {},
    NFKC {},
    NFKD {},
    StripAccents {},
    Lowercase {},
    Strip {
        #[serde(default = "default_true")]
        strip_left: bool,
        #[serde(default = "default_true")]
        strip_right: bool,
    },
    Prepend {
        prepend: String,
    },
    Precompiled {},
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PreTokenizerConfig {
    Sequence {
        pretokenizers: Vec<PreTokenizerConfig>,
    },
    WhitespaceSplit {},
    Whitespace {},
    BertPreTokenizer {},
    ByteLevel {
        #[serde(default)]
        add_prefix_space: bool,
        #[serde(default = "default_true")]
        use_regex: bool,
    },
    Metaspace {
        #[serde(default = "default_replacement")]
        replacement: String,
        #[serde(default)]
        str_rep: Option<String>,
        #[serde(default)]
        add_prefix_space: Option<bool>,
        #[serde(default)]
        prepend_scheme: Option<String>,
        #[serde(default = "default_true")]
        split: bool,
    },
    Split {
        #[serde(default)]
        pattern: Value,
        #[serde(default)]
        behavior: SplitBehavior,
        #[serde(default)]
        invert: bool,
    },
    Digits {
        #[serde(default)]
        individual_digits: bool,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ModelConfig {
    WordPiece {
        vocab: FxHashMap<String, u32>,
        #[serde(default = "default_unk_token")]
        unk_token: String,
        #[serde(default = "default_continuing_subword_prefix")]
        continuing_subword_prefix: String,
        #[serde(default = "default_max_input_chars_per_word")]
        max_input_chars_per_word: usize,
    },
    BPE {
        vocab: FxHashMap<String, u32>,
        #[serde(default)]
        merges: Vec<MergeEntry>,
        #[serde(default)]
        unk_token: Option<String>,
        #[serde(default)]
        end_of_word_suffix: Option<String>,
    },
    Unigram {
        vocab: Vec<(String, f64)>,
        #[serde(default)]
        unk_id: Option<u32>,
    },
}

/// One merge rule: the legacy `"a b"` string or the `["a", "b"]` pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MergeEntry {
    Joined(String),
    Pair(String, String),
}

impl MergeEntry {
    pub fn pair(&self) -> Option<(&str, &str)> {
        match self {
            MergeEntry::Joined(joined) => joined.split_once(' '),
            MergeEntry::Pair(left, right) => Some((left, right)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PostProcessorConfig {
    TemplateProcessing {
        single: Vec<TemplateItem>,
        #[serde(default)]
        pair: Vec<TemplateItem>,
        #[serde(default)]
        special_tokens: FxHashMap<String, TemplateSpecialToken>,
    },
    RobertaProcessing {
        sep: (String, u32),
        cls: (String, u32),
    },
    BertProcessing {
        sep: (String, u32),
        cls: (String, u32),
    },
    ByteLevel {},
    Sequence {
        processors: Vec<PostProcessorConfig>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub enum TemplateItem {
    SpecialToken {
        id: String,
        #[serde(default)]
        type_id: u32,
    },
    Sequence {
        id: SequenceId,
        #[serde(default)]
        type_id: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SequenceId {
    A,
    B,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSpecialToken {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub ids: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum DecoderConfig {
    WordPiece {
        #[serde(default = "default_continuing_subword_prefix")]
        prefix: String,
        #[serde(default = "default_true")]
        cleanup: bool,
    },
    Metaspace {
        #[serde(default = "default_replacement")]
        replacement: String,
        #[serde(default)]
        add_prefix_space: Option<bool>,
        #[serde(default)]
        prepend_scheme: Option<String>,
    },
    ByteLevel {},
}

/// Which end of a sequence padding or truncation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    #[default]
    Right,
}

/// A settings token: either `"<pad>"` or `{"content": "<pad>", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TokenSpec {
    Plain(String),
    Wrapped { content: String },
}

impl TokenSpec {
    pub fn content(&self) -> &str {
        match self {
            TokenSpec::Plain(content) | TokenSpec::Wrapped { content } => content,
        }
    }
}

/// Root of the settings document.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenizerSettings {
    #[serde(default, deserialize_with = "deserialize_max_length")]
    pub model_max_length: Option<usize>,
    #[serde(default)]
    pub pad_token: Option<TokenSpec>,
    #[serde(default)]
    pub eos_token: Option<TokenSpec>,
    #[serde(default)]
    pub mask_token: Option<TokenSpec>,
    #[serde(default)]
    pub sep_token: Option<TokenSpec>,
    #[serde(default)]
    pub remove_space: bool,
    #[serde(default = "default_true")]
    pub clean_up_tokenization_spaces: bool,
    #[serde(default)]
    pub padding_side: Side,
    #[serde(default)]
    pub truncation_side: Side,
    #[serde(default)]
    pub tokenizer_class: Option<String>,
}

impl Default for TokenizerSettings {
    fn default() -> Self {
        Self {
            model_max_length: None,
            pad_token: None,
            eos_token: None,
            mask_token: None,
            sep_token: None,
            remove_space: false,
            clean_up_tokenization_spaces: true,
            padding_side: Side::Right,
            truncation_side: Side::Right,
            tokenizer_class: None,
        }
    }
}

impl TokenizerSettings {
    /// Whether the selector names a language-pair model whose inputs may start
    /// with a `>>xx<<` target-language marker.
    pub fn uses_language_codes(&self) -> bool {
        self.tokenizer_class.as_deref() == Some("MarianTokenizer")
    }
}

/// `model_max_length` is often a huge float sentinel (`1e30`); clamp it.
fn deserialize_max_length<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<f64> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        if value.is_nan() || value < 0.0 {
            None
        } else if value >= usize::MAX as f64 {
            Some(usize::MAX)
        } else {
            Some(value as usize)
        }
    }))
}
