use thiserror::Error;

/// Errors raised while building or running a tokenizer pipeline.
///
/// Unknown input tokens are never an error: they fall back to the
/// configured unknown token.
#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Input shape error: {0}")]
    InputShape(String),
    #[error("Decode error: {0}")]
    DecodeType(String),
    #[error("No segmentation path covers word {word:?}")]
    Lattice { word: String },
    #[error("Regex compilation error (regexr): {0}")]
    RegexrError(#[from] regexr::Error),
    #[cfg(feature = "pcre2")]
    #[error("Regex compilation error (PCRE2): {0}")]
    Pcre2Error(#[from] pcre2::Error),
    #[error("Invalid tokenizer JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Aho-Corasick build error: {0}")]
    AhoCorasickError(#[from] aho_corasick::BuildError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TokenizerError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        TokenizerError::Config(msg.into())
    }

    pub(crate) fn input_shape(msg: impl Into<String>) -> Self {
        TokenizerError::InputShape(msg.into())
    }
}

pub type Result<T, E = TokenizerError> = std::result::Result<T, E>;
