//! Core tokenization engine.
//!
//! A [`Tokenizer`] is assembled from two JSON documents and runs, per input:
//!
//! - [`Normalizer`]: string → string (Unicode forms, lowercasing, accents, replacements)
//! - [`PreTokenizer`]: string → words (whitespace, Bert, GPT-2 byte-level, Metaspace, regex)
//! - [`Model`]: words → tokens, one of [`WordPiece`], [`Bpe`] or [`Unigram`]
//! - [`PostProcessor`]: special-token templates around one or two sequences
//! - [`Decoder`]: tokens → text, followed by optional punctuation cleanup
//!
//! # Performance
//!
//! - **Regexr with JIT** (or PCRE2 with the `pcre2` feature) for split patterns
//! - **Rayon** across batch rows
//! - **FxHashMap** for vocabulary and merge-rank lookups
//! - **Aho-Corasick** for added-token splitting
//! - **LRU cache** (unbounded) memoizing BPE merges per word

mod bpe;
pub mod byte_level;
pub mod config;
mod decoder;
mod error;
mod model;
mod normalizer;
mod pattern;
mod post_processor;
mod pre_tokenizer;
mod streaming;
mod tokenizer;
mod trie;
mod unigram;
mod vocab;
mod wordpiece;

pub use bpe::Bpe;
pub use byte_level::{byte_level_decode, byte_level_decode_lossless, byte_level_encode};
pub use decoder::{clean_up_tokenization, Decoder};
pub use error::{Result, TokenizerError};
pub use model::Model;
pub use normalizer::Normalizer;
pub use pattern::{Pattern, SplitBehavior};
pub use post_processor::{Encoding, PostProcessor};
pub use pre_tokenizer::{PreTokenizer, PrependScheme, BYTE_LEVEL_PATTERN};
pub use streaming::{StreamingDecoder, Utf8Buffer};
pub use tokenizer::{
    BatchEncoding, DecodeOptions, IdBatch, Tensor2D, TextInput, TokenizeOptions, Tokenizer,
};
pub use trie::CharTrie;
pub use unigram::{TokenLattice, Unigram};
pub use vocab::Vocab;
pub use wordpiece::WordPiece;
