pub mod core;
#[cfg(feature = "python")]
mod python;

pub use core::{
    BatchEncoding, DecodeOptions, Encoding, IdBatch, StreamingDecoder, Tensor2D, TextInput,
    TokenizeOptions, Tokenizer, TokenizerError,
};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// tokenpipe - tokenizer.json pipelines with Python bindings
///
/// - WordPiece, byte-level BPE and Unigram models
/// - Normalizer, pre-tokenizer, post-processor and decoder chains
/// - Aho-Corasick splitting on added tokens
/// - Rayon parallelism for batch encode and decode
/// - UTF-8 streaming decoder for generated output
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyTokenizer>()?;
    m.add_class::<python::PyStreamingDecoder>()?;
    Ok(())
}
