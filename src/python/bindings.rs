//! Python bindings for the tokenizer pipeline.
//!
//! # Thread Safety
//!
//! The tokenizer is immutable apart from its internal BPE cache and can be
//! shared across Python threads. Batch operations use Rayon.
//!
//! # Example
//!
//! ```python
//! from tokenpipe import Tokenizer
//!
//! tokenizer = Tokenizer.from_files("tokenizer.json", "tokenizer_config.json")
//! batch = tokenizer.tokenize(["a", "a a a"], padding=True)
//! text = tokenizer.decode(batch["input_ids"][0], skip_special_tokens=True)
//! ```

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::sync::Arc;

use crate::core::{
    DecodeOptions, IdBatch, TextInput, TokenizeOptions, Tokenizer, TokenizerError, Utf8Buffer,
};

fn to_py_err(err: TokenizerError) -> PyErr {
    match err {
        TokenizerError::IoError(e) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// `str` or `list[str]` from Python.
enum PyText {
    Single(String),
    Batch(Vec<String>),
}

impl PyText {
    fn extract(obj: &Bound<'_, PyAny>) -> PyResult<Self> {
        if let Ok(text) = obj.extract::<String>() {
            return Ok(PyText::Single(text));
        }
        Ok(PyText::Batch(obj.extract::<Vec<String>>()?))
    }

    fn as_input(&self) -> TextInput<'_> {
        match self {
            PyText::Single(text) => TextInput::Single(text),
            PyText::Batch(texts) => TextInput::Batch(texts),
        }
    }
}

fn batch_rows(batch: IdBatch) -> Vec<Vec<u32>> {
    match batch {
        IdBatch::Rows(rows) => rows,
        IdBatch::Tensor(tensor) => {
            let [rows, cols] = tensor.dims;
            (0..rows)
                .map(|r| {
                    tensor.data[r * cols..(r + 1) * cols]
                        .iter()
                        .map(|&v| v as u32)
                        .collect()
                })
                .collect()
        }
    }
}

/// Python wrapper for the Rust Tokenizer.
#[pyclass(name = "Tokenizer")]
pub struct PyTokenizer {
    inner: Arc<Tokenizer>,
}

#[pymethods]
impl PyTokenizer {
    /// Build a tokenizer from JSON text.
    ///
    /// Args:
    ///     definition: Contents of tokenizer.json
    ///     settings: Optional contents of tokenizer_config.json
    #[staticmethod]
    #[pyo3(signature = (definition, settings=None))]
    fn from_json(definition: &str, settings: Option<&str>) -> PyResult<Self> {
        let inner = Tokenizer::from_json_str(definition, settings).map_err(to_py_err)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Build a tokenizer from files on disk.
    #[staticmethod]
    #[pyo3(signature = (definition_path, settings_path=None))]
    fn from_files(definition_path: &str, settings_path: Option<&str>) -> PyResult<Self> {
        let inner = Tokenizer::from_files(definition_path, settings_path).map_err(to_py_err)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Encode text (and an optional pair) to token IDs with special tokens.
    #[pyo3(signature = (text, text_pair=None))]
    fn encode(&self, text: &str, text_pair: Option<&str>) -> PyResult<Vec<u32>> {
        self.inner.encode(text, text_pair).map_err(to_py_err)
    }

    /// Batch encode multiple texts in parallel.
    fn encode_batch(&self, texts: Vec<String>) -> PyResult<Vec<Vec<u32>>> {
        self.inner.encode_batch(&texts).map_err(to_py_err)
    }

    /// Token strings for one text, before special tokens are added.
    fn to_tokens(&self, text: &str) -> PyResult<Vec<String>> {
        self.inner.to_tokens(text).map_err(to_py_err)
    }

    /// Encode a text or list of texts into a padded batch.
    ///
    /// Returns:
    ///     dict with "input_ids", "attention_mask" and, on request,
    ///     "token_type_ids", each a list of rows
    #[pyo3(signature = (
        text,
        text_pair=None,
        padding=false,
        truncation=false,
        max_length=None,
        add_special_tokens=true,
        return_token_type_ids=false
    ))]
    #[allow(clippy::too_many_arguments)]
    fn tokenize<'py>(
        &self,
        py: Python<'py>,
        text: &Bound<'py, PyAny>,
        text_pair: Option<&Bound<'py, PyAny>>,
        padding: bool,
        truncation: bool,
        max_length: Option<usize>,
        add_special_tokens: bool,
        return_token_type_ids: bool,
    ) -> PyResult<Bound<'py, PyDict>> {
        let text = PyText::extract(text)?;
        let text_pair = text_pair.map(PyText::extract).transpose()?;
        let options = TokenizeOptions {
            text_pair: text_pair.as_ref().map(PyText::as_input),
            padding,
            truncation,
            max_length,
            return_tensor: false,
            add_special_tokens,
            return_token_type_ids,
        };
        let batch = self
            .inner
            .tokenize(text.as_input(), options)
            .map_err(to_py_err)?;

        let dict = PyDict::new(py);
        dict.set_item("input_ids", batch_rows(batch.input_ids))?;
        dict.set_item("attention_mask", batch_rows(batch.attention_mask))?;
        if let Some(type_ids) = batch.token_type_ids {
            dict.set_item("token_type_ids", batch_rows(type_ids))?;
        }
        Ok(dict)
    }

    /// Decode token IDs to a string.
    ///
    /// Raises:
    ///     ValueError: If the list is empty
    #[pyo3(signature = (ids, skip_special_tokens=false, clean_up_tokenization_spaces=None))]
    fn decode(
        &self,
        ids: Vec<u32>,
        skip_special_tokens: bool,
        clean_up_tokenization_spaces: Option<bool>,
    ) -> PyResult<String> {
        let options = DecodeOptions {
            skip_special_tokens,
            clean_up_tokenization_spaces,
        };
        self.inner.decode(&ids, options).map_err(to_py_err)
    }

    /// Batch decode multiple token lists in parallel.
    #[pyo3(signature = (batch, skip_special_tokens=false, clean_up_tokenization_spaces=None))]
    fn batch_decode(
        &self,
        batch: Vec<Vec<u32>>,
        skip_special_tokens: bool,
        clean_up_tokenization_spaces: Option<bool>,
    ) -> PyResult<Vec<String>> {
        let options = DecodeOptions {
            skip_special_tokens,
            clean_up_tokenization_spaces,
        };
        self.inner.batch_decode(&batch, options).map_err(to_py_err)
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.inner.id_to_token(id).map(str::to_string)
    }

    #[getter]
    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    #[getter]
    fn pad_token_id(&self) -> Option<u32> {
        self.inner.pad_token_id()
    }

    #[getter]
    fn eos_token_id(&self) -> Option<u32> {
        self.inner.eos_token_id()
    }

    #[getter]
    fn mask_token_id(&self) -> Option<u32> {
        self.inner.mask_token_id()
    }

    #[getter]
    fn sep_token_id(&self) -> Option<u32> {
        self.inner.sep_token_id()
    }

    #[getter]
    fn model_max_length(&self) -> Option<usize> {
        self.inner.model_max_length()
    }

    /// Create a streaming decoder for UTF-8 safe token-by-token decoding.
    ///
    /// Example:
    ///     decoder = tokenizer.streaming_decoder()
    ///     for token_id in token_stream:
    ///         if text := decoder.add_token(token_id):
    ///             print(text, end="", flush=True)
    ///     print(decoder.flush())
    fn streaming_decoder(&self) -> PyStreamingDecoder {
        PyStreamingDecoder {
            tokenizer: Arc::clone(&self.inner),
            buffer: Utf8Buffer::new(),
            started: false,
        }
    }

    /// Clear the BPE merge cache.
    fn clear_cache(&self) {
        self.inner.clear_cache();
    }

    #[getter]
    fn cache_len(&self) -> usize {
        self.inner.cache_len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Tokenizer(model={}, vocab_size={})",
            self.inner.model().name(),
            self.inner.vocab_size()
        )
    }
}

/// Streaming decoder sharing its tokenizer with the Python object that made it.
#[pyclass(name = "StreamingDecoder")]
pub struct PyStreamingDecoder {
    tokenizer: Arc<Tokenizer>,
    buffer: Utf8Buffer,
    started: bool,
}

impl PyStreamingDecoder {
    fn push_token(&mut self, token_id: u32) {
        if let Some(bytes) = self.tokenizer.token_bytes(token_id, !self.started) {
            self.started = true;
            self.buffer.push(&bytes);
        }
    }
}

#[pymethods]
impl PyStreamingDecoder {
    /// Add a token and return any complete characters, or None.
    fn add_token(&mut self, token_id: u32) -> Option<String> {
        self.push_token(token_id);
        self.buffer.take_complete()
    }

    fn add_tokens(&mut self, token_ids: Vec<u32>) -> Option<String> {
        for token_id in token_ids {
            self.push_token(token_id);
        }
        self.buffer.take_complete()
    }

    /// Flush remaining bytes, replacing an incomplete tail with U+FFFD.
    fn flush(&mut self) -> String {
        self.buffer.flush()
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.started = false;
    }

    #[getter]
    fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    #[getter]
    fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn __repr__(&self) -> String {
        format!("StreamingDecoder(pending_bytes={})", self.buffer.len())
    }
}
