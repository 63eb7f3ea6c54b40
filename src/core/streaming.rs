//! UTF-8 safe incremental decoding for token-by-token output.
//!
//! A byte-level token can end in the middle of a multi-byte character, so raw
//! token bytes are collected in a [`Utf8Buffer`] and only complete characters
//! are emitted. Each token's bytes come from [`Tokenizer::token_bytes`], which
//! applies the configured decoder's per-token mapping (byte table, Metaspace
//! glyph, WordPiece continuation marker).

use super::tokenizer::Tokenizer;

/// Byte buffer that releases the longest complete UTF-8 prefix.
#[derive(Debug, Default, Clone)]
pub struct Utf8Buffer {
    pending: Vec<u8>,
}

impl Utf8Buffer {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(16),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Take every complete character.
    ///
    /// An incomplete sequence at the end stays buffered. Bytes that can never
    /// start a valid sequence become U+FFFD.
    pub fn take_complete(&mut self) -> Option<String> {
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match err.error_len() {
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                    }
                }
            }
        }
        (!out.is_empty()).then_some(out)
    }

    /// Take everything, replacing an incomplete tail with U+FFFD.
    pub fn flush(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// A streaming decoder that handles incomplete UTF-8 sequences across token boundaries.
///
/// # Example
///
/// ```ignore
/// let mut decoder = tokenizer.streaming_decoder();
/// for token_id in token_stream {
///     if let Some(text) = decoder.add_token(token_id) {
///         print!("{}", text);
///     }
/// }
/// print!("{}", decoder.flush());
/// ```
pub struct StreamingDecoder<'a> {
    tokenizer: &'a Tokenizer,
    buffer: Utf8Buffer,
    started: bool,
}

impl<'a> StreamingDecoder<'a> {
    pub fn new(tokenizer: &'a Tokenizer) -> Self {
        Self {
            tokenizer,
            buffer: Utf8Buffer::new(),
            started: false,
        }
    }

    fn push_token(&mut self, token_id: u32) {
        if let Some(bytes) = self.tokenizer.token_bytes(token_id, !self.started) {
            self.started = true;
            self.buffer.push(&bytes);
        }
    }

    /// Add a token and return any complete characters.
    ///
    /// Unknown ids contribute nothing.
    pub fn add_token(&mut self, token_id: u32) -> Option<String> {
        self.push_token(token_id);
        self.buffer.take_complete()
    }

    pub fn add_tokens(&mut self, token_ids: &[u32]) -> Option<String> {
        for &token_id in token_ids {
            self.push_token(token_id);
        }
        self.buffer.take_complete()
    }

    /// Flush any remaining buffered bytes.
    pub fn flush(&mut self) -> String {
        self.buffer.flush()
    }

    /// Reset the decoder state, discarding any buffered bytes. The next
    /// token is treated as the first of a new output.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.started = false;
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}
