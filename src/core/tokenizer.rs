use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use super::config::{DecoderConfig, Side, TokenSpec, TokenizerJson, TokenizerSettings};
use super::decoder::{clean_up_tokenization, Decoder};
use super::error::{Result, TokenizerError};
use super::model::Model;
use super::normalizer::Normalizer;
use super::post_processor::{Encoding, PostProcessor};
use super::pre_tokenizer::PreTokenizer;
use super::streaming::StreamingDecoder;
use super::vocab::Vocab;

/// Text handed to [`Tokenizer::tokenize`]: one string or a batch.
#[derive(Debug, Clone, Copy)]
pub enum TextInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

impl<'a> From<&'a str> for TextInput<'a> {
    fn from(text: &'a str) -> Self {
        TextInput::Single(text)
    }
}

impl<'a> From<&'a [String]> for TextInput<'a> {
    fn from(texts: &'a [String]) -> Self {
        TextInput::Batch(texts)
    }
}

impl<'a> From<&'a Vec<String>> for TextInput<'a> {
    fn from(texts: &'a Vec<String>) -> Self {
        TextInput::Batch(texts.as_slice())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenizeOptions<'a> {
    /// Second sequence, shaped like the first.
    pub text_pair: Option<TextInput<'a>>,
    pub padding: bool,
    pub truncation: bool,
    /// Target row length; capped by `model_max_length`.
    pub max_length: Option<usize>,
    /// Return dense `[rows, cols]` tensors instead of nested rows.
    pub return_tensor: bool,
    pub add_special_tokens: bool,
    pub return_token_type_ids: bool,
}

impl Default for TokenizeOptions<'_> {
    fn default() -> Self {
        Self {
            text_pair: None,
            padding: false,
            truncation: false,
            max_length: None,
            return_tensor: false,
            add_special_tokens: true,
            return_token_type_ids: false,
        }
    }
}

/// Row-major 2-D integer tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor2D {
    pub data: Vec<i64>,
    pub dims: [usize; 2],
}

impl Tensor2D {
    /// Fails unless every row has the same length.
    pub fn from_rows(rows: &[Vec<u32>]) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(TokenizerError::input_shape(
                "cannot build a tensor from rows of unequal length; enable padding or truncation",
            ));
        }
        Ok(Self {
            data: rows.iter().flatten().map(|&v| i64::from(v)).collect(),
            dims: [rows.len(), cols],
        })
    }

    pub fn row(&self, index: usize) -> Option<&[i64]> {
        let [rows, cols] = self.dims;
        (index < rows).then(|| &self.data[index * cols..(index + 1) * cols])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdBatch {
    Rows(Vec<Vec<u32>>),
    Tensor(Tensor2D),
}

impl IdBatch {
    fn build(rows: Vec<Vec<u32>>, as_tensor: bool) -> Result<Self> {
        if as_tensor {
            Ok(IdBatch::Tensor(Tensor2D::from_rows(&rows)?))
        } else {
            Ok(IdBatch::Rows(rows))
        }
    }

    pub fn rows(&self) -> Option<&[Vec<u32>]> {
        match self {
            IdBatch::Rows(rows) => Some(rows),
            IdBatch::Tensor(_) => None,
        }
    }

    pub fn tensor(&self) -> Option<&Tensor2D> {
        match self {
            IdBatch::Tensor(tensor) => Some(tensor),
            IdBatch::Rows(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEncoding {
    pub input_ids: IdBatch,
    /// 1 for a real token, 0 for padding.
    pub attention_mask: IdBatch,
    pub token_type_ids: Option<IdBatch>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    pub skip_special_tokens: bool,
    /// Falls back to the `clean_up_tokenization_spaces` setting.
    pub clean_up_tokenization_spaces: Option<bool>,
}

enum Segment<'t> {
    Text { text: &'t str, first: bool },
    Added(u32),
}

/// A segment after the model has run over it.
enum Piece {
    Added(u32),
    Tokens(Vec<String>),
}

/// Text ↔ token id pipeline.
///
/// Encoding runs, per input string:
///
/// 1. Split on added-token literals (leftmost-longest); those map straight to their ids
/// 2. Normalize, pre-tokenize and segment every other span with the model
/// 3. Map tokens to ids, falling back to the unknown id
/// 4. Insert special tokens with the post-processor
///
/// Batches are encoded in parallel with Rayon. The only state shared between
/// calls is the BPE merge cache.
#[derive(Debug)]
pub struct Tokenizer {
    normalizer: Option<Normalizer>,
    pre_tokenizer: Option<PreTokenizer>,
    model: Model,
    post_processor: Option<PostProcessor>,
    decoder: Option<Decoder>,
    added_tokens: Vocab,
    added_token_strings: Vec<String>,
    added_matcher: Option<AhoCorasick>,
    special_ids: FxHashSet<u32>,
    settings: TokenizerSettings,
    pad_token_id: Option<u32>,
    eos_token_id: Option<u32>,
    mask_token_id: Option<u32>,
    sep_token_id: Option<u32>,
}

impl Tokenizer {
    /// Build a pipeline from the definition and settings documents.
    pub fn new(definition: TokenizerJson, settings: TokenizerSettings) -> Result<Self> {
        let normalizer = definition
            .normalizer
            .as_ref()
            .map(Normalizer::from_config)
            .transpose()?;
        let pre_tokenizer = definition
            .pre_tokenizer
            .as_ref()
            .map(PreTokenizer::from_config)
            .transpose()?;

        let byte_level = pre_tokenizer
            .as_ref()
            .is_some_and(PreTokenizer::is_byte_level)
            || matches!(definition.decoder, Some(DecoderConfig::ByteLevel {}));
        let model = Model::from_config(&definition.model, byte_level)?;

        let mut added_tokens = Vocab::new();
        let mut special_ids = FxHashSet::default();
        let mut added_token_strings = Vec::with_capacity(definition.added_tokens.len());
        for token in &definition.added_tokens {
            if token.content.is_empty() {
                continue;
            }
            added_tokens.insert(token.content.clone(), token.id);
            added_token_strings.push(token.content.clone());
            if token.special {
                special_ids.insert(token.id);
            }
        }

        let added_matcher = if added_token_strings.is_empty() {
            None
        } else {
            Some(
                AhoCorasickBuilder::new()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&added_token_strings)?,
            )
        };

        let lookup = |token: &str| {
            added_tokens
                .token_to_id(token)
                .or_else(|| model.vocab().token_to_id(token))
        };

        let post_processor = definition
            .post_processor
            .as_ref()
            .map(|config| PostProcessor::from_config(config, &lookup))
            .transpose()?;

        let decoder = definition
            .decoder
            .as_ref()
            .map(|config| {
                Decoder::from_config(
                    config,
                    model.end_of_word_suffix(),
                    added_token_strings.iter().cloned(),
                )
            })
            .transpose()?;

        let resolve = |name: &str, spec: &Option<TokenSpec>| -> Option<u32> {
            let content = spec.as_ref()?.content();
            let id = lookup(content);
            if id.is_none() {
                warn!(token = content, role = name, "configured token is not in the vocabulary");
            }
            id
        };
        let pad_token_id = resolve("pad_token", &settings.pad_token);
        let eos_token_id = resolve("eos_token", &settings.eos_token);
        let mask_token_id = resolve("mask_token", &settings.mask_token);
        let sep_token_id = resolve("sep_token", &settings.sep_token);
        special_ids.extend(
            [pad_token_id, eos_token_id, mask_token_id, sep_token_id]
                .into_iter()
                .flatten(),
        );

        debug!(
            model = model.name(),
            vocab_size = model.vocab().len(),
            added_tokens = added_tokens.len(),
            byte_level,
            "built tokenizer"
        );

        Ok(Self {
            normalizer,
            pre_tokenizer,
            model,
            post_processor,
            decoder,
            added_tokens,
            added_token_strings,
            added_matcher,
            special_ids,
            settings,
            pad_token_id,
            eos_token_id,
            mask_token_id,
            sep_token_id,
        })
    }

    /// Build from already-parsed documents. A `null` settings document means
    /// default settings.
    ///
    /// Unknown stage types and malformed fields are reported as
    /// [`TokenizerError::Config`].
    pub fn from_json_values(definition: Value, settings: Value) -> Result<Self> {
        let definition: TokenizerJson = serde_json::from_value(definition)
            .map_err(|e| TokenizerError::config(format!("tokenizer definition: {e}")))?;
        let settings: TokenizerSettings = if settings.is_null() {
            TokenizerSettings::default()
        } else {
            serde_json::from_value(settings)
                .map_err(|e| TokenizerError::config(format!("tokenizer settings: {e}")))?
        };
        Self::new(definition, settings)
    }

    pub fn from_json_str(definition: &str, settings: Option<&str>) -> Result<Self> {
        let definition: Value = serde_json::from_str(definition)?;
        let settings = match settings {
            Some(settings) => serde_json::from_str(settings)?,
            None => Value::Null,
        };
        Self::from_json_values(definition, settings)
    }

    /// Read `tokenizer.json` and, optionally, `tokenizer_config.json`.
    pub fn from_files<P: AsRef<Path>>(definition: P, settings: Option<P>) -> Result<Self> {
        let definition = std::fs::read_to_string(definition)?;
        let settings = settings.map(std::fs::read_to_string).transpose()?;
        Self::from_json_str(&definition, settings.as_deref())
    }

    /// Split off a leading `>>xx<<` target-language marker, with the
    /// whitespace after it.
    fn split_language_code<'t>(&self, text: &'t str) -> (Option<&'t str>, &'t str) {
        if !self.settings.uses_language_codes() {
            return (None, text);
        }
        let Some(rest) = text.strip_prefix(">>") else {
            return (None, text);
        };
        let Some(end) = rest.find("<<") else {
            return (None, text);
        };
        let code = &rest[..end];
        if code.is_empty() || !code.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return (None, text);
        }
        let marker_len = end + 4;
        (Some(&text[..marker_len]), text[marker_len..].trim_start())
    }

    fn split_added_tokens<'t>(&self, text: &'t str) -> Vec<Segment<'t>> {
        let Some(matcher) = &self.added_matcher else {
            return vec![Segment::Text { text, first: true }];
        };

        let mut segments = Vec::new();
        let mut last_end = 0;
        for m in matcher.find_iter(text) {
            if m.start() > last_end {
                segments.push(Segment::Text {
                    text: &text[last_end..m.start()],
                    first: last_end == 0,
                });
            }
            let content = &self.added_token_strings[m.pattern().as_usize()];
            if let Some(id) = self.added_tokens.token_to_id(content) {
                segments.push(Segment::Added(id));
            }
            last_end = m.end();
        }
        if last_end < text.len() {
            segments.push(Segment::Text {
                text: &text[last_end..],
                first: last_end == 0,
            });
        }
        segments
    }

    /// Normalize, pre-tokenize and segment text that holds no added token.
    fn ordinary_tokens(&self, text: &str, first: bool) -> Result<Vec<String>> {
        let collapsed;
        let text = if self.settings.remove_space {
            collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
            collapsed.as_str()
        } else {
            text
        };
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let normalized = match &self.normalizer {
            Some(normalizer) => normalizer.normalize(text),
            None => text.to_string(),
        };
        let words = match &self.pre_tokenizer {
            Some(pre_tokenizer) => pre_tokenizer.pre_tokenize(&normalized, first),
            None if normalized.is_empty() => Vec::new(),
            None => vec![normalized],
        };
        self.model.encode(&words)
    }

    /// Language marker plus the model output for every segment of one text.
    fn segment<'t>(&self, text: &'t str) -> Result<(Option<&'t str>, Vec<Piece>)> {
        let (code, text) = self.split_language_code(text);
        let pieces = self
            .split_added_tokens(text)
            .into_iter()
            .map(|segment| match segment {
                Segment::Added(id) => Ok(Piece::Added(id)),
                Segment::Text { text, first } => {
                    self.ordinary_tokens(text, first).map(Piece::Tokens)
                }
            })
            .collect::<Result<_>>()?;
        Ok((code, pieces))
    }

    /// Token strings for one text, before post-processing.
    pub fn to_tokens(&self, text: &str) -> Result<Vec<String>> {
        let (code, pieces) = self.segment(text)?;
        let mut tokens: Vec<String> = code.map(str::to_string).into_iter().collect();
        for piece in pieces {
            match piece {
                Piece::Added(id) => {
                    tokens.extend(self.added_tokens.id_to_token(id).map(str::to_string))
                }
                Piece::Tokens(words) => tokens.extend(words),
            }
        }
        Ok(tokens)
    }

    /// Ids for one text, before post-processing.
    fn encode_sequence(&self, text: &str) -> Result<Vec<u32>> {
        let (code, pieces) = self.segment(text)?;
        let mut ids = Vec::new();
        if let Some(code) = code {
            let id = self.token_to_id(code).or_else(|| {
                warn!(code, "unsupported language code, using the unknown token");
                self.model.unk_id()
            });
            ids.extend(id);
        }
        for piece in pieces {
            match piece {
                Piece::Added(id) => ids.push(id),
                Piece::Tokens(tokens) => ids.extend(self.model.tokens_to_ids(&tokens)),
            }
        }
        Ok(ids)
    }

    /// Encode one text (and optional pair) into ids with special tokens.
    pub fn encode(&self, text: &str, text_pair: Option<&str>) -> Result<Vec<u32>> {
        Ok(self.encode_with_options(text, text_pair, true)?.ids)
    }

    /// Encode one text (and optional pair), keeping segment ids.
    pub fn encode_with_options(
        &self,
        text: &str,
        text_pair: Option<&str>,
        add_special_tokens: bool,
    ) -> Result<Encoding> {
        let a = self.encode_sequence(text)?;
        let b = text_pair.map(|pair| self.encode_sequence(pair)).transpose()?;
        Ok(match &self.post_processor {
            Some(processor) => processor.process(&a, b.as_deref(), add_special_tokens),
            None => Encoding::from_sequences(&a, b.as_deref()),
        })
    }

    /// Batch encode multiple texts in parallel.
    pub fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<u32>>> {
        texts.par_iter().map(|text| self.encode(text, None)).collect()
    }

    /// Encode, then truncate and pad into a batch.
    ///
    /// The row target is `max_length` (or the longest row) capped by
    /// `model_max_length`. Truncation happens before padding.
    pub fn tokenize<'a>(
        &self,
        input: impl Into<TextInput<'a>>,
        options: TokenizeOptions<'a>,
    ) -> Result<BatchEncoding> {
        let input = input.into();
        let texts: Vec<&str> = match input {
            TextInput::Single(text) => vec![text],
            TextInput::Batch(texts) => texts.iter().map(String::as_str).collect(),
        };
        let pairs: Option<Vec<&str>> = match (input, options.text_pair) {
            (_, None) => None,
            (TextInput::Single(_), Some(TextInput::Single(pair))) => Some(vec![pair]),
            (TextInput::Batch(texts), Some(TextInput::Batch(pairs))) => {
                if texts.len() != pairs.len() {
                    return Err(TokenizerError::input_shape(format!(
                        "text has {} entries but text_pair has {}",
                        texts.len(),
                        pairs.len()
                    )));
                }
                Some(pairs.iter().map(String::as_str).collect())
            }
            (TextInput::Single(_), Some(TextInput::Batch(_))) => {
                return Err(TokenizerError::input_shape(
                    "a single text cannot be paired with a batch of text_pair",
                ))
            }
            (TextInput::Batch(_), Some(TextInput::Single(_))) => {
                return Err(TokenizerError::input_shape(
                    "a batch of text needs a batch of text_pair",
                ))
            }
        };

        let mut rows: Vec<Encoding> = (0..texts.len())
            .into_par_iter()
            .map(|i| {
                let pair = pairs.as_ref().map(|pairs| pairs[i]);
                self.encode_with_options(texts[i], pair, options.add_special_tokens)
            })
            .collect::<Result<_>>()?;

        let longest = rows.iter().map(Encoding::len).max().unwrap_or(0);
        let target = options
            .max_length
            .unwrap_or(longest)
            .min(self.model_max_length().unwrap_or(usize::MAX));
        if options.max_length.is_some() && !options.truncation {
            debug!(target, "max_length given without truncation; longer rows are kept");
        }

        if options.truncation {
            let from_left = self.settings.truncation_side == Side::Left;
            for row in rows.iter_mut() {
                row.truncate(target, from_left);
            }
        }

        let mut attention_mask: Vec<Vec<u32>> = rows.iter().map(|row| vec![1; row.len()]).collect();
        if options.padding {
            let from_left = self.settings.padding_side == Side::Left;
            for (row, mask) in rows.iter_mut().zip(attention_mask.iter_mut()) {
                if row.len() >= target {
                    continue;
                }
                let pad_id = self.pad_token_id.ok_or_else(|| {
                    TokenizerError::config("padding requested but no pad token is configured")
                })?;
                pad_to(&mut row.ids, target, pad_id, from_left);
                pad_to(&mut row.type_ids, target, 0, from_left);
                pad_to(mask, target, 0, from_left);
            }
        }

        let (input_ids, type_ids): (Vec<Vec<u32>>, Vec<Vec<u32>>) =
            rows.into_iter().map(|row| (row.ids, row.type_ids)).unzip();
        Ok(BatchEncoding {
            input_ids: IdBatch::build(input_ids, options.return_tensor)?,
            attention_mask: IdBatch::build(attention_mask, options.return_tensor)?,
            token_type_ids: if options.return_token_type_ids {
                Some(IdBatch::build(type_ids, options.return_tensor)?)
            } else {
                None
            },
        })
    }

    /// Decode ids to text.
    ///
    /// An empty id list is a [`TokenizerError::DecodeType`]. Ids with no
    /// token fall back to the unknown token or are dropped.
    pub fn decode(&self, ids: &[u32], options: DecodeOptions) -> Result<String> {
        if ids.is_empty() {
            return Err(TokenizerError::DecodeType(
                "cannot decode an empty id list".to_string(),
            ));
        }

        let kept: Vec<u32> = ids
            .iter()
            .copied()
            .filter(|id| !(options.skip_special_tokens && self.special_ids.contains(id)))
            .collect();
        let tokens = self.model.ids_to_tokens(&kept, &self.added_tokens);

        let text = match &self.decoder {
            Some(decoder) => decoder.decode(&tokens),
            None => tokens.join(" "),
        };

        let cleanup = options
            .clean_up_tokenization_spaces
            .unwrap_or(self.settings.clean_up_tokenization_spaces);
        Ok(if cleanup {
            clean_up_tokenization(&text)
        } else {
            text
        })
    }

    /// Batch decode multiple id lists in parallel.
    pub fn batch_decode(&self, batch: &[Vec<u32>], options: DecodeOptions) -> Result<Vec<String>> {
        batch.par_iter().map(|ids| self.decode(ids, options)).collect()
    }

    /// Raw bytes of one token as it appears in decoded text, used for
    /// incremental decoding. `first` marks the first token of the output.
    pub fn token_bytes(&self, id: u32, first: bool) -> Option<Vec<u8>> {
        if let Some(content) = self.added_tokens.id_to_token(id) {
            return Some(content.as_bytes().to_vec());
        }
        let token = self.model.id_to_token(id)?;
        Some(match &self.decoder {
            Some(decoder) => decoder.token_bytes(token, first),
            None => token.as_bytes().to_vec(),
        })
    }

    pub fn streaming_decoder(&self) -> StreamingDecoder<'_> {
        StreamingDecoder::new(self)
    }

    /// Id of a token string: added tokens first, then the model vocabulary.
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.added_tokens
            .token_to_id(token)
            .or_else(|| self.model.vocab().token_to_id(token))
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.added_tokens
            .id_to_token(id)
            .or_else(|| self.model.id_to_token(id))
    }

    /// Width of the id space: `max_id + 1` over the model and added tokens.
    pub fn vocab_size(&self) -> usize {
        self.model.vocab().size().max(self.added_tokens.size())
    }

    pub fn is_special(&self, id: u32) -> bool {
        self.special_ids.contains(&id)
    }

    pub fn pad_token_id(&self) -> Option<u32> {
        self.pad_token_id
    }

    pub fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }

    pub fn mask_token_id(&self) -> Option<u32> {
        self.mask_token_id
    }

    pub fn sep_token_id(&self) -> Option<u32> {
        self.sep_token_id
    }

    pub fn model_max_length(&self) -> Option<usize> {
        self.settings.model_max_length
    }

    pub fn settings(&self) -> &TokenizerSettings {
        &self.settings
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Clear the BPE merge cache.
    pub fn clear_cache(&self) {
        self.model.clear_cache();
    }

    /// Get the current BPE cache size.
    pub fn cache_len(&self) -> usize {
        self.model.cache_len()
    }
}

fn pad_to(values: &mut Vec<u32>, len: usize, value: u32, left: bool) {
    let missing = len.saturating_sub(values.len());
    if missing == 0 {
        return;
    }
    if left {
        values.splice(0..0, std::iter::repeat(value).take(missing));
    } else {
        values.resize(len, value);
    }
}
