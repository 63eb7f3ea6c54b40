//! The segmentation model: words in, vocabulary tokens out.

use tracing::{debug, warn};

use super::bpe::Bpe;
use super::config::ModelConfig;
use super::error::Result;
use super::unigram::Unigram;
use super::vocab::Vocab;
use super::wordpiece::WordPiece;

#[derive(Debug)]
pub enum Model {
    WordPiece(WordPiece),
    Bpe(Bpe),
    Unigram(Unigram),
}

impl Model {
    /// `byte_level` turns on byte remapping for BPE; the other models ignore it.
    pub fn from_config(config: &ModelConfig, byte_level: bool) -> Result<Self> {
        let model = match config {
            ModelConfig::WordPiece {
                vocab,
                unk_token,
                continuing_subword_prefix,
                max_input_chars_per_word,
            } => Model::WordPiece(WordPiece::new(
                Vocab::from_entries(vocab.iter().map(|(t, &id)| (t.clone(), id))),
                unk_token.clone(),
                continuing_subword_prefix.clone(),
                *max_input_chars_per_word,
            )),
            ModelConfig::BPE {
                vocab,
                merges,
                unk_token,
                end_of_word_suffix,
            } => Model::Bpe(Bpe::new(
                Vocab::from_entries(vocab.iter().map(|(t, &id)| (t.clone(), id))),
                merges,
                unk_token.clone(),
                end_of_word_suffix.clone().filter(|suffix| !suffix.is_empty()),
                byte_level,
            )?),
            ModelConfig::Unigram { vocab, unk_id } => {
                Model::Unigram(Unigram::new(vocab.clone(), *unk_id)?)
            }
        };
        debug!(
            model = model.name(),
            vocab_size = model.vocab().len(),
            unk = model.unk_token(),
            "loaded tokenizer model"
        );
        Ok(model)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Model::WordPiece(_) => "WordPiece",
            Model::Bpe(_) => "BPE",
            Model::Unigram(_) => "Unigram",
        }
    }

    pub fn encode(&self, words: &[String]) -> Result<Vec<String>> {
        match self {
            Model::WordPiece(model) => Ok(model.encode(words)),
            Model::Bpe(model) => Ok(model.encode(words)),
            Model::Unigram(model) => model.encode(words),
        }
    }

    pub fn vocab(&self) -> &Vocab {
        match self {
            Model::WordPiece(model) => model.vocab(),
            Model::Bpe(model) => model.vocab(),
            Model::Unigram(model) => model.vocab(),
        }
    }

    pub fn unk_token(&self) -> Option<&str> {
        match self {
            Model::WordPiece(model) => Some(model.unk_token()),
            Model::Bpe(model) => model.unk_token(),
            Model::Unigram(model) => model.unk_id().and_then(|id| model.vocab().id_to_token(id)),
        }
    }

    pub fn unk_id(&self) -> Option<u32> {
        match self {
            Model::Unigram(model) => model.unk_id(),
            _ => self
                .unk_token()
                .and_then(|token| self.vocab().token_to_id(token)),
        }
    }

    /// Id of `token`, or the unknown id when the token is not in the vocabulary.
    #[inline]
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab().token_to_id(token).or_else(|| self.unk_id())
    }

    /// Map tokens to ids. A token that is unknown while no unknown id exists
    /// is dropped.
    pub fn tokens_to_ids(&self, tokens: &[String]) -> Vec<u32> {
        tokens
            .iter()
            .filter_map(|token| {
                let id = self.token_to_id(token);
                if id.is_none() {
                    warn!(
                        token = %token,
                        "token not in vocabulary and no unknown token configured, dropping"
                    );
                }
                id
            })
            .collect()
    }

    #[inline]
    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.vocab().id_to_token(id)
    }

    /// Map ids to tokens, falling back to the unknown token. Entries in
    /// `added` shadow the model vocabulary. Ids without any mapping are
    /// dropped.
    pub fn ids_to_tokens(&self, ids: &[u32], added: &Vocab) -> Vec<String> {
        ids.iter()
            .filter_map(|&id| {
                added
                    .id_to_token(id)
                    .or_else(|| self.id_to_token(id))
                    .or_else(|| self.unk_token())
            })
            .map(str::to_string)
            .collect()
    }

    /// Drop memoized results. Only BPE keeps any.
    pub fn clear_cache(&self) {
        if let Model::Bpe(model) = self {
            model.clear_cache();
        }
    }

    pub fn cache_len(&self) -> usize {
        match self {
            Model::Bpe(model) => model.cache_len(),
            _ => 0,
        }
    }

    /// Suffix the model appends to the last unit of every word, if any.
    pub fn end_of_word_suffix(&self) -> Option<&str> {
        match self {
            Model::Bpe(model) => model.end_of_word_suffix(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(config: serde_json::Value, byte_level: bool) -> Model {
        let config: ModelConfig = serde_json::from_value(config).unwrap();
        Model::from_config(&config, byte_level).unwrap()
    }

    fn wordpiece() -> Model {
        build(
            json!({
                "type": "WordPiece",
                "vocab": {"[UNK]": 0, "[CLS]": 1, "[SEP]": 2, "he": 3, "##llo": 4, "world": 5}
            }),
            false,
        )
    }

    #[test]
    fn test_wordpiece_ids() {
        let model = wordpiece();
        let tokens = model
            .encode(&["hello".to_string(), "world".to_string()])
            .unwrap();
        assert_eq!(model.tokens_to_ids(&tokens), [3, 4, 5]);
        assert_eq!(model.unk_id(), Some(0));
    }

    #[test]
    fn test_unknown_lookup_falls_back() {
        let model = wordpiece();
        assert_eq!(model.token_to_id("nope"), Some(0));
        assert_eq!(model.ids_to_tokens(&[3, 999], &Vocab::new()), ["he", "[UNK]"]);
    }

    #[test]
    fn test_added_tokens_shadow_model_ids() {
        let model = wordpiece();
        let mut added = Vocab::new();
        added.insert("<extra>".to_string(), 3);
        added.insert("<new>".to_string(), 50);
        assert_eq!(
            model.ids_to_tokens(&[3, 4, 50, 999], &added),
            ["<extra>", "##llo", "<new>", "[UNK]"]
        );
    }

    #[test]
    fn test_bpe_without_unk_drops_unknown_units() {
        let model = build(
            json!({"type": "BPE", "vocab": {"a": 0, "b": 1, "ab": 2}, "merges": ["a b"]}),
            false,
        );
        let tokens = model.encode(&["abc".to_string()]).unwrap();
        assert_eq!(tokens, ["ab", "c"]);
        assert_eq!(model.tokens_to_ids(&tokens), [2]);
        assert_eq!(model.unk_id(), None);
    }

    #[test]
    fn test_unigram_unk_by_id() {
        let model = build(
            json!({"type": "Unigram", "unk_id": 0, "vocab": [["<unk>", 0.0], ["a", -1.0]]}),
            false,
        );
        assert_eq!(model.unk_token(), Some("<unk>"));
        let tokens = model.encode(&["az".to_string()]).unwrap();
        assert_eq!(model.tokens_to_ids(&tokens), [1, 0]);
    }
}
