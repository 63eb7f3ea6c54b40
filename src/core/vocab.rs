//! Token string ↔ token ID vocabulary.
//!
//! Models load their vocabulary from the `model.vocab` field of a tokenizer
//! definition, which takes one of two shapes:
//!
//! - WordPiece / BPE: an object mapping token → id, e.g. `{"[UNK]": 0, "he": 3}`
//! - Unigram: an array of `[token, score]` pairs where the position is the id
//!
//! Added tokens from `added_tokens` are inserted on top with their reserved ids.
//! When two entries spell the same string the lowest id wins for encoding,
//! while decoding keeps every id.

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct Vocab {
    token_to_id: FxHashMap<String, u32>,
    id_to_token: FxHashMap<u32, String>,
}

impl Vocab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(token, id)` entries.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, u32)>,
    {
        let mut vocab = Self::new();
        for (token, id) in entries {
            vocab.insert(token, id);
        }
        vocab
    }

    /// Build from tokens listed in id order.
    pub fn from_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self::from_entries(tokens.into_iter().enumerate().map(|(i, t)| (t, i as u32)))
    }

    /// Register a token. An id that is already mapped is re-pointed at `token`.
    pub fn insert(&mut self, token: String, id: u32) {
        match self.token_to_id.get(&token) {
            Some(&existing) if existing <= id => {}
            _ => {
                self.token_to_id.insert(token.clone(), id);
            }
        }
        self.id_to_token.insert(id, token);
    }

    #[inline]
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    #[inline]
    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(&id).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_id.contains_key(token)
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    /// `max_id + 1`, the width of the id space.
    pub fn size(&self) -> usize {
        self.id_to_token
            .keys()
            .max()
            .map(|&max| max as usize + 1)
            .unwrap_or(0)
    }
}
