//! Rank-driven byte-pair merging.
//!
//! A word is split into one-character units (after byte remapping for
//! byte-level vocabularies) and the adjacent pair with the lowest merge rank is
//! merged everywhere it occurs, left to right, until no ranked pair is left.
//! Results are memoized per input word for the lifetime of the model.

use lru::LruCache;
use rustc_hash::FxHashMap;
use std::sync::Mutex;

use super::byte_level::byte_level_encode;
use super::config::MergeEntry;
use super::error::{Result, TokenizerError};
use super::vocab::Vocab;

pub struct Bpe {
    vocab: Vocab,
    /// left unit → right unit → rank
    merges: FxHashMap<String, FxHashMap<String, u32>>,
    n_merges: usize,
    unk_token: Option<String>,
    end_of_word_suffix: Option<String>,
    byte_level: bool,
    cache: Mutex<LruCache<String, Vec<String>>>,
}

impl Bpe {
    /// Build a model. A merge's rank is its position in `merges`; a pair
    /// listed twice keeps its first rank.
    pub fn new(
        vocab: Vocab,
        merges: &[MergeEntry],
        unk_token: Option<String>,
        end_of_word_suffix: Option<String>,
        byte_level: bool,
    ) -> Result<Self> {
        let mut ranks: FxHashMap<String, FxHashMap<String, u32>> = FxHashMap::default();
        for (rank, entry) in merges.iter().enumerate() {
            let (left, right) = entry.pair().ok_or_else(|| {
                TokenizerError::config(format!("malformed BPE merge at rank {rank}: {entry:?}"))
            })?;
            ranks
                .entry(left.to_string())
                .or_default()
                .entry(right.to_string())
                .or_insert(rank as u32);
        }

        Ok(Self {
            vocab,
            merges: ranks,
            n_merges: merges.len(),
            unk_token,
            end_of_word_suffix,
            byte_level,
            cache: Mutex::new(LruCache::unbounded()),
        })
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn unk_token(&self) -> Option<&str> {
        self.unk_token.as_deref()
    }

    pub fn end_of_word_suffix(&self) -> Option<&str> {
        self.end_of_word_suffix.as_deref()
    }

    pub fn is_byte_level(&self) -> bool {
        self.byte_level
    }

    pub fn n_merges(&self) -> usize {
        self.n_merges
    }

    #[inline]
    fn rank(&self, left: &str, right: &str) -> Option<u32> {
        self.merges.get(left)?.get(right).copied()
    }

    /// Sub-word units for one word.
    pub fn encode_word(&self, word: &str) -> Vec<String> {
        if word.is_empty() {
            return Vec::new();
        }
        let key = if self.byte_level {
            byte_level_encode(word.as_bytes())
        } else {
            word.to_string()
        };

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&key) {
                return cached.clone();
            }
        }

        let units = self.merge(&key);

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, units.clone());
        }
        units
    }

    pub fn encode(&self, words: &[String]) -> Vec<String> {
        words.iter().flat_map(|word| self.encode_word(word)).collect()
    }

    fn merge(&self, word: &str) -> Vec<String> {
        let mut units: Vec<String> = word.chars().map(String::from).collect();
        if let (Some(suffix), Some(last)) = (&self.end_of_word_suffix, units.last_mut()) {
            last.push_str(suffix);
        }

        while units.len() > 1 {
            let best = units
                .windows(2)
                .enumerate()
                .filter_map(|(i, pair)| self.rank(&pair[0], &pair[1]).map(|rank| (rank, i)))
                .min();
            let Some((_, first)) = best else {
                break;
            };

            let left = std::mem::take(&mut units[first]);
            let right = std::mem::take(&mut units[first + 1]);
            let mut merged = Vec::with_capacity(units.len() - 1);
            merged.extend(units.drain(..first));
            merged.push(format!("{left}{right}"));

            let mut rest = units.drain(2..).peekable();
            while let Some(unit) = rest.next() {
                if unit == left && rest.peek() == Some(&right) {
                    rest.next();
                    merged.push(format!("{left}{right}"));
                } else {
                    merged.push(unit);
                }
            }
            drop(rest);
            units = merged;
        }
        units
    }

    /// Clear the merge cache.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Number of memoized words.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for Bpe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bpe")
            .field("vocab_size", &self.vocab.len())
            .field("merges", &self.n_merges)
            .field("byte_level", &self.byte_level)
            .field("end_of_word_suffix", &self.end_of_word_suffix)
            .finish()
    }
}
