//! Greedy longest-match WordPiece segmentation.

use super::vocab::Vocab;

pub const DEFAULT_CONTINUING_SUBWORD_PREFIX: &str = "##";

#[derive(Debug, Clone)]
pub struct WordPiece {
    vocab: Vocab,
    unk_token: String,
    continuing_subword_prefix: String,
    max_input_chars_per_word: usize,
}

impl WordPiece {
    pub fn new(
        vocab: Vocab,
        unk_token: String,
        continuing_subword_prefix: String,
        max_input_chars_per_word: usize,
    ) -> Self {
        Self {
            vocab,
            unk_token,
            continuing_subword_prefix,
            max_input_chars_per_word,
        }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn unk_token(&self) -> &str {
        &self.unk_token
    }

    pub fn continuing_subword_prefix(&self) -> &str {
        &self.continuing_subword_prefix
    }

    /// Segment one word. Either every piece is found or the result is exactly
    /// `[unk_token]`.
    pub fn encode_word(&self, word: &str) -> Vec<String> {
        // char boundaries, including the end of the word
        let bounds: Vec<usize> = word
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(word.len()))
            .collect();
        let n_chars = bounds.len() - 1;
        if n_chars > self.max_input_chars_per_word {
            return vec![self.unk_token.clone()];
        }

        let mut pieces = Vec::new();
        let mut candidate =
            String::with_capacity(word.len() + self.continuing_subword_prefix.len());
        let mut start = 0;
        while start < n_chars {
            let mut end = n_chars;
            let mut found = false;
            while end > start {
                candidate.clear();
                if start > 0 {
                    candidate.push_str(&self.continuing_subword_prefix);
                }
                candidate.push_str(&word[bounds[start]..bounds[end]]);
                if self.vocab.contains(&candidate) {
                    found = true;
                    break;
                }
                end -= 1;
            }
            if !found {
                return vec![self.unk_token.clone()];
            }
            pieces.push(candidate.clone());
            start = end;
        }
        pieces
    }

    pub fn encode(&self, words: &[String]) -> Vec<String> {
        words.iter().flat_map(|word| self.encode_word(word)).collect()
    }
}
