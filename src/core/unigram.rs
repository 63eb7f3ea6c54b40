//! Unigram (SentencePiece-style) segmentation: Viterbi search over a lattice of
//! every vocabulary piece that matches the word.

use tracing::debug;

use super::error::{Result, TokenizerError};
use super::trie::CharTrie;
use super::vocab::Vocab;

/// Penalty below the lowest piece score given to the unknown piece.
pub const UNK_PENALTY: f64 = 10.0;

#[derive(Debug, Clone)]
struct LatticeNode {
    /// Start, in chars.
    pos: usize,
    /// Length, in chars.
    len: usize,
    score: f64,
    prev: Option<usize>,
    backtrace_score: f64,
}

/// Candidate spans of one word, stored as an arena.
///
/// Node 0 is BOS at `(0, 0)` and node 1 is EOS at `(len, 0)`.
#[derive(Debug)]
pub struct TokenLattice<'a> {
    sentence: &'a str,
    /// Byte offset of every char boundary, the end included.
    bounds: Vec<usize>,
    nodes: Vec<LatticeNode>,
    begin_nodes: Vec<Vec<usize>>,
    end_nodes: Vec<Vec<usize>>,
}

const BOS: usize = 0;
const EOS: usize = 1;

impl<'a> TokenLattice<'a> {
    pub fn new(sentence: &'a str) -> Self {
        let bounds: Vec<usize> = sentence
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(sentence.len()))
            .collect();
        let len = bounds.len() - 1;

        let mut lattice = Self {
            sentence,
            bounds,
            nodes: Vec::with_capacity(len * 2 + 2),
            begin_nodes: vec![Vec::new(); len + 1],
            end_nodes: vec![Vec::new(); len + 1],
        };
        lattice.push_node(0, 0, 0.0);
        lattice.push_node(len, 0, 0.0);
        lattice.end_nodes[0].push(BOS);
        lattice.begin_nodes[len].push(EOS);
        lattice
    }

    /// Word length in chars.
    pub fn len(&self) -> usize {
        self.bounds.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_node(&mut self, pos: usize, len: usize, score: f64) -> usize {
        self.nodes.push(LatticeNode {
            pos,
            len,
            score,
            prev: None,
            backtrace_score: 0.0,
        });
        self.nodes.len() - 1
    }

    /// Add the span `[pos, pos + len)` (in chars).
    pub fn insert(&mut self, pos: usize, len: usize, score: f64) {
        let index = self.push_node(pos, len, score);
        self.begin_nodes[pos].push(index);
        self.end_nodes[pos + len].push(index);
    }

    /// Text of the chars `[pos, pos + len)`.
    pub fn piece(&self, pos: usize, len: usize) -> &'a str {
        &self.sentence[self.bounds[pos]..self.bounds[pos + len]]
    }

    /// Byte offset of the char at `pos`.
    pub fn byte_offset(&self, pos: usize) -> usize {
        self.bounds[pos]
    }

    /// Best path as `(pos, len)` spans in order, or `None` if some position
    /// cannot be reached.
    ///
    /// Among equal-scoring predecessors the first inserted one wins.
    pub fn viterbi(&mut self) -> Option<Vec<(usize, usize)>> {
        for pos in 0..=self.len() {
            if self.begin_nodes[pos].is_empty() {
                return None;
            }
            for i in 0..self.begin_nodes[pos].len() {
                let rnode = self.begin_nodes[pos][i];
                let mut best: Option<(usize, f64)> = None;
                for &lnode in &self.end_nodes[pos] {
                    let score = self.nodes[lnode].backtrace_score + self.nodes[rnode].score;
                    if best.map_or(true, |(_, best_score)| score > best_score) {
                        best = Some((lnode, score));
                    }
                }
                let (prev, score) = best?;
                self.nodes[rnode].prev = Some(prev);
                self.nodes[rnode].backtrace_score = score;
            }
        }

        let mut path = Vec::new();
        let mut node = self.nodes[EOS].prev?;
        while node != BOS {
            let n = &self.nodes[node];
            path.push((n.pos, n.len));
            node = n.prev?;
        }
        path.reverse();
        Some(path)
    }
}

#[derive(Debug, Clone)]
pub struct Unigram {
    vocab: Vocab,
    scores: Vec<f64>,
    unk_id: Option<u32>,
    unk_score: f64,
    trie: CharTrie,
}

impl Unigram {
    /// Build from `(piece, score)` entries whose position is the id.
    ///
    /// The unknown piece's score is replaced by `min(scores) - 10`.
    pub fn new(pieces: Vec<(String, f64)>, unk_id: Option<u32>) -> Result<Self> {
        if let Some(unk) = unk_id {
            if unk as usize >= pieces.len() {
                return Err(TokenizerError::config(format!(
                    "Unigram unk_id {unk} is outside a vocabulary of {} pieces",
                    pieces.len()
                )));
            }
        }

        let min_score = pieces
            .iter()
            .map(|(_, score)| *score)
            .fold(f64::INFINITY, f64::min);
        let unk_score = if min_score.is_finite() {
            min_score - UNK_PENALTY
        } else {
            -UNK_PENALTY
        };

        let mut scores: Vec<f64> = pieces.iter().map(|(_, score)| *score).collect();
        if let Some(unk) = unk_id {
            scores[unk as usize] = unk_score;
        }
        let trie = CharTrie::from_tokens(pieces.iter().map(|(piece, _)| piece.as_str()));
        let vocab = Vocab::from_tokens(pieces.into_iter().map(|(piece, _)| piece));
        debug!(pieces = scores.len(), unk_score, "built unigram model");

        Ok(Self {
            vocab,
            scores,
            unk_id,
            unk_score,
            trie,
        })
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn unk_id(&self) -> Option<u32> {
        self.unk_id
    }

    pub fn unk_score(&self) -> f64 {
        self.unk_score
    }

    /// Score of a piece, with the unknown-piece override applied.
    pub fn score(&self, id: u32) -> Option<f64> {
        self.scores.get(id as usize).copied()
    }

    /// Fill a lattice with every vocabulary match, plus a length-1 unknown
    /// node wherever no single-char piece exists.
    pub fn populate(&self, lattice: &mut TokenLattice<'_>) {
        let sentence = lattice.sentence;
        for pos in 0..lattice.len() {
            let rest = &sentence[lattice.byte_offset(pos)..];
            let mut has_single = false;
            for prefix in self.trie.common_prefix_search(rest) {
                let len = prefix.chars().count();
                let Some(id) = self.vocab.token_to_id(prefix) else {
                    continue;
                };
                let score = self.scores[id as usize];
                lattice.insert(pos, len, score);
                has_single |= len == 1;
            }
            if !has_single {
                lattice.insert(pos, 1, self.unk_score);
            }
        }
    }

    /// Best segmentation of one word.
    pub fn encode_word(&self, word: &str) -> Result<Vec<String>> {
        if word.is_empty() {
            return Ok(Vec::new());
        }
        let mut lattice = TokenLattice::new(word);
        self.populate(&mut lattice);
        let path = lattice.viterbi().ok_or_else(|| TokenizerError::Lattice {
            word: word.to_string(),
        })?;
        Ok(path
            .into_iter()
            .map(|(pos, len)| lattice.piece(pos, len).to_string())
            .collect())
    }

    pub fn encode(&self, words: &[String]) -> Result<Vec<String>> {
        let mut tokens = Vec::new();
        for word in words {
            tokens.extend(self.encode_word(word)?);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces(entries: &[(&str, f64)]) -> Vec<(String, f64)> {
        entries.iter().map(|(p, s)| (p.to_string(), *s)).collect()
    }

    fn scenario_model() -> Unigram {
        Unigram::new(
            pieces(&[(" ", 0.0), ("a", -1.0), ("b", -1.0), ("ab", -0.5), ("<unk>", -10.0)]),
            Some(4),
        )
        .unwrap()
    }

    #[test]
    fn test_prefers_single_higher_scoring_piece() {
        let model = scenario_model();
        assert_eq!(model.encode_word("ab").unwrap(), ["ab"]);
        assert_eq!(model.encode_word("ba").unwrap(), ["b", "a"]);
    }

    #[test]
    fn test_unk_score_is_min_minus_penalty() {
        let model = scenario_model();
        assert_eq!(model.unk_score(), -20.0);
        assert_eq!(model.score(4), Some(-20.0));
        assert_eq!(model.score(3), Some(-0.5));
    }

    #[test]
    fn test_unknown_chars_get_fallback_nodes() {
        let model = scenario_model();
        assert_eq!(model.encode_word("axb").unwrap(), ["a", "x", "b"]);
        assert_eq!(model.encode_word("日本").unwrap(), ["日", "本"]);
    }

    #[test]
    fn test_combining_and_zero_width_chars_are_covered() {
        let model = scenario_model();
        let word = "a\u{301}\u{200B}b\u{FEFF}";
        let tokens = model.encode_word(word).unwrap();
        assert_eq!(tokens.concat(), word);
        assert_eq!(tokens, ["a", "\u{301}", "\u{200B}", "b", "\u{FEFF}"]);
    }

    #[test]
    fn test_ties_keep_first_inserted_predecessor() {
        // both paths score -2; "aa" is inserted before the second "a", so it
        // is the first predecessor seen at EOS
        let model = Unigram::new(pieces(&[("a", -1.0), ("aa", -2.0)]), None).unwrap();
        assert_eq!(model.encode_word("aa").unwrap(), ["aa"]);
    }

    #[test]
    fn test_lattice_without_fallback_fails() {
        let mut lattice = TokenLattice::new("ab");
        lattice.insert(0, 1, -1.0);
        assert!(lattice.viterbi().is_none());
    }

    #[test]
    fn test_lattice_spans_tile_word() {
        let model = scenario_model();
        let word = "abba ab";
        let mut lattice = TokenLattice::new(word);
        model.populate(&mut lattice);
        let path = lattice.viterbi().unwrap();
        let mut cursor = 0;
        for (pos, len) in path {
            assert_eq!(pos, cursor);
            assert!(len > 0);
            cursor += len;
        }
        assert_eq!(cursor, word.chars().count());
    }

    #[test]
    fn test_bad_unk_id_is_config_error() {
        let err = Unigram::new(pieces(&[("a", -1.0)]), Some(5));
        assert!(matches!(err, Err(TokenizerError::Config(_))));
    }
}
