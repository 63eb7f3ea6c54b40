//! Character prefix trie over a vocabulary.

use rustc_hash::FxHashMap;

#[derive(Debug, Default, Clone)]
struct TrieNode {
    is_leaf: bool,
    children: FxHashMap<char, TrieNode>,
}

/// Prefix tree answering "which vocabulary strings are a prefix of this text".
///
/// Built once when a Unigram model loads and never mutated afterwards.
#[derive(Debug, Default, Clone)]
pub struct CharTrie {
    root: TrieNode,
    len: usize,
}

impl CharTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = Self::new();
        for token in tokens {
            trie.insert(token.as_ref());
        }
        trie
    }

    /// Insert a string. Empty strings are ignored.
    pub fn insert(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        for ch in token.chars() {
            node = node.children.entry(ch).or_default();
        }
        if !node.is_leaf {
            node.is_leaf = true;
            self.len += 1;
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        let mut node = &self.root;
        for ch in token.chars() {
            match node.children.get(&ch) {
                Some(next) => node = next,
                None => return false,
            }
        }
        node.is_leaf && !token.is_empty()
    }

    /// Every stored string that is a prefix of `text`, shortest first.
    ///
    /// The returned slices borrow from `text`.
    pub fn common_prefix_search<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut found = Vec::new();
        let mut node = &self.root;
        for (offset, ch) in text.char_indices() {
            match node.children.get(&ch) {
                Some(next) => node = next,
                None => break,
            }
            if node.is_leaf {
                found.push(&text[..offset + ch.len_utf8()]);
            }
        }
        found
    }

    /// Number of distinct strings stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
