//! Regex and literal patterns used by normalizers, pre-tokenizers and cleanup.
//!
//! Regexes compile with `regexr` (JIT enabled when the platform allows it).
//! Building with the `pcre2` feature switches every compiled pattern to PCRE2
//! with UTF and Unicode-property support.

use serde_json::Value;
use tracing::warn;

#[cfg(not(feature = "pcre2"))]
use regexr::{Regex as RegexrRegex, RegexBuilder};

use super::error::Result;

/// Compiled regex, tied to whichever engine this build uses.
pub struct RegexBackend {
    source: String,
    #[cfg(not(feature = "pcre2"))]
    regex: Box<RegexrRegex>,
    #[cfg(feature = "pcre2")]
    regex: pcre2::bytes::Regex,
}

impl RegexBackend {
    #[cfg(not(feature = "pcre2"))]
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern).jit(true).build()?;
        Ok(Self {
            source: pattern.to_string(),
            regex: Box::new(regex),
        })
    }

    #[cfg(feature = "pcre2")]
    pub fn new(pattern: &str) -> Result<Self> {
        let mut builder = pcre2::bytes::RegexBuilder::new();
        builder.jit_if_available(true);
        builder.utf(true);
        builder.ucp(true);
        let regex = builder.build(pattern)?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// All non-empty matches as `(start, end)` byte offsets.
    #[cfg(not(feature = "pcre2"))]
    pub fn find_iter(&self, text: &str) -> Vec<(usize, usize)> {
        self.regex
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .filter(|(start, end)| end > start)
            .collect()
    }

    #[cfg(feature = "pcre2")]
    pub fn find_iter(&self, text: &str) -> Vec<(usize, usize)> {
        self.regex
            .find_iter(text.as_bytes())
            .filter_map(|m| m.ok())
            .map(|m| (m.start(), m.end()))
            .filter(|(start, end)| end > start)
            .collect()
    }
}

impl std::fmt::Debug for RegexBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RegexBackend").field(&self.source).finish()
    }
}

/// How a split pattern's matches are kept relative to the text between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
pub enum SplitBehavior {
    Removed,
    #[default]
    Isolated,
    MergedWithPrevious,
    MergedWithNext,
    Contiguous,
}

/// A `{"String": ...}` or `{"Regex": ...}` pattern from a tokenizer definition.
#[derive(Debug)]
pub enum Pattern {
    Literal(String),
    Regex(RegexBackend),
}

impl Pattern {
    /// Interpret a pattern object.
    ///
    /// Unknown shapes are logged and yield `Ok(None)`; only a regex that fails
    /// to compile is an error.
    pub fn from_config(value: &Value) -> Result<Option<Self>> {
        if let Some(regex) = value.get("Regex").and_then(Value::as_str) {
            return Ok(Some(Pattern::Regex(RegexBackend::new(regex)?)));
        }
        if let Some(literal) = value.get("String").and_then(Value::as_str) {
            return Ok(Some(Pattern::Literal(literal.to_string())));
        }
        warn!(pattern = %value, "unsupported pattern shape, ignoring");
        Ok(None)
    }

    pub fn find_iter(&self, text: &str) -> Vec<(usize, usize)> {
        match self {
            Pattern::Literal(literal) if literal.is_empty() => Vec::new(),
            Pattern::Literal(literal) => text
                .match_indices(literal.as_str())
                .map(|(start, m)| (start, start + m.len()))
                .collect(),
            Pattern::Regex(regex) => regex.find_iter(text),
        }
    }

    /// Replace every match with `content`.
    pub fn replace_all(&self, text: &str, content: &str) -> String {
        replace_matches(text, &self.find_iter(text), |_| content)
    }

    /// Split `text` around matches.
    ///
    /// With `invert` the matches themselves are the pieces and `behavior` is
    /// ignored. Empty pieces are dropped.
    pub fn split(&self, text: &str, behavior: SplitBehavior, invert: bool) -> Vec<String> {
        let matches = self.find_iter(text);
        if invert {
            return matches
                .iter()
                .map(|&(start, end)| text[start..end].to_string())
                .collect();
        }
        split_on_matches(text, &matches, behavior)
    }
}

/// Rebuild `text` with each `(start, end)` span swapped for `replacement(span)`.
pub(crate) fn replace_matches<F, R>(
    text: &str,
    matches: &[(usize, usize)],
    replacement: F,
) -> String
where
    F: Fn(&str) -> R,
    R: AsRef<str>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for &(start, end) in matches {
        out.push_str(&text[last..start]);
        out.push_str(replacement(&text[start..end]).as_ref());
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

fn split_on_matches(
    text: &str,
    matches: &[(usize, usize)],
    behavior: SplitBehavior,
) -> Vec<String> {
    // (span, is_match) in text order, gaps included
    let mut spans: Vec<((usize, usize), bool)> = Vec::with_capacity(matches.len() * 2 + 1);
    let mut last = 0;
    for &(start, end) in matches {
        if start > last {
            spans.push(((last, start), false));
        }
        spans.push(((start, end), true));
        last = end;
    }
    if last < text.len() {
        spans.push(((last, text.len()), false));
    }

    let mut pieces: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    match behavior {
        SplitBehavior::Removed => {
            pieces.extend(spans.iter().filter(|(_, m)| !m).map(|(s, _)| *s));
        }
        SplitBehavior::Isolated => {
            pieces.extend(spans.iter().map(|(s, _)| *s));
        }
        SplitBehavior::Contiguous => {
            let mut prev_match = false;
            for &(span, is_match) in &spans {
                match pieces.last_mut() {
                    Some(last) if is_match && prev_match => last.1 = span.1,
                    _ => pieces.push(span),
                }
                prev_match = is_match;
            }
        }
        SplitBehavior::MergedWithPrevious => {
            for &(span, is_match) in &spans {
                match pieces.last_mut() {
                    Some(last) if is_match => last.1 = span.1,
                    _ => pieces.push(span),
                }
            }
        }
        SplitBehavior::MergedWithNext => {
            let mut pending: Option<usize> = None;
            for &(span, is_match) in &spans {
                if is_match {
                    if pending.is_none() {
                        pending = Some(span.0);
                    }
                } else {
                    pieces.push((pending.take().unwrap_or(span.0), span.1));
                }
            }
            if let Some(start) = pending {
                pieces.push((start, text.len()));
            }
        }
    }

    pieces
        .into_iter()
        .filter(|(start, end)| end > start)
        .map(|(start, end)| text[start..end].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn literal(s: &str) -> Pattern {
        Pattern::Literal(s.to_string())
    }

    #[test]
    fn test_from_config_shapes() {
        assert!(matches!(
            Pattern::from_config(&json!({"String": "-"})).unwrap(),
            Some(Pattern::Literal(_))
        ));
        assert!(matches!(
            Pattern::from_config(&json!({"Regex": "\\s+"})).unwrap(),
            Some(Pattern::Regex(_))
        ));
        assert!(Pattern::from_config(&json!({"Glob": "*"})).unwrap().is_none());
        assert!(Pattern::from_config(&json!(null)).unwrap().is_none());
    }

    #[test]
    fn test_replace_all_literal() {
        assert_eq!(literal("``").replace_all("``hi`` there", "\""), "\"hi\" there");
        assert_eq!(literal("").replace_all("abc", "x"), "abc");
    }

    #[test]
    fn test_split_behaviors() {
        let dash = literal("-");
        let text = "a-b--c";
        assert_eq!(dash.split(text, SplitBehavior::Removed, false), ["a", "b", "c"]);
        assert_eq!(
            dash.split(text, SplitBehavior::Isolated, false),
            ["a", "-", "b", "-", "-", "c"]
        );
        assert_eq!(
            dash.split(text, SplitBehavior::Contiguous, false),
            ["a", "-", "b", "--", "c"]
        );
        assert_eq!(
            dash.split(text, SplitBehavior::MergedWithPrevious, false),
            ["a-", "b--", "c"]
        );
        assert_eq!(
            dash.split(text, SplitBehavior::MergedWithNext, false),
            ["a", "-b", "--c"]
        );
        assert_eq!(dash.split(text, SplitBehavior::Isolated, true), ["-", "-", "-"]);
    }

    #[test]
    fn test_regex_find_iter_unicode_letters() {
        let re = RegexBackend::new(r"\p{L}+").unwrap();
        let text = "héllo 世界 42";
        let words: Vec<&str> = re.find_iter(text).iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(words, ["héllo", "世界"]);
    }
}
