//! Special-token insertion around encoded sequences.

use rustc_hash::FxHashMap;

use super::config::{PostProcessorConfig, SequenceId, TemplateItem, TemplateSpecialToken};
use super::error::{Result, TokenizerError};

/// Ids of one model input together with their segment ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<u32>,
    pub type_ids: Vec<u32>,
}

impl Encoding {
    pub fn new(ids: Vec<u32>, type_id: u32) -> Self {
        let type_ids = vec![type_id; ids.len()];
        Self { ids, type_ids }
    }

    /// `a` followed by `b`, with type ids 0 and 1.
    pub fn from_sequences(a: &[u32], b: Option<&[u32]>) -> Self {
        let mut out = Self::new(a.to_vec(), 0);
        if let Some(b) = b {
            out.extend(b, 1);
        }
        out
    }

    /// Keep `max_len` ids, dropping from the left or the right end.
    pub fn truncate(&mut self, max_len: usize, from_left: bool) {
        if self.ids.len() <= max_len {
            return;
        }
        if from_left {
            let excess = self.ids.len() - max_len;
            self.ids.drain(..excess);
            self.type_ids.drain(..excess);
        } else {
            self.ids.truncate(max_len);
            self.type_ids.truncate(max_len);
        }
    }

    fn push(&mut self, id: u32, type_id: u32) {
        self.ids.push(id);
        self.type_ids.push(type_id);
    }

    fn extend(&mut self, ids: &[u32], type_id: u32) {
        self.ids.extend_from_slice(ids);
        self.type_ids.extend(std::iter::repeat(type_id).take(ids.len()));
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePiece {
    Special { ids: Vec<u32>, type_id: u32 },
    Sequence { id: SequenceId, type_id: u32 },
}

#[derive(Debug, Clone)]
pub enum PostProcessor {
    Template {
        single: Vec<TemplatePiece>,
        pair: Vec<TemplatePiece>,
    },
    /// `<s> A </s>` and `<s> A </s> </s> B </s>`, every type id 0.
    Roberta { cls: u32, sep: u32 },
    /// `[CLS] A [SEP]` and `[CLS] A [SEP] B [SEP]`, type id 1 for the B part.
    Bert { cls: u32, sep: u32 },
    ByteLevel,
    Sequence(Vec<PostProcessor>),
}

impl PostProcessor {
    /// Resolve a processor. Template special tokens are looked up in the
    /// template's own table first, then through `token_to_id`.
    pub fn from_config<F>(config: &PostProcessorConfig, token_to_id: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<u32>,
    {
        Ok(match config {
            PostProcessorConfig::TemplateProcessing {
                single,
                pair,
                special_tokens,
            } => PostProcessor::Template {
                single: resolve_template(single, special_tokens, token_to_id)?,
                pair: resolve_template(pair, special_tokens, token_to_id)?,
            },
            PostProcessorConfig::RobertaProcessing { sep, cls } => PostProcessor::Roberta {
                cls: cls.1,
                sep: sep.1,
            },
            PostProcessorConfig::BertProcessing { sep, cls } => PostProcessor::Bert {
                cls: cls.1,
                sep: sep.1,
            },
            PostProcessorConfig::ByteLevel {} => PostProcessor::ByteLevel,
            PostProcessorConfig::Sequence { processors } => PostProcessor::Sequence(
                processors
                    .iter()
                    .map(|p| PostProcessor::from_config(p, token_to_id))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    /// Assemble the model input from sequence A and optional sequence B.
    ///
    /// Without `add_special_tokens` the sequences are only concatenated.
    pub fn process(&self, a: &[u32], b: Option<&[u32]>, add_special_tokens: bool) -> Encoding {
        if !add_special_tokens {
            return Encoding::from_sequences(a, b);
        }
        match self {
            PostProcessor::ByteLevel => Encoding::from_sequences(a, b),
            PostProcessor::Sequence(children) => {
                match children
                    .iter()
                    .rev()
                    .find(|child| !matches!(child, PostProcessor::ByteLevel))
                {
                    Some(child) => child.process(a, b, true),
                    None => Encoding::from_sequences(a, b),
                }
            }
            PostProcessor::Roberta { cls, sep } => {
                let mut out = Encoding::default();
                out.push(*cls, 0);
                out.extend(a, 0);
                out.push(*sep, 0);
                if let Some(b) = b {
                    out.push(*sep, 0);
                    out.extend(b, 0);
                    out.push(*sep, 0);
                }
                out
            }
            PostProcessor::Bert { cls, sep } => {
                let mut out = Encoding::default();
                out.push(*cls, 0);
                out.extend(a, 0);
                out.push(*sep, 0);
                if let Some(b) = b {
                    out.extend(b, 1);
                    out.push(*sep, 1);
                }
                out
            }
            PostProcessor::Template { single, pair } => match b {
                Some(b) if !pair.is_empty() => apply_template(pair, a, Some(b)),
                Some(b) => {
                    let mut out = apply_template(single, a, None);
                    out.extend(b, 1);
                    out
                }
                None => apply_template(single, a, None),
            },
        }
    }

    /// Number of ids the processor adds around the sequences.
    pub fn added_tokens(&self, is_pair: bool) -> usize {
        let empty: &[u32] = &[];
        let b = if is_pair { Some(empty) } else { None };
        self.process(empty, b, true).len()
    }
}

fn resolve_template<F>(
    items: &[TemplateItem],
    special_tokens: &FxHashMap<String, TemplateSpecialToken>,
    token_to_id: &F,
) -> Result<Vec<TemplatePiece>>
where
    F: Fn(&str) -> Option<u32>,
{
    let mut pieces = Vec::with_capacity(items.len());
    for item in items {
        pieces.push(match item {
            TemplateItem::Sequence { id, type_id } => TemplatePiece::Sequence {
                id: *id,
                type_id: *type_id,
            },
            TemplateItem::SpecialToken { id, type_id } => {
                let ids = match special_tokens.get(id) {
                    Some(token) if !token.ids.is_empty() => token.ids.clone(),
                    _ => vec![token_to_id(id).ok_or_else(|| {
                        TokenizerError::config(format!("template special token {id:?} has no id"))
                    })?],
                };
                TemplatePiece::Special {
                    ids,
                    type_id: *type_id,
                }
            }
        });
    }
    Ok(pieces)
}

fn apply_template(template: &[TemplatePiece], a: &[u32], b: Option<&[u32]>) -> Encoding {
    let mut out = Encoding::default();
    for piece in template {
        match piece {
            TemplatePiece::Special { ids, type_id } => out.extend(ids, *type_id),
            TemplatePiece::Sequence {
                id: SequenceId::A,
                type_id,
            } => out.extend(a, *type_id),
            TemplatePiece::Sequence {
                id: SequenceId::B,
                type_id,
            } => {
                if let Some(b) = b {
                    out.extend(b, *type_id);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lookup(token: &str) -> Option<u32> {
        match token {
            "[CLS]" => Some(101),
            "[SEP]" => Some(102),
            _ => None,
        }
    }

    fn build(config: serde_json::Value) -> Result<PostProcessor> {
        let config: PostProcessorConfig = serde_json::from_value(config).unwrap();
        PostProcessor::from_config(&config, &lookup)
    }

    fn bert_template() -> PostProcessor {
        build(json!({
            "type": "TemplateProcessing",
            "single": [
                {"SpecialToken": {"id": "[CLS]", "type_id": 0}},
                {"Sequence": {"id": "A", "type_id": 0}},
                {"SpecialToken": {"id": "[SEP]", "type_id": 0}}
            ],
            "pair": [
                {"SpecialToken": {"id": "[CLS]", "type_id": 0}},
                {"Sequence": {"id": "A", "type_id": 0}},
                {"SpecialToken": {"id": "[SEP]", "type_id": 0}},
                {"Sequence": {"id": "B", "type_id": 1}},
                {"SpecialToken": {"id": "[SEP]", "type_id": 1}}
            ],
            "special_tokens": {
                "[CLS]": {"id": "[CLS]", "ids": [1], "tokens": ["[CLS]"]},
                "[SEP]": {"id": "[SEP]", "ids": [2], "tokens": ["[SEP]"]}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_template_single_and_pair() {
        let p = bert_template();
        let single = p.process(&[7, 8], None, true);
        assert_eq!(single.ids, [1, 7, 8, 2]);
        assert_eq!(single.type_ids, [0, 0, 0, 0]);

        let pair = p.process(&[7], Some(&[9, 10]), true);
        assert_eq!(pair.ids, [1, 7, 2, 9, 10, 2]);
        assert_eq!(pair.type_ids, [0, 0, 0, 1, 1, 1]);
        assert_eq!(p.added_tokens(false), 2);
        assert_eq!(p.added_tokens(true), 3);
    }

    #[test]
    fn test_template_falls_back_to_vocab_lookup() {
        let p = build(json!({
            "type": "TemplateProcessing",
            "single": [{"SpecialToken": {"id": "[CLS]"}}, {"Sequence": {"id": "A"}}]
        }))
        .unwrap();
        assert_eq!(p.process(&[5], None, true).ids, [101, 5]);
    }

    #[test]
    fn test_template_unknown_special_is_config_error() {
        let err = build(json!({
            "type": "TemplateProcessing",
            "single": [{"SpecialToken": {"id": "<nope>"}}]
        }));
        assert!(matches!(err, Err(TokenizerError::Config(_))));
    }

    #[test]
    fn test_roberta_doubles_separator() {
        let p = build(json!({
            "type": "RobertaProcessing",
            "cls": ["<s>", 0],
            "sep": ["</s>", 2]
        }))
        .unwrap();
        assert_eq!(p.process(&[5, 6], None, true).ids, [0, 5, 6, 2]);
        assert_eq!(p.process(&[5], Some(&[6]), true).ids, [0, 5, 2, 2, 6, 2]);
    }

    #[test]
    fn test_bert_processing_type_ids() {
        let p = build(json!({
            "type": "BertProcessing",
            "cls": ["[CLS]", 101],
            "sep": ["[SEP]", 102]
        }))
        .unwrap();
        let enc = p.process(&[5], Some(&[6]), true);
        assert_eq!(enc.ids, [101, 5, 102, 6, 102]);
        assert_eq!(enc.type_ids, [0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_byte_level_and_sequence() {
        let p = build(json!({"type": "ByteLevel"})).unwrap();
        assert_eq!(p.process(&[1, 2], Some(&[3]), true).ids, [1, 2, 3]);

        let p = build(json!({
            "type": "Sequence",
            "processors": [
                {"type": "ByteLevel"},
                {"type": "RobertaProcessing", "cls": ["<s>", 0], "sep": ["</s>", 2]}
            ]
        }))
        .unwrap();
        assert_eq!(p.process(&[5], None, true).ids, [0, 5, 2]);
    }

    #[test]
    fn test_truncate_sides() {
        let mut enc = Encoding::from_sequences(&[1, 2, 3], Some(&[4]));
        enc.truncate(3, true);
        assert_eq!(enc.ids, [2, 3, 4]);
        assert_eq!(enc.type_ids, [0, 0, 1]);
        enc.truncate(1, false);
        assert_eq!(enc.ids, [2]);
    }

    #[test]
    fn test_without_special_tokens() {
        let p = bert_template();
        let enc = p.process(&[7], Some(&[8]), false);
        assert_eq!(enc.ids, [7, 8]);
        assert_eq!(enc.type_ids, [0, 1]);
    }
}
