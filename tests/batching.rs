//! Integration tests for batch tokenization: padding, truncation, added-token
//! splitting and the error surface.

use serde_json::{json, Value};
use tokenpipe::{DecodeOptions, TextInput, TokenizeOptions, Tokenizer, TokenizerError};

/// Right padding to the longest row with a parallel attention mask.
#[test]
fn test_padding_to_longest() {
    let tokenizer = create_letters_tokenizer(json!({"pad_token": "[PAD]"}));
    let id_a = tokenizer.token_to_id("a").unwrap();
    let texts = vec!["a".to_string(), "a a a".to_string()];

    let batch = tokenizer
        .tokenize(
            &texts,
            TokenizeOptions {
                padding: true,
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(
        batch.input_ids.rows().unwrap(),
        [vec![id_a, 0, 0], vec![id_a, id_a, id_a]]
    );
    assert_eq!(
        batch.attention_mask.rows().unwrap(),
        [vec![1, 0, 0], vec![1, 1, 1]]
    );
    assert!(batch.token_type_ids.is_none());
}

/// Without padding rows keep their own lengths.
#[test]
fn test_no_padding_keeps_ragged_rows() {
    let tokenizer = create_letters_tokenizer(Value::Null);
    let texts = vec!["a".to_string(), "a b".to_string()];
    let batch = tokenizer.tokenize(&texts, TokenizeOptions::default()).unwrap();
    let rows = batch.input_ids.rows().unwrap();
    assert_eq!(rows[0].len(), 1);
    assert_eq!(rows[1].len(), 2);
}

/// Truncation to an explicit max_length, then padding up to it.
#[test]
fn test_truncate_then_pad() {
    let tokenizer = create_letters_tokenizer(json!({"pad_token": "[PAD]"}));
    let texts = vec!["a b c d e".to_string(), "a".to_string()];
    let batch = tokenizer
        .tokenize(
            &texts,
            TokenizeOptions {
                padding: true,
                truncation: true,
                max_length: Some(3),
                return_tensor: true,
                ..Default::default()
            },
        )
        .unwrap();

    let a = tokenizer.token_to_id("a").unwrap();
    let b = tokenizer.token_to_id("b").unwrap();
    let c = tokenizer.token_to_id("c").unwrap();
    let ids = batch.input_ids.tensor().unwrap();
    assert_eq!(ids.dims, [2, 3]);
    assert_eq!(ids.row(0).unwrap(), [a, b, c].map(i64::from));
    assert_eq!(ids.row(1).unwrap(), [i64::from(a), 0, 0]);
    assert_eq!(batch.attention_mask.tensor().unwrap().data, [1, 1, 1, 1, 0, 0]);
}

/// `pre<mask>post` keeps the added token as one id.
#[test]
fn test_added_token_split() {
    let tokenizer = create_letters_tokenizer(Value::Null);
    let pre = tokenizer.encode("pre", None).unwrap();
    let post = tokenizer.encode("post", None).unwrap();

    let ids = tokenizer.encode("pre<mask>post", None).unwrap();
    let expected: Vec<u32> = pre.iter().copied().chain([99]).chain(post).collect();
    assert_eq!(ids, expected);
    assert!(tokenizer.is_special(99));
}

/// The added token literal is matched before normalization.
#[test]
fn test_added_token_not_normalized() {
    let tokenizer = create_letters_tokenizer(Value::Null);
    assert_eq!(
        tokenizer.to_tokens("AB<mask>").unwrap(),
        ["a", "##b", "<mask>"]
    );
    assert_eq!(tokenizer.to_tokens("<MASK>").unwrap(), ["[UNK]"]);
}

#[test]
fn test_pair_batch() {
    let tokenizer = create_letters_tokenizer(json!({"pad_token": "[PAD]"}));
    let texts = vec!["a".to_string(), "b".to_string()];
    let pairs = vec!["c".to_string(), "d e".to_string()];
    let batch = tokenizer
        .tokenize(
            &texts,
            TokenizeOptions {
                text_pair: Some(TextInput::from(&pairs)),
                padding: true,
                return_token_type_ids: true,
                ..Default::default()
            },
        )
        .unwrap();
    let rows = batch.input_ids.rows().unwrap();
    assert_eq!(rows[0].len(), 3);
    assert_eq!(rows[1].len(), 3);
    assert_eq!(batch.attention_mask.rows().unwrap()[0], [1, 1, 0]);
}

#[test]
fn test_mismatched_pair_lengths() {
    let tokenizer = create_letters_tokenizer(Value::Null);
    let texts = vec!["a".to_string(), "b".to_string()];
    let pairs = vec!["c".to_string()];
    let result = tokenizer.tokenize(
        &texts,
        TokenizeOptions {
            text_pair: Some(TextInput::from(&pairs)),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(TokenizerError::InputShape(_))));
}

#[test]
fn test_tensor_from_ragged_rows() {
    let tokenizer = create_letters_tokenizer(Value::Null);
    let texts = vec!["a".to_string(), "a a".to_string()];
    let result = tokenizer.tokenize(
        &texts,
        TokenizeOptions {
            return_tensor: true,
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(TokenizerError::InputShape(_))));
}

#[test]
fn test_decode_empty_ids() {
    let tokenizer = create_letters_tokenizer(Value::Null);
    assert!(matches!(
        tokenizer.decode(&[], DecodeOptions::default()),
        Err(TokenizerError::DecodeType(_))
    ));
}

#[test]
fn test_unknown_model_type() {
    let definition = json!({"model": {"type": "CharLevel", "vocab": {}}});
    assert!(matches!(
        Tokenizer::from_json_values(definition, Value::Null),
        Err(TokenizerError::Config(_))
    ));
}

#[test]
fn test_missing_file() {
    let result = Tokenizer::from_files("/nonexistent/tokenizer.json", None);
    assert!(matches!(result, Err(TokenizerError::IoError(_))));
}

/// Lowercasing WordPiece over single letters with no post-processor, so
/// every row is exactly its tokens.
fn create_letters_tokenizer(settings: Value) -> Tokenizer {
    let mut vocab = serde_json::Map::new();
    vocab.insert("[PAD]".to_string(), json!(0));
    vocab.insert("[UNK]".to_string(), json!(1));
    let mut next = 2;
    for c in 'a'..='z' {
        vocab.insert(c.to_string(), json!(next));
        vocab.insert(format!("##{c}"), json!(next + 1));
        next += 2;
    }

    let definition = json!({
        "normalizer": {"type": "Lowercase"},
        "pre_tokenizer": {"type": "WhitespaceSplit"},
        "model": {"type": "WordPiece", "vocab": vocab},
        "added_tokens": [
            {"id": 0, "content": "[PAD]", "special": true},
            {"id": 99, "content": "<mask>", "special": true}
        ]
    });
    Tokenizer::from_json_values(definition, settings).unwrap()
}
