//! Integration tests for a GPT-2 style byte-level BPE pipeline.
//!
//! The fixture is a reduced GPT-2 layout: `Ġ` stands for a leading space
//! and merges are listed in rank order as `"left right"` strings.

use serde_json::json;
use tokenpipe::core::config::PreTokenizerConfig;
use tokenpipe::core::{byte_level_encode, PreTokenizer};
use tokenpipe::{DecodeOptions, Tokenizer};

const SAMPLE_TEXT: &str = "Hello world, hello!";

/// Inputs paired with their GPT-2 pre-tokenizer splits.
const SPLIT_CASES: &[(&str, &[&str])] = &[
    ("hello world", &["hello", " world"]),
    ("Hello World", &["Hello", " World"]),
    ("How are you doing?", &["How", " are", " you", " doing", "?"]),
    ("You should've done this", &["You", " should", "'ve", " done", " this"]),
    (
        "A\n'll !!to?'d''d of, can't.",
        &["A", "\n", "'ll", " !!", "to", "?'", "d", "''", "d", " of", ",", " can", "'t", "."],
    ),
    ("def main():\n\tpass", &["def", " main", "():", "\n", "\t", "pass"]),
    ("This\n\nis\na\ntest.", &["This", "\n", "\n", "is", "\n", "a", "\n", "test", "."]),
    (
        "let a = obj.toString();\ntoString();",
        &["let", " a", " =", " obj", ".", "toString", "();", "\n", "toString", "();"],
    ),
    ("Hi  Hello", &["Hi", " ", " Hello"]),
    ("trailing space   ", &["trailing", " space", "   "]),
    ("   leading space", &["  ", " leading", " space"]),
    ("生活的真谛是", &["生活的真谛是"]),
];

/// Segmentation under the fixture's hand-written merge ranks.
#[test]
fn test_bpe_merge_ranks() {
    let tokenizer = create_bpe_tokenizer();

    assert_eq!(
        tokenizer.to_tokens(SAMPLE_TEXT).unwrap(),
        ["Hello", "Ġworld", ",", "Ġhello", "!"]
    );
    assert_eq!(tokenizer.encode(SAMPLE_TEXT, None).unwrap(), [14, 19, 1, 22, 0]);
}

/// Merges depend on the leading space: "hello" at the start of the text
/// has no `Ġh` merge to reach the whole word.
#[test]
fn test_bpe_word_position() {
    let tokenizer = create_bpe_tokenizer();
    assert_eq!(tokenizer.to_tokens("hello").unwrap(), ["h", "e", "llo"]);
    assert_eq!(tokenizer.to_tokens(" hello").unwrap(), ["Ġhello"]);
}

#[test]
fn test_bpe_roundtrip() {
    let tokenizer = create_bpe_tokenizer();
    let ids = tokenizer.encode(SAMPLE_TEXT, None).unwrap();
    let text = tokenizer.decode(&ids, DecodeOptions::default()).unwrap();
    assert_eq!(text, SAMPLE_TEXT);
}

/// Added tokens are matched before the byte-level split and decoded verbatim.
#[test]
fn test_bpe_added_token() {
    let tokenizer = create_bpe_tokenizer();
    let ids = tokenizer.encode("Hello<|endoftext|> world", None).unwrap();
    assert_eq!(ids, [14, 23, 19]);

    let text = tokenizer.decode(&ids, DecodeOptions::default()).unwrap();
    assert_eq!(text, "Hello<|endoftext|> world");

    let skipped = tokenizer
        .decode(
            &ids,
            DecodeOptions {
                skip_special_tokens: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(skipped, "Hello world");
}

/// Warm and cold caches give identical output.
#[test]
fn test_bpe_cache() {
    let tokenizer = create_bpe_tokenizer();
    let cold = tokenizer.encode(SAMPLE_TEXT, None).unwrap();
    assert!(tokenizer.cache_len() > 0);

    let warm = tokenizer.encode(SAMPLE_TEXT, None).unwrap();
    assert_eq!(cold, warm);

    tokenizer.clear_cache();
    assert_eq!(tokenizer.cache_len(), 0);
    assert_eq!(tokenizer.encode(SAMPLE_TEXT, None).unwrap(), cold);
}

#[test]
fn test_bpe_settings() {
    let tokenizer = create_bpe_tokenizer();
    assert_eq!(tokenizer.eos_token_id(), Some(23));
    assert_eq!(tokenizer.pad_token_id(), Some(23));
    assert_eq!(tokenizer.model_max_length(), Some(1024));
    assert_eq!(tokenizer.vocab_size(), 24);
    assert!(tokenizer.is_special(23));
}

/// Incremental decoding reproduces the full decode.
#[test]
fn test_bpe_streaming_matches_decode() {
    let tokenizer = create_bpe_tokenizer();
    let ids = tokenizer.encode(SAMPLE_TEXT, None).unwrap();

    let mut decoder = tokenizer.streaming_decoder();
    let mut streamed = String::new();
    for &id in &ids {
        if let Some(text) = decoder.add_token(id) {
            streamed.push_str(&text);
        }
    }
    streamed.push_str(&decoder.flush());
    assert_eq!(streamed, SAMPLE_TEXT);
}

/// Batch encoding matches per-text encoding.
#[test]
fn test_bpe_encode_batch() {
    let tokenizer = create_bpe_tokenizer();
    let texts = vec![SAMPLE_TEXT.to_string(), "hello".to_string()];
    let batch = tokenizer.encode_batch(&texts).unwrap();
    assert_eq!(batch[0], tokenizer.encode(SAMPLE_TEXT, None).unwrap());
    assert_eq!(batch[1], [5, 4, 13]);
}

#[test]
fn test_byte_level_splits() {
    let config: PreTokenizerConfig =
        serde_json::from_value(json!({"type": "ByteLevel", "add_prefix_space": false})).unwrap();
    let pre_tokenizer = PreTokenizer::from_config(&config).unwrap();
    for &(text, expected) in SPLIT_CASES {
        assert_eq!(expected.concat(), text);
        assert_eq!(pre_tokenizer.pre_tokenize(text, true), expected, "input {text:?}");
    }
}

/// With one token per byte every input survives encode then decode,
/// whitespace and multi-byte characters included.
#[test]
fn test_byte_level_roundtrip_without_merges() {
    let tokenizer = create_byte_tokenizer();
    for &(text, _) in SPLIT_CASES {
        let ids = tokenizer.encode(text, None).unwrap();
        assert_eq!(ids.len(), text.len(), "input {text:?}");
        let decoded = tokenizer.decode(&ids, DecodeOptions::default()).unwrap();
        assert_eq!(decoded, text);
    }
}

/// Every byte as its own token, no merges.
fn create_byte_tokenizer() -> Tokenizer {
    let mut vocab = serde_json::Map::new();
    for b in 0u8..=255 {
        vocab.insert(byte_level_encode(&[b]), json!(b as u32));
    }
    let definition = json!({
        "pre_tokenizer": {"type": "ByteLevel", "add_prefix_space": false},
        "model": {"type": "BPE", "vocab": vocab, "merges": []},
        "decoder": {"type": "ByteLevel"}
    });
    Tokenizer::from_json_values(definition, json!({"clean_up_tokenization_spaces": false}))
        .unwrap()
}

fn create_bpe_tokenizer() -> Tokenizer {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
    Tokenizer::from_files(
        format!("{dir}/bpe_bytelevel.json"),
        Some(format!("{dir}/bpe_bytelevel_config.json")),
    )
    .unwrap()
}
