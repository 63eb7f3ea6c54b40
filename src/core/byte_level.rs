//! Byte ↔ printable-character table used by byte-level BPE.
//!
//! Every byte value (0-255) maps to exactly one visible Unicode character, so
//! any UTF-8 input, multi-byte sequences included, can be spelled with ordinary
//! vocabulary characters:
//!
//! - Bytes 33-126, 161-172 and 174-255 map to the character with the same code point
//! - The remaining 68 bytes (controls, space, NBSP, soft hyphen) map to U+0100 onwards
//!
//! This is the GPT-2 `bytes_to_unicode` layout, so vocabularies published for
//! GPT-2, RoBERTa, CLIP and CodeGen use these characters in their `vocab`/`merges`.
//!
//! ```ignore
//! assert_eq!(byte_level_encode(b" hi"), "\u{120}hi");
//! assert_eq!(byte_level_decode("\u{120}hi").unwrap(), b" hi");
//! ```

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

static BYTE_TO_CHAR: LazyLock<[char; 256]> = LazyLock::new(|| {
    let mut table = ['\0'; 256];
    let is_direct = |b: u8| matches!(b, 33..=126 | 161..=172 | 174..=255);

    let mut shifted = 0x100u32;
    for b in 0u8..=255 {
        table[b as usize] = if is_direct(b) {
            b as char
        } else {
            let ch = char::from_u32(shifted).unwrap_or(char::REPLACEMENT_CHARACTER);
            shifted += 1;
            ch
        };
    }
    table
});

static CHAR_TO_BYTE: LazyLock<FxHashMap<char, u8>> = LazyLock::new(|| {
    BYTE_TO_CHAR
        .iter()
        .enumerate()
        .map(|(byte, &ch)| (ch, byte as u8))
        .collect()
});

/// Spell raw bytes with table characters.
#[inline]
pub fn byte_level_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| BYTE_TO_CHAR[b as usize]).collect()
}

/// Map table characters back to raw bytes.
///
/// Returns `None` if `text` contains a character outside the table.
#[inline]
pub fn byte_level_decode(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|ch| CHAR_TO_BYTE.get(&ch).copied())
        .collect()
}

/// Map table characters back to raw bytes, passing any other character
/// through as its own UTF-8 encoding.
///
/// Decoders use this so that text injected after encoding (a space standing
/// in for an end-of-word suffix, for instance) survives the round trip.
pub fn byte_level_decode_lossless(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut utf8 = [0u8; 4];
    for ch in text.chars() {
        match CHAR_TO_BYTE.get(&ch) {
            Some(&b) => out.push(b),
            None => out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes()),
        }
    }
    out
}

/// Check if a character is part of the table.
#[inline]
pub fn is_byte_level_char(ch: char) -> bool {
    CHAR_TO_BYTE.contains_key(&ch)
}
