//! Strict Shift-JIS conversion.
//!
//! Both directions refuse to substitute replacement characters: a run that
//! does not decode cleanly is not text, and a translation that cannot be
//! encoded must not be written.

use encoding_rs::SHIFT_JIS;

/// Shortest decoded string accepted as a text candidate, in characters.
pub const MIN_CHARS: usize = 2;

/// Decode a byte run. Returns `None` for malformed input or when the result
/// is shorter than [`MIN_CHARS`]. The text is returned untrimmed.
pub fn decode(bytes: &[u8]) -> Option<String> {
    let text = SHIFT_JIS.decode_without_bom_handling_and_without_replacement(bytes)?;
    if text.chars().count() < MIN_CHARS {
        return None;
    }
    Some(text.into_owned())
}

/// Encode a translation. On failure returns the first character that has no
/// Shift-JIS representation.
pub fn encode(text: &str) -> std::result::Result<Vec<u8>, char> {
    let (bytes, _, had_errors) = SHIFT_JIS.encode(text);
    if !had_errors {
        return Ok(bytes.into_owned());
    }

    let mut buf = [0u8; 4];
    let bad = text
        .chars()
        .find(|c| SHIFT_JIS.encode(c.encode_utf8(&mut buf)).2)
        .unwrap_or(char::REPLACEMENT_CHARACTER);
    Err(bad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_kanji_and_kana() {
        assert_eq!(decode(&[0x93, 0xFA, 0x96, 0x7B, 0x8C, 0xEA]).as_deref(), Some("日本語"));
        assert_eq!(decode(&[0x82, 0xA0, 0x82, 0xA2]).as_deref(), Some("あい"));
    }

    #[test]
    fn rejects_malformed_sequences() {
        assert_eq!(decode(&[0xFF, 0xFF, 0xFF, 0xFF]), None);
        // Lead byte with no trail byte.
        assert_eq!(decode(&[0x41, 0x42, 0x82]), None);
    }

    #[test]
    fn rejects_single_characters() {
        assert_eq!(decode(b"A"), None);
        assert_eq!(decode(&[0x82, 0xA0]), None);
        assert_eq!(decode(b"AB").as_deref(), Some("AB"));
    }

    #[test]
    fn keeps_surrounding_whitespace() {
        assert_eq!(decode(b" AB ").as_deref(), Some(" AB "));
    }

    #[test]
    fn encodes_newlines_as_single_bytes() {
        let bytes = encode("あ\nい").unwrap();
        assert_eq!(bytes, vec![0x82, 0xA0, 0x0A, 0x82, 0xA2]);
    }

    #[test]
    fn reports_first_unmappable_character() {
        assert_eq!(encode("ok 😀 ok 🎉"), Err('😀'));
        assert_eq!(encode("Hello").unwrap(), b"Hello".to_vec());
    }
}
