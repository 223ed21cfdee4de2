//! Incremental UTF-8 decoding.

/// Stateful byte-to-text decoder.
///
/// Bytes of a multi-byte character that arrive split across two reads are
/// held back until the rest of the character arrives. Invalid sequences
/// become U+FFFD. A byte-order mark at the very start of the stream is
/// dropped.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    /// Trailing bytes of an incomplete character.
    pending: Vec<u8>,
    /// Set once any text has been produced.
    started: bool,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next slice of the byte stream.
    ///
    /// Returns an empty string when `bytes` only extends an incomplete
    /// character.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        self.strip_bom(out)
    }

    /// Flush at end of stream.
    ///
    /// An incomplete trailing character becomes a single U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        self.strip_bom(char::REPLACEMENT_CHARACTER.to_string())
    }

    /// Whether bytes of an incomplete character are being held back.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn strip_bom(&mut self, text: String) -> String {
        if self.started || text.is_empty() {
            return text;
        }
        self.started = true;
        match text.strip_prefix('\u{FEFF}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"He"), "He");
        assert_eq!(decoder.decode(b"llo"), "llo");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_split_multibyte_character() {
        // "é" is 0xC3 0xA9
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'c', b'a', b'f', 0xC3]), "caf");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(&[0xA9, b'!']), "é!");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_four_byte_character_one_byte_at_a_time() {
        let bytes = "🦀".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        for (i, byte) in bytes.iter().enumerate() {
            let chunk = decoder.decode(&[*byte]);
            if i + 1 < bytes.len() {
                assert_eq!(chunk, "");
            }
            out.push_str(&chunk);
        }
        assert_eq!(out, "🦀");
    }

    #[test]
    fn test_invalid_byte_is_replaced() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn test_incomplete_at_end_of_stream() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_leading_bom_stripped_once() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[0xEF, 0xBB]), "");
        assert_eq!(decoder.decode(&[0xBF, b'o', b'k']), "ok");
        assert_eq!(decoder.decode("\u{FEFF}x".as_bytes()), "\u{FEFF}x");
    }

    proptest! {
        #[test]
        fn split_anywhere_decodes_like_whole(text in "\\PC{0,40}", cut in 0usize..200) {
            let bytes = text.as_bytes();
            let cut = cut.min(bytes.len());

            let mut decoder = Utf8StreamDecoder::new();
            let mut out = decoder.decode(&bytes[..cut]);
            out.push_str(&decoder.decode(&bytes[cut..]));
            out.push_str(&decoder.finish());

            let expected = text.strip_prefix('\u{FEFF}').unwrap_or(&text);
            prop_assert_eq!(out, expected);
        }
    }
}
