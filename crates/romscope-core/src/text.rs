//! Text helpers for fixed-size string fields

/// Windows-1252 mappings for 0x80..=0x9F. Undefined slots map to U+FFFD.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}', '\u{017D}', '\u{FFFD}',
    '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
];

/// Return the bytes before the first NUL
pub fn trim_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// Decode Windows-1252 text to UTF-8
pub fn cp1252_to_utf8(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => CP1252_HIGH[usize::from(b - 0x80)],
            _ => char::from(b),
        })
        .collect()
}

/// Decode Shift-JIS text, `None` if any byte sequence is invalid
pub fn shift_jis_to_utf8(bytes: &[u8]) -> Option<String> {
    encoding_rs::SHIFT_JIS
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// Decode text that is either Shift-JIS or Windows-1252.
///
/// Shift-JIS wins whenever the bytes are valid Shift-JIS, so a lone 0xA9
/// comes out as halfwidth katakana rather than a copyright sign. Anything
/// after the first NUL is dropped.
pub fn cp1252_sjis_to_utf8(bytes: &[u8]) -> String {
    let bytes = trim_nul(bytes);
    if bytes.is_ascii() {
        return cp1252_to_utf8(bytes);
    }
    shift_jis_to_utf8(bytes).unwrap_or_else(|| cp1252_to_utf8(bytes))
}

/// Decode ISO-8859-1 text to UTF-8
pub fn latin1_to_utf8(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Whether every byte is printable ASCII (0x20..=0x7E)
pub fn is_printable_ascii(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| (0x20..=0x7E).contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_nul() {
        assert_eq!(trim_nul(b"ABC\0DEF"), b"ABC");
        assert_eq!(trim_nul(b"ABC"), b"ABC");
        assert_eq!(trim_nul(b"\0"), b"");
    }

    #[test]
    fn test_cp1252_to_utf8() {
        assert_eq!(cp1252_to_utf8(b"Hello"), "Hello");
        // Euro sign, copyright sign, e-acute
        assert_eq!(cp1252_to_utf8(&[0x80, 0xA9, 0xE9]), "\u{20AC}\u{A9}\u{E9}");
        // Trademark and curly quotes
        assert_eq!(cp1252_to_utf8(&[0x99, 0x93, 0x94]), "\u{2122}\u{201C}\u{201D}");
    }

    #[test]
    fn test_cp1252_undefined_slots() {
        assert_eq!(cp1252_to_utf8(&[0x81, 0x8D, 0x8F, 0x90, 0x9D]), "\u{FFFD}".repeat(5));
    }

    #[test]
    fn test_cp1252_sjis_ascii_unchanged() {
        let path = b"C:\\Windows\\System32";
        assert_eq!(cp1252_sjis_to_utf8(path), "C:\\Windows\\System32");
        // Trailing NUL is trimmed
        let mut with_nul = path.to_vec();
        with_nul.push(0);
        assert_eq!(cp1252_sjis_to_utf8(&with_nul), "C:\\Windows\\System32");
    }

    #[test]
    fn test_cp1252_sjis_japanese() {
        // Fullwidth katakana "POKEMON"
        let pokemon = [0x83, 0x7C, 0x83, 0x50, 0x83, 0x82, 0x83, 0x93];
        assert_eq!(cp1252_sjis_to_utf8(&pokemon), "\u{30DD}\u{30B1}\u{30E2}\u{30F3}");
        // Halfwidth katakana "MARIO"
        assert_eq!(cp1252_sjis_to_utf8(&[0xCF, 0xD8, 0xB5, 0x00]), "\u{FF8F}\u{FF98}\u{FF75}");
    }

    #[test]
    fn test_cp1252_sjis_valid_sjis_wins() {
        // 0xA9 is a copyright sign in cp1252 but halfwidth katakana in Shift-JIS
        let text = b"\xA9 2002 Nintendo\0";
        assert_eq!(cp1252_sjis_to_utf8(text), "\u{FF69} 2002 Nintendo");
    }

    #[test]
    fn test_cp1252_sjis_fallback() {
        // 0xE9 starts a double-byte sequence but a space cannot end one
        assert_eq!(cp1252_sjis_to_utf8(b"Caf\xE9 Bar"), "Caf\u{E9} Bar");
        // 0xA0 and 0xFD..=0xFF are never valid Shift-JIS
        assert_eq!(cp1252_sjis_to_utf8(&[0x41, 0xA0, 0xFF]), "A\u{A0}\u{FF}");
        assert!(shift_jis_to_utf8(&[0x41, 0xA0]).is_none());
    }

    #[test]
    fn test_latin1_differs_from_cp1252_in_c1_range() {
        assert_eq!(latin1_to_utf8(&[0x80]), "\u{80}");
        assert_eq!(latin1_to_utf8(&[0xE9]), cp1252_to_utf8(&[0xE9]));
    }

    #[test]
    fn test_is_printable_ascii() {
        assert!(is_printable_ascii(b"SUPER MARIO WORLD    "));
        assert!(!is_printable_ascii(&[0x41, 0x00]));
        assert!(!is_printable_ascii(&[0xFF]));
    }
}
