//! Text decoding for the 8-bit and 16-bit encodings found in headers.

use encoding_rs::{SHIFT_JIS, UTF_16LE, WINDOWS_1252};

/// Latin-1: every byte maps to the code point of the same value.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Bytes up to the first NUL (or the whole slice if there is none).
pub fn until_nul(bytes: &[u8]) -> &[u8] {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..len]
}

/// Fixed-size Shift-JIS field, cut at the first NUL.
///
/// Plain ASCII passes through unchanged. Bytes that are not valid
/// Shift-JIS are read as Windows-1252 instead.
pub fn sjis_field_to_string(bytes: &[u8]) -> String {
    let bytes = until_nul(bytes);
    let (s, _, had_errors) = SHIFT_JIS.decode(bytes);
    if !had_errors {
        return s.trim_end().to_string();
    }
    let (s, _, _) = WINDOWS_1252.decode(bytes);
    s.trim_end().to_string()
}

/// UTF-16LE without a BOM. Unpaired surrogates become U+FFFD.
pub fn utf16le_to_string(bytes: &[u8]) -> String {
    let (s, _) = UTF_16LE.decode_without_bom_handling(bytes);
    s.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_maps_high_bytes() {
        assert_eq!(latin1_to_string(b"abc"), "abc");
        assert_eq!(latin1_to_string(&[0xE9, 0xFF]), "éÿ");
    }

    #[test]
    fn sjis_stops_at_nul_and_trims() {
        assert_eq!(sjis_field_to_string(b"BASLUS-00001  \0junk"), "BASLUS-00001");
        // "テスト" in Shift-JIS
        let jp = [0x83, 0x65, 0x83, 0x58, 0x83, 0x67, 0x00, 0x00];
        assert_eq!(sjis_field_to_string(&jp), "テスト");
    }

    #[test]
    fn invalid_sjis_falls_back_to_cp1252() {
        // 0xE9 opens a two-byte sequence that never completes
        assert_eq!(sjis_field_to_string(b"Fianc\xe9\0"), "Fiancé");
        assert_eq!(sjis_field_to_string(&[b'A', 0xA0, 0x80]), "A\u{a0}€");
    }

    #[test]
    fn utf16le_decodes() {
        let bytes: Vec<u8> = "Sonic".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(utf16le_to_string(&bytes), "Sonic");
    }
}
