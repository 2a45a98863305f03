//! Hex codec for keystore values
//!
//! Keystore values are big-endian nibble packed: the first character of
//! each pair is the high nibble.

use crate::error::HexError;

/// Decode an even-length hex string into bytes
pub fn decode(hex: &str) -> Result<Vec<u8>, HexError> {
    let bytes = hex.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(HexError::OddLength(bytes.len()));
    }

    let mut out = Vec::with_capacity(bytes.len() / 2);
    for i in (0..bytes.len()).step_by(2) {
        let hi = nibble(hex, i)?;
        let lo = nibble(hex, i + 1)?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

/// Encode bytes as lowercase hex
pub fn encode(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0x0f) as usize] as char);
    }
    out
}

fn nibble(hex: &str, offset: usize) -> Result<u8, HexError> {
    match hex.as_bytes()[offset] {
        b @ b'0'..=b'9' => Ok(b - b'0'),
        b @ b'a'..=b'f' => Ok(b - b'a' + 10),
        b @ b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(HexError::InvalidChar {
            // offset may land inside a multi-byte char; report the whole char
            ch: hex
                .char_indices()
                .take_while(|(start, _)| *start <= offset)
                .last()
                .map_or(char::REPLACEMENT_CHARACTER, |(_, ch)| ch),
            offset,
        }),
    }
}
