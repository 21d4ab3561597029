//! Hex-pair codec for program images.
//!
//! A program is written as a string of hexadecimal digit pairs, one pair
//! per byte, starting at address 0. Digits are case-insensitive.

use thiserror::Error;

/// Decode a string of hex digit pairs into bytes.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, HexError> {
    let digits = text.as_bytes();
    if digits.len() % 2 != 0 {
        return Err(HexError::OddLength(digits.len()));
    }

    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for (i, pair) in digits.chunks_exact(2).enumerate() {
        let hi = nibble(pair[0]).ok_or_else(|| invalid_char(text, i * 2))?;
        let lo = nibble(pair[1]).ok_or_else(|| invalid_char(text, i * 2 + 1))?;
        bytes.push((hi << 4) | lo);
    }

    Ok(bytes)
}

/// Encode bytes as uppercase hex pairs.
pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

fn nibble(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

fn invalid_char(text: &str, offset: usize) -> HexError {
    // Non-ASCII input lands mid-character; report the raw byte position.
    let found = text
        .get(offset..)
        .and_then(|rest| rest.chars().next())
        .unwrap_or(char::REPLACEMENT_CHARACTER);
    HexError::InvalidChar { found, offset }
}

/// Errors produced while decoding hex text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("odd number of hex digits: {0}")]
    OddLength(usize),

    #[error("invalid hex character {found:?} at offset {offset}")]
    InvalidChar { found: char, offset: usize },
}
