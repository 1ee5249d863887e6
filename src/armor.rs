//! Text armoring for binary tokens
//!
//! Tokens are stored as URL-safe base64 with padding. The armored form is:
//! - Free of whitespace (including newlines)
//! - Safe to embed in URLs
//! - Safe to pass unescaped in a POSIX shell

use crate::error::{Error, ErrorCategory, ErrorKind, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE};

/// Wrap bytes in armor
pub fn wrap(body: &[u8]) -> String {
    URL_SAFE.encode(body)
}

/// Length of the armored form of a `body_len` byte body.
pub const fn wrapped_len(body_len: usize) -> usize {
    body_len.div_ceil(3) * 4
}

/// Unwrap armored bytes, returning the original body.
///
/// Trailing ASCII whitespace (such as a newline added by an editor) is
/// ignored. Anything that does not decode is reported as an authentication
/// failure, since it cannot be a token.
pub fn unwrap(armored: &[u8]) -> Result<Vec<u8>> {
    let armored = armored.trim_ascii_end();
    URL_SAFE.decode(armored).map_err(|e| {
        Error::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "input is not a sealfile token (base64 decoding failed)",
            e,
        )
    })
}

/// True if `byte` belongs to the URL-safe base64 alphabet, padding excluded.
pub fn is_alphabet(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

/// Decode a leading window of an armored token.
///
/// Only whole 4-character quanta are decoded, so a sample cut from the
/// middle of a long token still decodes. Returns `None` for anything that is
/// not base64 in the token alphabet.
pub fn decode_prefix(sample: &[u8]) -> Option<Vec<u8>> {
    let sample = sample.trim_ascii_end();
    let body_len = sample
        .iter()
        .position(|&b| b == b'=')
        .unwrap_or(sample.len());
    if !sample[..body_len].iter().all(|&b| is_alphabet(b)) {
        return None;
    }
    if body_len < sample.len() {
        // Padding is only valid as the final part of a complete token.
        if sample.len() % 4 != 0 || sample.len() - body_len > 2 {
            return None;
        }
        return URL_SAFE.decode(sample).ok();
    }
    let whole = sample.len() - sample.len() % 4;
    URL_SAFE.decode(&sample[..whole]).ok()
}
