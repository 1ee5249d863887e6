//! Key-free classification of files as token or plaintext
//!
//! This is a structural heuristic, not an authenticated check. It exists so
//! batch tooling can decide which files to encrypt and which to decrypt
//! without holding the key. Adversarially crafted plaintext can fool it.
//!
//! Classification never fails: unreadable files, short files, and anything
//! ambiguous are reported as not encrypted.

use crate::armor;
use crate::token::{ARMORED_PREFIX, MIN_ARMORED_LEN, MIN_TOKEN_LEN};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::trace;

/// Number of leading bytes inspected
pub const SAMPLE_LEN: usize = 100;

/// Classify the file at `path`.
pub fn is_encrypted(path: &Path) -> bool {
    let mut sample = Vec::with_capacity(SAMPLE_LEN);
    let read = File::open(path).and_then(|f| f.take(SAMPLE_LEN as u64).read_to_end(&mut sample));
    match read {
        Ok(_) => looks_encrypted(&sample),
        Err(e) => {
            trace!(path = %path.display(), error = %e, "unreadable; treating as plaintext");
            false
        }
    }
}

/// Classify the leading bytes of a file.
pub fn looks_encrypted(sample: &[u8]) -> bool {
    let sample = &sample[..sample.len().min(SAMPLE_LEN)];
    if sample.len() < MIN_ARMORED_LEN {
        return false;
    }
    if sample.starts_with(ARMORED_PREFIX) {
        return true;
    }
    match armor::decode_prefix(sample) {
        Some(decoded) => decoded.len() >= MIN_TOKEN_LEN,
        None => false,
    }
}
