//! Sealfile - in-place authenticated file encryption
//!
//! Replaces a file's contents with an authenticated token and back again,
//! and tells encrypted files from plaintext ones without needing the key.

#![forbid(unsafe_code)]

pub mod armor;
pub mod batch;
pub mod detect;
pub mod engine;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod keystore;
pub mod password;
pub mod token;

pub use detect::is_encrypted;
pub use engine::{DecryptOutcome, EncryptOutcome, EncryptionEngine};
pub use error::{Error, ErrorCategory, ErrorKind, Result};
pub use hash::{Digest, hash_file};
pub use kdf::derive_key_from_password;
pub use keystore::{Key, load_or_create};
