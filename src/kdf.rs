//! Password based keys
//!
//! Turns a password plus a random salt into a [`Key`] using scrypt. The salt
//! is not secret, but it must be kept next to anything encrypted with the
//! derived key: without it the key cannot be derived again.

use crate::error::{Error, ErrorCategory, ErrorKind, Result};
use crate::keystore::{KEY_LEN, Key};
use rand::RngCore;
use rand::rngs::OsRng;
use scrypt::{Params, scrypt};
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// scrypt N parameter (CPU/memory cost), as log2
const SCRYPT_LOG_N: u8 = 15;

/// scrypt r parameter (block size)
const SCRYPT_R: u32 = 8;

/// scrypt p parameter (parallelization)
const SCRYPT_P: u32 = 1;

pub type Salt = [u8; SALT_LEN];

/// Generate a random salt
pub fn generate_salt() -> Salt {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a key from `password`.
///
/// When `salt` is `None` a fresh one is generated. The salt actually used is
/// returned alongside the key. Same password and salt always give the same
/// key.
pub fn derive_key_from_password(password: &[u8], salt: Option<Salt>) -> Result<(Key, Salt)> {
    let salt = salt.unwrap_or_else(generate_salt);

    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN).map_err(|e| {
        Error::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "failed to create scrypt params",
            e,
        )
    })?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt(password, &salt, &params, &mut key[..]).map_err(|e| {
        Error::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "scrypt key derivation failed",
            e,
        )
    })?;

    let key = Key::from_slice(&key[..])?;
    Ok((key, salt))
}

/// Parse a hex encoded salt as printed by `sealfile derive-key`.
pub fn parse_salt(hex_salt: &str) -> Result<Salt> {
    let bytes = hex::decode(hex_salt.trim()).map_err(|e| {
        Error::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::KeyDerivation,
            "salt is not valid hex",
            e,
        )
    })?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::with_kind(
            ErrorCategory::User,
            ErrorKind::KeyDerivation,
            format!("salt must be {} bytes, got {}", SALT_LEN, bytes.len()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_password_and_salt_same_key() {
        let salt = [42u8; SALT_LEN];

        let (k1, s1) = derive_key_from_password(b"password", Some(salt)).unwrap();
        let (k2, s2) = derive_key_from_password(b"password", Some(salt)).unwrap();

        assert_eq!(k1, k2);
        assert_eq!(s1, salt);
        assert_eq!(s2, salt);
    }

    #[test]
    fn test_fresh_salt_gives_independent_key() {
        let (k1, s1) = derive_key_from_password(b"password", None).unwrap();
        let (k2, s2) = derive_key_from_password(b"password", None).unwrap();

        assert_ne!(s1, s2);
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_different_password_different_key() {
        let salt = [7u8; SALT_LEN];

        let (k1, _) = derive_key_from_password(b"correct", Some(salt)).unwrap();
        let (k2, _) = derive_key_from_password(b"wrong", Some(salt)).unwrap();

        assert_ne!(k1, k2);
    }

    #[test]
    fn test_key_is_raw_scrypt_output() {
        let salt = [3u8; SALT_LEN];
        let (key, _) = derive_key_from_password(b"pw", Some(salt)).unwrap();

        let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN).unwrap();
        let mut expected = [0u8; KEY_LEN];
        scrypt(b"pw", &salt, &params, &mut expected).unwrap();
        assert_eq!(key.as_bytes(), &expected);
    }

    #[test]
    fn test_parse_salt() {
        let salt = [0xA5u8; SALT_LEN];
        assert_eq!(parse_salt(&hex::encode(salt)).unwrap(), salt);

        let err = parse_salt("zz").expect_err("expected hex error");
        assert_eq!(err.kind, Some(ErrorKind::KeyDerivation));

        let err = parse_salt("abcd").expect_err("expected length error");
        assert!(err.message().contains("16 bytes"));
    }
}
