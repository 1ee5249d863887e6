//! Authenticated tokens: AES-256-CTR + HMAC-SHA256 (encrypt-then-MAC)
//!
//! The binary format (version 1) is:
//! - version: 1 byte, always 0x80
//! - timestamp: 8 bytes (big-endian u64, seconds since the Unix epoch)
//! - iv: 16 bytes
//! - ciphertext: same length as the plaintext
//! - tag: 32 bytes, HMAC-SHA256 over every preceding byte
//!
//! Tokens are stored armored (see [`crate::armor`]). The cipher and MAC keys
//! are both derived from the 32-byte [`Key`] with HKDF-SHA256.

use crate::armor;
use crate::error::{Error, ErrorCategory, ErrorKind, Result};
use crate::keystore::Key;
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Version marker of the only format this build reads and writes
pub const VERSION: u8 = 0x80;

/// Length of the timestamp field in bytes
pub const TIMESTAMP_LEN: usize = 8;

/// Length of the IV in bytes
pub const IV_LEN: usize = 16;

/// Length of the authentication tag in bytes
pub const TAG_LEN: usize = 32;

/// Length of everything before the ciphertext
pub const HEADER_LEN: usize = 1 + TIMESTAMP_LEN + IV_LEN;

/// Smallest possible binary token (empty plaintext)
pub const MIN_TOKEN_LEN: usize = HEADER_LEN + TAG_LEN;

/// Smallest possible armored token
pub const MIN_ARMORED_LEN: usize = armor::wrapped_len(MIN_TOKEN_LEN);

/// Every armored token starts with this: the version byte followed by the
/// zero high bytes of any present-day timestamp.
pub const ARMORED_PREFIX: &[u8] = b"gAAAAA";

const SUBKEY_LEN: usize = 32;
const CIPHER_KEY_INFO: &[u8] = b"sealfile v1 cipher";
const MAC_KEY_INFO: &[u8] = b"sealfile v1 mac";

/// Encodes and decodes tokens under one key.
///
/// Subkeys are derived once at construction, so a codec should be reused for
/// every file handled with the same key.
pub struct TokenCodec {
    cipher_key: Zeroizing<[u8; SUBKEY_LEN]>,
    mac_key: Zeroizing<[u8; SUBKEY_LEN]>,
}

impl TokenCodec {
    pub fn new(key: &Key) -> Result<Self> {
        let hkdf = Hkdf::<Sha256>::new(None, key.as_bytes());
        let mut cipher_key = Zeroizing::new([0u8; SUBKEY_LEN]);
        let mut mac_key = Zeroizing::new([0u8; SUBKEY_LEN]);
        hkdf.expand(CIPHER_KEY_INFO, &mut cipher_key[..])
            .and_then(|()| hkdf.expand(MAC_KEY_INFO, &mut mac_key[..]))
            .map_err(|e| {
                Error::with_kind(
                    ErrorCategory::Internal,
                    ErrorKind::InternalInvariant,
                    format!("HKDF expand failed: {e}"),
                )
            })?;
        Ok(Self {
            cipher_key,
            mac_key,
        })
    }

    /// Encrypt `plaintext` into an armored token with a fresh random IV and
    /// the current time.
    pub fn encode(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        self.encode_deterministic(plaintext, unix_now(), &iv)
    }

    /// Encrypt `plaintext` using the provided timestamp and IV.
    ///
    /// This function is ONLY for testing purposes to generate deterministic output.
    /// NEVER use this in production - always use `encode()` which generates a random IV.
    pub fn encode_deterministic(
        &self,
        plaintext: &[u8],
        timestamp: u64,
        iv: &[u8; IV_LEN],
    ) -> Result<Vec<u8>> {
        let mut token = Vec::with_capacity(HEADER_LEN + plaintext.len() + TAG_LEN);
        token.push(VERSION);
        token.extend_from_slice(&timestamp.to_be_bytes());
        token.extend_from_slice(iv);
        token.extend_from_slice(plaintext);

        let mut cipher = self.cipher(iv)?;
        cipher.apply_keystream(&mut token[HEADER_LEN..]);

        let tag = self.mac()?.chain_update(&token).finalize().into_bytes();
        token.extend_from_slice(&tag);

        Ok(armor::wrap(&token).into_bytes())
    }

    /// Authenticate and decrypt an armored token.
    pub fn decode(&self, armored: &[u8]) -> Result<Vec<u8>> {
        self.decode_with_timestamp(armored)
            .map(|(plaintext, _)| plaintext)
    }

    /// Like [`decode`](Self::decode), also returning the creation timestamp
    /// recorded in the token.
    ///
    /// Nothing is decrypted until the tag has been verified.
    pub fn decode_with_timestamp(&self, armored: &[u8]) -> Result<(Vec<u8>, u64)> {
        let token = armor::unwrap(armored)?;

        if token.len() < MIN_TOKEN_LEN {
            return Err(Error::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "input likely truncated: shorter than the smallest valid token",
            ));
        }
        if token[0] != VERSION {
            return Err(Error::with_kind(
                ErrorCategory::User,
                ErrorKind::UnsupportedVersion,
                format!("unsupported token version 0x{:02x}", token[0]),
            ));
        }

        let (signed, tag) = token.split_at(token.len() - TAG_LEN);
        self.mac()?
            .chain_update(signed)
            .verify_slice(tag)
            .map_err(|_| {
                Error::with_kind(
                    ErrorCategory::User,
                    ErrorKind::AuthenticationFailed,
                    "corrupt input, tampered-with data, or wrong key",
                )
            })?;

        let mut timestamp = [0u8; TIMESTAMP_LEN];
        timestamp.copy_from_slice(&signed[1..1 + TIMESTAMP_LEN]);
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&signed[1 + TIMESTAMP_LEN..HEADER_LEN]);

        let mut plaintext = signed[HEADER_LEN..].to_vec();
        self.cipher(&iv)?.apply_keystream(&mut plaintext);

        Ok((plaintext, u64::from_be_bytes(timestamp)))
    }

    fn cipher(&self, iv: &[u8; IV_LEN]) -> Result<Aes256Ctr> {
        Aes256Ctr::new_from_slices(&self.cipher_key[..], iv).map_err(|e| {
            Error::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                format!("failed to initialize cipher: {e}"),
            )
        })
    }

    fn mac(&self) -> Result<HmacSha256> {
        <HmacSha256 as Mac>::new_from_slice(&self.mac_key[..]).map_err(|e| {
            Error::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                format!("failed to initialize MAC: {e}"),
            )
        })
    }
}

/// Encrypt `plaintext` under `key` into an armored token.
pub fn encode(plaintext: &[u8], key: &Key) -> Result<Vec<u8>> {
    TokenCodec::new(key)?.encode(plaintext)
}

/// Authenticate and decrypt an armored token under `key`.
pub fn decode(token: &[u8], key: &Key) -> Result<Vec<u8>> {
    TokenCodec::new(key)?.decode(token)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
