//! Loading and creating the symmetric key
//!
//! The key file holds exactly [`KEY_LEN`] raw bytes: no header, no encoding.
//! It is created on first use and never rewritten afterwards.

use crate::error::{Error, ErrorCategory, ErrorKind, Result};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Length of the symmetric key in bytes
pub const KEY_LEN: usize = 32;

/// The process-wide secret. Wiped from memory when dropped.
#[derive(Clone)]
pub struct Key {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl Key {
    /// Generate a fresh key from the OS random number generator.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self { bytes }
    }

    /// Build a key from raw key material, which must be exactly [`KEY_LEN`] bytes.
    pub fn from_slice(material: &[u8]) -> Result<Self> {
        if material.len() != KEY_LEN {
            return Err(Error::with_kind(
                ErrorCategory::User,
                ErrorKind::KeyFormat,
                format!(
                    "key must be exactly {} bytes, got {}",
                    KEY_LEN,
                    material.len()
                ),
            ));
        }
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(material);
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Persist this key to `path`, refusing to replace an existing file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut file = create_key_file(path).map_err(|e| {
            let category = if e.kind() == io::ErrorKind::AlreadyExists {
                ErrorCategory::User
            } else {
                ErrorCategory::Internal
            };
            Error::with_kind_and_source(
                category,
                ErrorKind::Io,
                format!("failed to create key file {}", path.display()),
                e,
            )
        })?;
        file.write_all(self.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| {
                Error::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write key file {}", path.display()),
                    e,
                )
            })?;
        Ok(())
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.bytes[..] == other.bytes[..]
    }
}

impl Eq for Key {}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key").field("bytes", &"[REDACTED]").finish()
    }
}

/// Load the key stored at `path`, or generate and store a new one if the
/// file does not exist yet.
pub fn load_or_create(path: &Path) -> Result<Key> {
    match fs::read(path) {
        Ok(material) => {
            let material = Zeroizing::new(material);
            let key = Key::from_slice(&material)
                .map_err(|e| e.with_context(format!("invalid key file {}", path.display())))?;
            debug!(path = %path.display(), "loaded existing key");
            Ok(key)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let key = Key::generate();
            key.write_to(path)?;
            info!(path = %path.display(), "generated new key");
            Ok(key)
        }
        Err(e) => Err(Error::read(path, e)),
    }
}

/// Generate a new key and store it at `path`.
///
/// An existing key file is only replaced when `overwrite` is set. Replacing a
/// key makes every file encrypted under the old one unrecoverable.
pub fn create(path: &Path, overwrite: bool) -> Result<Key> {
    if overwrite {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed previous key file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to remove old key file {}", path.display()),
                    e,
                ));
            }
        }
    }
    let key = Key::generate();
    key.write_to(path)?;
    info!(path = %path.display(), "generated new key");
    Ok(key)
}

/// Create the key file with owner-only permissions (0o600 on Unix).
fn create_key_file(path: &Path) -> io::Result<fs::File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;

        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)
    }

    #[cfg(not(unix))]
    {
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
    }
}
