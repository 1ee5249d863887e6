//! In-place file encryption and decryption
//!
//! The engine owns the token codec for a single key and applies the
//! `plaintext -> token -> plaintext` transition to files, replacing each file's
//! contents rather than writing a separate output file.

use crate::detect;
use crate::error::{Error, Result};
use crate::hash::{self, Digest};
use crate::keystore::{self, Key};
use crate::token::TokenCodec;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of a successful [`EncryptionEngine::encrypt_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptOutcome {
    pub path: PathBuf,
    /// Digest of the plaintext that was read
    pub original_hash: Digest,
    /// Digest of the token that replaced it
    pub encrypted_hash: Digest,
    pub file_size: u64,
    pub encrypted_size: u64,
}

/// Result of a successful [`EncryptionEngine::decrypt_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptOutcome {
    pub path: PathBuf,
    /// Digest of the token that was read
    pub encrypted_hash: Digest,
    /// Digest of the plaintext that replaced it
    pub decrypted_hash: Digest,
    pub file_size: u64,
    /// Creation time recorded in the token, in seconds since the Unix epoch
    pub sealed_at: u64,
}

pub struct EncryptionEngine {
    codec: TokenCodec,
}

impl EncryptionEngine {
    pub fn new(key: &Key) -> Result<Self> {
        Ok(Self {
            codec: TokenCodec::new(key)?,
        })
    }

    /// Load the key at `key_path` (creating it on first use) and build an engine for it.
    pub fn open(key_path: &Path) -> Result<Self> {
        let key = keystore::load_or_create(key_path)?;
        Self::new(&key)
    }

    /// Encrypt the file at `path` in place.
    ///
    /// The engine does not check whether the file already holds a token:
    /// encrypting a token wraps it a second time, and one `decrypt_file`
    /// will then only remove the outer layer. Callers that are not sure
    /// about a file's state should consult [`detect::is_encrypted`] first.
    pub fn encrypt_file(&self, path: &Path) -> Result<EncryptOutcome> {
        let target = resolve(path)?;
        let plaintext = fs::read(&target).map_err(|e| Error::read(path, e))?;
        let original_hash = hash::hash_bytes(&plaintext);
        let token = self
            .codec
            .encode(&plaintext)
            .map_err(|e| e.with_context(format!("failed to encrypt {}", path.display())))?;
        replace_contents(&target, &token)?;
        let encrypted_hash = hash::hash_bytes(&token);

        info!(path = %path.display(), size = plaintext.len(), "encrypted");
        Ok(EncryptOutcome {
            path: path.to_path_buf(),
            original_hash,
            encrypted_hash,
            file_size: plaintext.len() as u64,
            encrypted_size: token.len() as u64,
        })
    }

    /// Decrypt the file at `path` in place.
    ///
    /// Fails with an authentication error, leaving the file untouched, if it
    /// does not hold a valid token for this engine's key.
    pub fn decrypt_file(&self, path: &Path) -> Result<DecryptOutcome> {
        let target = resolve(path)?;
        let token = fs::read(&target).map_err(|e| Error::read(path, e))?;
        let encrypted_hash = hash::hash_bytes(&token);
        let (plaintext, sealed_at) = self
            .codec
            .decode_with_timestamp(&token)
            .map_err(|e| e.with_context(format!("failed to decrypt {}", path.display())))?;
        replace_contents(&target, &plaintext)?;
        let decrypted_hash = hash::hash_bytes(&plaintext);

        info!(path = %path.display(), size = plaintext.len(), "decrypted");
        Ok(DecryptOutcome {
            path: path.to_path_buf(),
            encrypted_hash,
            decrypted_hash,
            file_size: plaintext.len() as u64,
            sealed_at,
        })
    }

    pub fn hash_file(&self, path: &Path) -> Result<Digest> {
        hash::hash_file(path)
    }

    pub fn is_encrypted(&self, path: &Path) -> bool {
        detect::is_encrypted(path)
    }
}

/// The file that reads and writes of `path` actually land on.
///
/// A symlink is replaced by its target so the rename in [`replace_contents`]
/// swaps the target's contents instead of the link.
fn resolve(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|e| Error::read(path, e))
}

/// Atomically replace the contents of `path` (tempfile + fsync + rename).
///
/// Either the old contents or the new contents are on disk afterwards,
/// never a partial file. The original file's permissions are carried over.
fn replace_contents(path: &Path, contents: &[u8]) -> Result<()> {
    let permissions = fs::metadata(path)
        .map_err(|e| Error::write(path, "failed to stat original", e))?
        .permissions();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::write(path, "failed to create tempfile", e))?;
    temp_file
        .write_all(contents)
        .map_err(|e| Error::write(path, "failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| Error::write(path, "failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| Error::write(path, "failed to sync tempfile prior to rename", e))?;
    temp_file
        .as_file()
        .set_permissions(permissions)
        .map_err(|e| Error::write(path, "failed to set tempfile permissions", e))?;
    temp_file
        .persist(path)
        .map_err(|e| Error::write(path, "failed to rename tempfile over target", e.error))?;

    debug!(path = %path.display(), bytes = contents.len(), "replaced file contents");
    Ok(())
}
