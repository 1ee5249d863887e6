//! Batch processing over many files
//!
//! Files are routed with the key-free detector: an encrypt pass only touches
//! files that look like plaintext, a decrypt pass only files that look like
//! tokens. A failure on one file never stops the pass.

use crate::detect;
use crate::engine::{DecryptOutcome, EncryptOutcome, EncryptionEngine};
use crate::error::{Error, ErrorCategory, ErrorKind, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Process every file regardless of what the detector says.
    pub force: bool,
    /// Copy each file into this directory before transforming it.
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub enum FileOutcome {
    Encrypted(EncryptOutcome),
    Decrypted(DecryptOutcome),
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: Vec<FileOutcome>,
    /// Files left alone because they were already in the target state.
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, Error)>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.processed.len()
    }

    pub fn skipped(&self) -> usize {
        self.skipped.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// List the regular files under `dir`, sorted by path.
///
/// Only the immediate children are listed unless `recursive` is set.
pub fn list_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut walker = WalkDir::new(dir).min_depth(1).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            match e.into_io_error() {
                Some(io_err) => Error::read(&path, io_err),
                None => Error::with_kind(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("filesystem loop detected at {}", path.display()),
                ),
            }
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Copy `path` into `dir`, keeping its file name. Returns the copy's path.
///
/// An existing file in `dir` is never replaced, so two sources with the same
/// name cannot clobber each other's backup. Backing a file up onto itself is
/// refused.
pub fn copy_to_dir(path: &Path, dir: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        Error::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} has no file name", path.display()),
        )
    })?;
    let source = fs::canonicalize(path).map_err(|e| Error::read(path, e))?;
    fs::create_dir_all(dir).map_err(|e| {
        Error::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to create {}", dir.display()),
            e,
        )
    })?;
    let target = fs::canonicalize(dir)
        .map_err(|e| Error::read(dir, e))?
        .join(name);
    if target == source {
        return Err(Error::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} is its own backup location", path.display()),
        ));
    }

    let mut reader = fs::File::open(&source).map_err(|e| Error::read(path, e))?;
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
        .map_err(|e| {
            let category = if e.kind() == io::ErrorKind::AlreadyExists {
                ErrorCategory::User
            } else {
                ErrorCategory::Internal
            };
            Error::with_kind_and_source(
                category,
                ErrorKind::Io,
                format!("failed to create backup {}", target.display()),
                e,
            )
        })?;
    io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.sync_all())
        .map_err(|e| {
            Error::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to copy {} to {}", path.display(), target.display()),
                e,
            )
        })?;
    debug!(path = %path.display(), backup = %target.display(), "backed up");
    Ok(target)
}

/// Apply `op` to every file in `files` that is not already in the target state.
pub fn run(
    engine: &EncryptionEngine,
    op: Operation,
    files: &[PathBuf],
    options: &BatchOptions,
) -> BatchReport {
    let mut report = BatchReport::default();
    for path in files {
        let encrypted = detect::is_encrypted(path);
        let eligible = match op {
            Operation::Encrypt => !encrypted,
            Operation::Decrypt => encrypted,
        };
        if !eligible && !options.force {
            debug!(path = %path.display(), ?op, "skip: already in target state");
            report.skipped.push(path.clone());
            continue;
        }

        match process(engine, op, path, options) {
            Ok(outcome) => report.processed.push(outcome),
            Err(e) => {
                warn!(path = %path.display(), ?op, "failed: {e}");
                report.failures.push((path.clone(), e));
            }
        }
    }
    report
}

fn process(
    engine: &EncryptionEngine,
    op: Operation,
    path: &Path,
    options: &BatchOptions,
) -> Result<FileOutcome> {
    if let Some(dir) = &options.backup_dir {
        copy_to_dir(path, dir)?;
    }
    match op {
        Operation::Encrypt => engine.encrypt_file(path).map(FileOutcome::Encrypted),
        Operation::Decrypt => engine.decrypt_file(path).map(FileOutcome::Decrypted),
    }
}
