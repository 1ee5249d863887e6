use std::error::Error as StdError;
use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The file to operate on does not exist.
    NotFound,
    /// Reading from the filesystem (or stdin) failed.
    Io,
    /// Replacing a file's contents failed after its input had been read.
    ///
    /// The original file is left in place, but callers should warn the user
    /// that the requested transition did not happen.
    WriteFailed,
    /// The key file exists but does not hold a key of the expected length.
    KeyFormat,
    /// The token did not authenticate: wrong key, corruption, tampering, or
    /// the input was never a token in the first place.
    AuthenticationFailed,
    /// The token carries a version marker this build does not understand.
    UnsupportedVersion,
    /// Password based key derivation failed.
    KeyDerivation,
    /// No password could be read for key derivation.
    PasswordUnavailable,
    /// Unexpected state reached within sealfile logic.
    InternalInvariant,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct Error {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl Error {
    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Maps an I/O error raised while reading `path`.
    ///
    /// A missing file is the user's problem and is tagged `NotFound`;
    /// everything else is tagged `Io`.
    pub fn read(path: &Path, err: io::Error) -> Self {
        let (category, kind) = if err.kind() == io::ErrorKind::NotFound {
            (ErrorCategory::User, ErrorKind::NotFound)
        } else {
            (ErrorCategory::Internal, ErrorKind::Io)
        };
        Self::with_kind_and_source(
            category,
            kind,
            format!("failed to read from {}", path.display()),
            err,
        )
    }

    /// Maps an I/O error raised while replacing the contents of `path`.
    pub fn write(path: &Path, what: &str, err: io::Error) -> Self {
        Self::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::WriteFailed,
            format!("{what} while replacing {}", path.display()),
            err,
        )
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// True when a token was rejected, whatever the specific reason.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self.kind,
            Some(ErrorKind::AuthenticationFailed) | Some(ErrorKind::UnsupportedVersion)
        )
    }

    /// True when the failure happened while overwriting a file, as opposed to
    /// while reading or decoding it.
    pub fn is_write_failure(&self) -> bool {
        self.kind == Some(ErrorKind::WriteFailed)
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, Error>;
