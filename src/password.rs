//! Where `derive-key` gets its password from

use crate::error::{Error, ErrorCategory, ErrorKind, Result};
use std::io::{self, Read};
use zeroize::Zeroizing;

/// Prompt shown on the controlling terminal
const PROMPT: &str = "Password (sealfile): ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordSource {
    /// Prompt on the controlling terminal without echo.
    Terminal,
    /// Read everything piped to stdin.
    Stdin,
}

impl PasswordSource {
    pub fn read(self) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            Self::Terminal => {
                let password = rpassword::prompt_password(PROMPT).map_err(|e| {
                    Error::with_kind_and_source(
                        ErrorCategory::User,
                        ErrorKind::PasswordUnavailable,
                        "cannot prompt for a password; pipe it in with --password-stdin",
                        e,
                    )
                })?;
                Ok(Zeroizing::new(password.into_bytes()))
            }
            Self::Stdin => read_password(io::stdin().lock()),
        }
    }
}

/// Read a password from `reader`, dropping one trailing line ending.
///
/// `echo secret | sealfile derive-key --password-stdin` and typing `secret`
/// at the prompt therefore derive the same key. Bytes need not be UTF-8.
pub fn read_password(mut reader: impl Read) -> Result<Zeroizing<Vec<u8>>> {
    let mut data = Zeroizing::new(Vec::new());
    reader.read_to_end(&mut data).map_err(|e| {
        Error::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to read password",
            e,
        )
    })?;
    if data.ends_with(b"\r\n") {
        let len = data.len();
        data.truncate(len - 2);
    } else if data.ends_with(b"\n") {
        data.pop();
    }
    Ok(data)
}
