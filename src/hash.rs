//! SHA-256 content digests used to check files before and after a transition

use crate::error::{Error, Result};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Size of the blocks fed to the hasher
const BLOCK_LEN: usize = 4096;

/// A 256-bit SHA-256 digest. Displays as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash everything `reader` yields, one block at a time.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
    let mut hasher = Sha256::new();
    let mut block = [0u8; BLOCK_LEN];
    loop {
        let n = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&block[..n]);
    }
    Ok(Digest(hasher.finalize().into()))
}

/// Hash an in-memory buffer.
pub fn hash_bytes(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    for block in data.chunks(BLOCK_LEN) {
        hasher.update(block);
    }
    Digest(hasher.finalize().into())
}

/// Hash the current contents of the file at `path`.
pub fn hash_file(path: &Path) -> Result<Digest> {
    let file = File::open(path).map_err(|e| Error::read(path, e))?;
    hash_reader(file).map_err(|e| Error::read(path, e))
}
