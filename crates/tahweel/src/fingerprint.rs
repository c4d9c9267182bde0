//! Content fingerprinting for cache keys.
//!
//! A fingerprint is a 64-bit ahash digest of an input's bytes, rendered as
//! 16 hex digits. It is a cache key, not a security credential: ahash with
//! its deterministic default keys is collision-resistant enough for the
//! expected entry counts and roughly an order of magnitude faster than a
//! cryptographic hash.
//!
//! Content is always digested in fixed 64 KiB blocks, so the digest is
//! independent of how the bytes arrived: a streamed file and the same bytes
//! held in memory produce identical fingerprints.

use std::fmt;
use std::hash::Hasher;
use std::path::Path;

use ahash::AHasher;
use tokio::io::AsyncReadExt;

use crate::error::Result;

/// Digest block size. Reads are accumulated into full blocks before hashing
/// so short reads cannot shift block boundaries.
const BLOCK_SIZE: usize = 64 * 1024;

/// Content-derived cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Fingerprint a byte slice held in memory.
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let mut hasher = AHasher::default();
    for block in bytes.chunks(BLOCK_SIZE) {
        hasher.write(block);
    }
    Fingerprint(hasher.finish())
}

/// Fingerprint a file by streaming its contents.
///
/// The only failure mode is I/O reading the source, which bubbles up as
/// `TahweelError::Io`.
pub async fn fingerprint_file(path: impl AsRef<Path>) -> Result<Fingerprint> {
    let mut file = tokio::fs::File::open(path.as_ref()).await?;
    let mut hasher = AHasher::default();
    let mut block = vec![0u8; BLOCK_SIZE];

    loop {
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            let n = file.read(&mut block[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        hasher.write(&block[..filled]);
        if filled < BLOCK_SIZE {
            break;
        }
    }

    Ok(Fingerprint(hasher.finish()))
}
