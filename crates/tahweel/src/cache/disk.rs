//! Filesystem cache backend.
//!
//! Entries are MessagePack records named by an ahash of the cache key, with
//! the TTL embedded in the record and enforced against the file's
//! modification time on read. Expired and corrupted records are removed
//! lazily during `get`.
//!
//! Counters live next to the records as small text files guarded by a
//! process-wide mutex; they carry no TTL, so the durable conversion total
//! survives restarts.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use ahash::AHasher;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::CacheBackend;
use crate::error::{Result, TahweelError};

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    value: Vec<u8>,
    ttl_secs: u64,
}

pub struct DiskCacheBackend {
    dir: PathBuf,
    counter_lock: Mutex<()>,
}

impl DiskCacheBackend {
    /// Create a backend rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| TahweelError::cache_with_source("failed to create cache directory", e))?;
        Ok(Self {
            dir,
            counter_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.msgpack", hash_key(key)))
    }

    fn counter_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.count", hash_key(key)))
    }

    fn record_age(path: &Path) -> Option<Duration> {
        let modified = std::fs::metadata(path).ok()?.modified().ok()?;
        SystemTime::now().duration_since(modified).ok()
    }
}

impl CacheBackend for DiskCacheBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.record_path(key);

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TahweelError::cache_with_source("failed to read cache record", e)),
        };

        let record: CacheRecord = match rmp_serde::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("removing corrupted cache record {}: {}", path.display(), e);
                let _ = std::fs::remove_file(&path);
                return Ok(None);
            }
        };

        let expired = Self::record_age(&path)
            .map(|age| age > Duration::from_secs(record.ttl_secs))
            .unwrap_or(true);
        if expired {
            let _ = std::fs::remove_file(&path);
            return Ok(None);
        }

        Ok(Some(record.value))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let record = CacheRecord {
            value: value.to_vec(),
            ttl_secs: ttl.as_secs(),
        };
        let encoded = rmp_serde::to_vec(&record)?;
        std::fs::write(self.record_path(key), encoded)
            .map_err(|e| TahweelError::cache_with_source("failed to write cache record", e))?;
        Ok(())
    }

    fn increment(&self, key: &str) -> Result<u64> {
        let _guard = self.counter_lock.lock();
        let path = self.counter_path(key);

        let current = match std::fs::read_to_string(&path) {
            Ok(text) => text.trim().parse::<u64>().unwrap_or(0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(TahweelError::cache_with_source("failed to read counter", e)),
        };

        let next = current + 1;
        std::fs::write(&path, next.to_string())
            .map_err(|e| TahweelError::cache_with_source("failed to write counter", e))?;
        Ok(next)
    }

    fn counter_value(&self, key: &str) -> Result<Option<u64>> {
        let _guard = self.counter_lock.lock();
        match std::fs::read_to_string(self.counter_path(key)) {
            Ok(text) => Ok(text.trim().parse::<u64>().ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TahweelError::cache_with_source("failed to read counter", e)),
        }
    }
}

/// Deterministic 16-hex-digit file name for an arbitrary cache key.
fn hash_key(key: &str) -> String {
    let mut hasher = AHasher::default();
    key.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskCacheBackend::new(dir.path()).unwrap();

        backend
            .set("convert:abc:standard", b"out.docx", Duration::from_secs(60))
            .unwrap();
        let value = backend.get("convert:abc:standard").unwrap();
        assert_eq!(value.as_deref(), Some(b"out.docx".as_slice()));
    }

    #[test]
    fn test_get_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskCacheBackend::new(dir.path()).unwrap();
        assert_eq!(backend.get("nope").unwrap(), None);
    }

    #[test]
    fn test_expired_record_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskCacheBackend::new(dir.path()).unwrap();

        backend.set("k", b"v", Duration::from_secs(60)).unwrap();

        // Backdate the record beyond its TTL.
        let path = backend.record_path("k");
        let old = SystemTime::now() - Duration::from_secs(120);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(old)).unwrap();

        assert_eq!(backend.get("k").unwrap(), None);
        assert!(!path.exists(), "expired record should be removed lazily");
    }

    #[test]
    fn test_corrupted_record_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskCacheBackend::new(dir.path()).unwrap();

        std::fs::write(backend.record_path("k"), b"\xff\xff\xff not msgpack").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites_with_fresh_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskCacheBackend::new(dir.path()).unwrap();

        backend.set("k", b"old", Duration::from_secs(60)).unwrap();
        backend.set("k", b"new", Duration::from_secs(60)).unwrap();
        assert_eq!(backend.get("k").unwrap().as_deref(), Some(b"new".as_slice()));
    }

    #[test]
    fn test_counter_increments_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskCacheBackend::new(dir.path()).unwrap();

        assert_eq!(backend.counter_value("total").unwrap(), None);
        assert_eq!(backend.increment("total").unwrap(), 1);
        assert_eq!(backend.increment("total").unwrap(), 2);

        // A new backend over the same directory sees the same count.
        let reopened = DiskCacheBackend::new(dir.path()).unwrap();
        assert_eq!(reopened.counter_value("total").unwrap(), Some(2));
        assert_eq!(reopened.increment("total").unwrap(), 3);
    }

    #[test]
    fn test_concurrent_increments_are_exact() {
        let dir = tempfile::tempdir().unwrap();
        let backend = std::sync::Arc::new(DiskCacheBackend::new(dir.path()).unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let backend = backend.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    backend.increment("total").unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(backend.counter_value("total").unwrap(), Some(200));
    }
}
