//! Result caching for conversions.
//!
//! The cache maps `(content fingerprint, engine)` to the name of a produced
//! artifact. Keying on content rather than filename means re-uploading the
//! same bytes under a different name is still a hit, which bounds repeated
//! engine invocation cost for identical inputs.
//!
//! Caching is strictly best-effort: a backend that is missing, failing, or
//! slow degrades the pipeline to "always recompute", never to an error.
//! Every backend failure in this module is logged and swallowed.
//!
//! The backend sits behind [`CacheBackend`] with a no-op
//! [`NullCacheBackend`], so the orchestrator's logic is identical whether
//! caching is configured or not.

pub mod disk;

use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;
use std::sync::Arc;

use crate::engine::EngineKind;
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::store::ArtifactStore;

pub use disk::DiskCacheBackend;

/// Durable counter key mirrored by the stats aggregator.
pub const TOTAL_CONVERSIONS_KEY: &str = "tahweel:total_conversions";

/// External key-value cache.
///
/// This is the minimal contract the pipeline needs: get/set with TTL for
/// result entries, plus an increment and a read accessor for the durable
/// conversion counter. Any call may fail; callers swallow failures.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
    fn increment(&self, key: &str) -> Result<u64>;
    fn counter_value(&self, key: &str) -> Result<Option<u64>>;
}

/// Backend used when caching is disabled: every lookup misses, every write
/// succeeds without effect.
pub struct NullCacheBackend;

impl CacheBackend for NullCacheBackend {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<()> {
        Ok(())
    }

    fn increment(&self, _key: &str) -> Result<u64> {
        Ok(0)
    }

    fn counter_value(&self, _key: &str) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Marks one `(fingerprint, engine)` pair as in-flight; dropping the guard
/// releases the mark on every exit path, including failures.
pub struct ProcessingGuard<'a> {
    cache: &'a ResultCache,
    key: String,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.cache.processing.lock().remove(&self.key);
    }
}

/// Content-keyed conversion result cache.
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    /// Keys currently being computed in this process. Lets concurrent
    /// identical requests wait for the first computation instead of
    /// duplicating it; duplicates are still safe because `store` is
    /// last-writer-wins and idempotent.
    processing: Mutex<HashSet<String>>,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            processing: Mutex::new(HashSet::new()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    fn key(fingerprint: Fingerprint, engine: EngineKind) -> String {
        format!("convert:{}:{}", fingerprint, engine.as_str())
    }

    /// Look up a cached artifact name.
    ///
    /// Returns `Some` only when the backend has a live entry *and* the
    /// referenced artifact still exists in the store. A hit pointing at a
    /// file the sweeper already deleted is a miss, not an error.
    pub async fn lookup(
        &self,
        fingerprint: Fingerprint,
        engine: EngineKind,
        store: &dyn ArtifactStore,
    ) -> Option<String> {
        let key = Self::key(fingerprint, engine);

        let raw = match self.backend.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("cache lookup failed for {}: {}", key, e);
                return None;
            }
        };

        let Ok(name) = String::from_utf8(raw) else {
            tracing::debug!("discarding undecodable cache entry for {}", key);
            return None;
        };

        if !store.exists(&name).await {
            tracing::debug!("cache entry for {} points at missing artifact {}", key, name);
            return None;
        }

        Some(name)
    }

    /// Store an artifact name under `(fingerprint, engine)` with a fresh TTL.
    ///
    /// Idempotent and last-writer-wins; failures are logged and swallowed.
    pub fn store(&self, fingerprint: Fingerprint, engine: EngineKind, artifact: &str) {
        let key = Self::key(fingerprint, engine);
        if let Err(e) = self.backend.set(&key, artifact.as_bytes(), self.ttl) {
            tracing::warn!("cache store failed for {}: {}", key, e);
        }
    }

    /// Mark a pair as being computed; release by dropping the guard.
    pub fn begin(&self, fingerprint: Fingerprint, engine: EngineKind) -> ProcessingGuard<'_> {
        let key = Self::key(fingerprint, engine);
        self.processing.lock().insert(key.clone());
        ProcessingGuard { cache: self, key }
    }

    pub fn is_processing(&self, fingerprint: Fingerprint, engine: EngineKind) -> bool {
        self.processing
            .lock()
            .contains(&Self::key(fingerprint, engine))
    }

    /// Briefly wait for a concurrent computation of the same pair to land in
    /// the cache. Gives up once the pair is no longer in flight or after a
    /// bounded number of polls; the caller then recomputes.
    pub async fn wait_for(
        &self,
        fingerprint: Fingerprint,
        engine: EngineKind,
        store: &dyn ArtifactStore,
    ) -> Option<String> {
        const POLL: Duration = Duration::from_millis(100);
        const MAX_POLLS: u32 = 20;

        for _ in 0..MAX_POLLS {
            if !self.is_processing(fingerprint, engine) {
                return self.lookup(fingerprint, engine, store).await;
            }
            tokio::time::sleep(POLL).await;
        }
        None
    }
}
