//! Time-based artifact retention.
//!
//! The sweeper is a periodic background task with its own lifecycle,
//! decoupled from request handling: it communicates with the rest of the
//! pipeline only through the artifact stores' timestamps. Each cycle lists
//! every entry and deletes the ones older than the retention window.
//! Considering only over-window files is also what makes the sweep safe to
//! run next to active conversions — nothing an in-flight request is still
//! writing can be that old.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::store::ArtifactStore;

/// Handle to the running background sweep task.
pub struct RetentionSweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RetentionSweeper {
    /// Spawn the sweep loop. The first cycle runs immediately, then every
    /// `interval`.
    pub fn start(
        stores: Vec<Arc<dyn ArtifactStore>>,
        retention: Duration,
        interval: Duration,
    ) -> Self {
        let (shutdown, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = sweep_once(&stores, retention).await;
                        if removed > 0 {
                            tracing::info!("retention sweep removed {} expired file(s)", removed);
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Stop the loop and wait for the task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

/// One sweep cycle over the given stores.
///
/// Deletion is best-effort per file: a failure is logged and the sweep moves
/// on to the remaining entries. Returns the number of files removed.
pub async fn sweep_once(stores: &[Arc<dyn ArtifactStore>], retention: Duration) -> usize {
    let mut removed = 0;

    for store in stores {
        let entries = match store.list_with_age().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("retention sweep could not list store: {}", e);
                continue;
            }
        };

        for (name, age) in entries {
            if age <= retention {
                continue;
            }
            match store.delete(&name).await {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!("removed expired file {} (age {:?})", name, age);
                }
                Err(e) => {
                    tracing::warn!("failed to remove expired file {}: {}", name, e);
                }
            }
        }
    }

    removed
}
