//! Background expiry cleanup.
//!
//! Lazy read-time expiry keeps the lookup paths correct, but records that
//! are never read again would pile up forever. The sweeper periodically
//! drains the expired backlog in bounded batches so no single pass holds
//! the backing store busy for long.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::AuthResult;
use crate::store::entity::EntityStore;

/// Settings for the periodic cleanup task.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Maximum records deleted per store round trip.
    pub batch_limit: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            batch_limit: 1000,
        }
    }
}

/// Handle to a running cleanup task.
pub struct CleanupHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Signals the task to stop and waits for it to finish. A sweep in
    /// progress completes its current batch before exiting.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Drains the expired backlog, one batch per store round trip, until a
/// sweep removes fewer records than the batch limit.
///
/// Exposed separately from the background task so callers (and tests) can
/// run a deterministic full sweep.
///
/// # Errors
///
/// Stops at the first backend failure; already-deleted batches stay
/// deleted.
pub async fn sweep(store: &EntityStore, batch_limit: usize) -> AuthResult<u64> {
    let mut total = 0u64;
    loop {
        let removed = store.clean_expired(batch_limit).await?;
        total += removed;
        if (removed as usize) < batch_limit {
            return Ok(total);
        }
    }
}

/// Spawns the periodic cleanup task.
///
/// The first sweep runs one full interval after startup. Backend failures
/// are logged and retried at the next tick. Between batches the task
/// checks for shutdown so it never delays process exit by more than one
/// store round trip.
pub fn spawn_cleanup(store: EntityStore, config: CleanupConfig) -> CleanupHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let sweep_rx = shutdown_rx.clone();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        // The first tick of a tokio interval fires immediately; skip it.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = sweep_until_shutdown(&store, config.batch_limit, &sweep_rx).await {
                        tracing::warn!(error = %err, "expiry sweep failed, will retry next tick");
                    }
                }
                _ = shutdown_rx.changed() => {
                    tracing::debug!("cleanup task stopping");
                    return;
                }
            }
        }
    });
    CleanupHandle {
        shutdown: shutdown_tx,
        task,
    }
}

async fn sweep_until_shutdown(
    store: &EntityStore,
    batch_limit: usize,
    shutdown: &watch::Receiver<bool>,
) -> AuthResult<()> {
    loop {
        let removed = store.clean_expired(batch_limit).await?;
        if (removed as usize) < batch_limit || *shutdown.borrow() {
            return Ok(());
        }
    }
}
