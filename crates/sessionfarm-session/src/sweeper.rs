//! Periodic expiry sweep.
//!
//! Runs [`SessionStoreManager::process_expires`] on the blocking pool once per
//! interval until cancelled. A failed pass is logged and retried on the next
//! tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::manager::SessionStoreManager;

/// Shortest accepted sweep interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running expiry sweep.
pub struct ExpirySweeper {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ExpirySweeper {
    /// Start sweeping every `interval`. The first pass runs after one interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(manager: Arc<SessionStoreManager>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let interval = interval.max(MIN_INTERVAL);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs_f64(), "Expiry sweep started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Expiry sweep cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let manager = Arc::clone(&manager);
                        match tokio::task::spawn_blocking(move || manager.process_expires()).await {
                            Ok(Ok(report)) => debug!(
                                removed = report.removed_remotely.len(),
                                resurrected = report.resurrected.len(),
                                "Expiry sweep pass complete"
                            ),
                            Ok(Err(e)) => error!(error = %e, "Expiry sweep pass failed"),
                            Err(e) => error!(error = %e, "Expiry sweep task panicked"),
                        }
                    }
                }
            }
        });

        Self { cancel, task }
    }

    /// Whether the sweep loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait for the loop to exit. A pass already running finishes
    /// first.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Expiry sweep task did not exit cleanly");
        }
        info!("Expiry sweep stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::manager::SessionLifecycleParticipant;
    use sessionfarm_backend::{ExpiryThreshold, KeyValueBackend, MemoryStore};
    use sessionfarm_config::StoreConfig;

    fn manager(expiry_ms: i64) -> (Arc<MemoryStore>, Arc<SessionStoreManager>) {
        let store = Arc::new(MemoryStore::new());
        let backend = KeyValueBackend::with_store(
            store.clone(),
            ExpiryThreshold::from_millis(expiry_ms).unwrap(),
        )
        .with_batch_pause(Duration::ZERO);
        let mut config = StoreConfig::default();
        config.node.route = Some("host1".to_string());
        config.backend.expiry_threshold_ms = expiry_ms;
        let manager = SessionStoreManager::new(config, Arc::new(JsonCodec)).with_backend(Arc::new(backend));
        (store, Arc::new(manager))
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let (_, manager) = manager(-1);
        let sweeper = ExpirySweeper::spawn(manager, Duration::from_secs(3600));
        assert!(!sweeper.is_finished());
        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_sessions() {
        let (store, manager) = manager(0);
        let session = manager.create(None).unwrap();
        let key = session.lock().key().to_string();
        assert!(store.last_accessed_ms(&key).is_some());

        // Threshold 0: anything persisted before now is expired.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let sweeper = ExpirySweeper::spawn(manager.clone(), Duration::from_millis(10));

        let mut removed = false;
        for _ in 0..200 {
            if store.last_accessed_ms(&key).is_none() {
                removed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sweeper.shutdown().await;
        assert!(removed);
    }
}
