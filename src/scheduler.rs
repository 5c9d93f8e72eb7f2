//! Periodic resync.
//!
//! [`ResyncTask`] runs [`SyncClient::sync_once`] right away and then once per
//! period until stopped. A manual [`ResyncTask::sync_now`] wakes the loop early.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::sync_client::{RemoteQuoteSource, SyncClient, SyncResult};

/// Shortest period the loop accepts
pub const MIN_RESYNC_PERIOD: Duration = Duration::from_millis(10);

/// Handle to a running resync loop
pub struct ResyncTask {
    shutdown: Option<oneshot::Sender<()>>,
    wake: Arc<Notify>,
    last_result: Arc<Mutex<Option<SyncResult>>>,
    handle: Option<JoinHandle<()>>,
}

impl ResyncTask {
    /// Start the loop on the current tokio runtime.
    ///
    /// Periods below [`MIN_RESYNC_PERIOD`] are raised to it.
    pub fn spawn<S>(client: Arc<SyncClient<S>>, period: Duration) -> Self
    where
        S: RemoteQuoteSource + 'static,
    {
        let period = if period < MIN_RESYNC_PERIOD {
            tracing::warn!(
                "Resync period {:?} too short, using {:?}",
                period,
                MIN_RESYNC_PERIOD
            );
            MIN_RESYNC_PERIOD
        } else {
            period
        };

        let (tx, mut rx) = oneshot::channel::<()>();
        let wake = Arc::new(Notify::new());
        let last_result = Arc::new(Mutex::new(None));

        let loop_wake = Arc::clone(&wake);
        let loop_result = Arc::clone(&last_result);

        tracing::info!("Starting resync every {:?}", period);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = ticker.tick() => {},
                    _ = loop_wake.notified() => {
                        tracing::debug!("Resync woken by manual request");
                    },
                }

                let result = client.sync_once().await;
                if result.success {
                    tracing::debug!("Resync: {}", result.status);
                } else {
                    tracing::warn!("Resync failed: {}", result.status);
                }

                if let Ok(mut slot) = loop_result.lock() {
                    *slot = Some(result);
                }
            }

            tracing::info!("Resync stopped");
        });

        Self {
            shutdown: Some(tx),
            wake,
            last_result,
            handle: Some(handle),
        }
    }

    /// Run a pass now instead of waiting for the next tick
    pub fn sync_now(&self) {
        self.wake.notify_one();
    }

    /// Result of the most recent completed pass
    pub fn last_result(&self) -> Option<SyncResult> {
        self.last_result.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait for an in-flight pass to finish
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Resync task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ResyncTask {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
