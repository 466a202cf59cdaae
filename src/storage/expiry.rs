//! Periodic Expiration
//!
//! Lazy expiry (checking on read) hides expired keys but never frees them.
//! The [`ExpirationService`] is an event source that fires on a fixed
//! interval and enqueues a sweep request carrying the tick instant; the
//! [`SweepHandler`] runs that sweep against storage on the dispatch thread.
//!
//! ```text
//! interval tick ──> Event::Sweep { at } ──> SweepHandler ──> Storage::expire_all_until(at)
//! ```

use crate::event::{Event, EventKind, EventSource, Handler, HandlerError, IdIssuer, Pusher};
use crate::storage::{SharedStorage, Storage, StorageEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

/// Default interval between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Timer that emits sweep requests.
#[derive(Debug)]
pub struct ExpirationService {
    interval: Duration,
    issuer: Arc<IdIssuer>,
    /// Present while the timer task runs
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl ExpirationService {
    pub fn new(interval: Duration, issuer: Arc<IdIssuer>) -> Self {
        Self {
            interval,
            issuer,
            shutdown_tx: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl EventSource for ExpirationService {
    fn name(&self) -> &'static str {
        "expiration"
    }

    fn start(&mut self, push: Pusher) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(timer_loop(
            self.interval,
            Arc::clone(&self.issuer),
            push,
            shutdown_rx,
        ));
        self.shutdown_tx = Some(shutdown_tx);

        info!(interval_ms = self.interval.as_millis(), "Expiration service started");
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
            info!("Expiration service stopped");
        }
    }
}

impl Drop for ExpirationService {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn timer_loop(
    period: Duration,
    issuer: Arc<IdIssuer>,
    push: Pusher,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately; nothing can have expired yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            tick = ticker.tick() => {
                let id = issuer.issue();
                trace!(id, "Sweep timer fired");
                push.push(Event::Sweep { id, at: tick.into_std() });
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiration timer received shutdown signal");
                    return;
                }
            }
        }
    }
}

/// Runs sweep requests against storage.
pub struct SweepHandler<S: Storage = StorageEngine> {
    storage: SharedStorage<S>,
}

impl<S: Storage> SweepHandler<S> {
    pub fn new(storage: SharedStorage<S>) -> Self {
        Self { storage }
    }
}

impl<S: Storage> Handler for SweepHandler<S> {
    fn target(&self) -> EventKind {
        EventKind::Sweep
    }

    fn handle(&mut self, event: Event, _push: &Pusher) -> Result<(), HandlerError> {
        let (id, at) = match event {
            Event::Sweep { id, at } => (id, at),
            other => return Err(HandlerError::unexpected(self.target(), &other)),
        };

        let removed = self.storage.lock().expire_all_until(at);
        if removed > 0 {
            debug!(id, removed, "Expired keys swept");
        }
        Ok(())
    }
}
