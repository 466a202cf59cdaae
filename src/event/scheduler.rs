//! The dispatch loop.
//!
//! ```text
//!  EventSource ──┐                    ┌──> Handler (read)
//!  EventSource ──┼──> EventQueue ──> Dispatcher ──> Handler (decode)
//!  I/O workers ──┘        ▲           └──> Handler (...)
//!                         │                  │
//!                         └──── Pusher ──────┘
//! ```
//!
//! One dispatcher drains the queue and calls exactly one handler per event.
//! When the queue is empty it sleeps for a short backoff instead of
//! blocking, so a stop request is seen promptly.

use crate::event::{Event, EventKind, EventQueue, EventSource, Handler, HandlerError, Pusher};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

/// How long the dispatcher sleeps when the queue is empty
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_micros(50);

/// Counters returned when the dispatcher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events a handler accepted
    pub handled: u64,
    /// Events whose handler returned an error or panicked
    pub failed: u64,
    /// Events with no registered handler
    pub dropped: u64,
}

/// Collects handlers and event sources, then starts dispatching.
pub struct Scheduler {
    handlers: HashMap<EventKind, Box<dyn Handler>>,
    sources: Vec<Box<dyn EventSource>>,
    queue: EventQueue,
    idle_backoff: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            sources: Vec::new(),
            queue: EventQueue::new(),
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }

    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }

    /// Registers `handler` for its target kind, replacing any earlier one.
    pub fn register<H: Handler + 'static>(&mut self, handler: H) {
        let kind = handler.target();
        if self.handlers.insert(kind, Box::new(handler)).is_some() {
            warn!(kind = %kind, "Replacing previously registered handler");
        }
    }

    pub fn add_source<S: EventSource + 'static>(&mut self, source: S) {
        self.sources.push(Box::new(source));
    }

    /// Returns a handle for pushing events before or after start.
    pub fn pusher(&self) -> Pusher {
        self.queue.pusher()
    }

    /// Starts every event source and spawns the dispatch loop.
    ///
    /// The loop runs on tokio's blocking pool, so handlers may spawn tasks
    /// with `tokio::spawn`. Must be called from within a tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let Scheduler {
            handlers,
            mut sources,
            queue,
            idle_backoff,
        } = self;

        for source in sources.iter_mut() {
            debug!(source = source.name(), "Starting event source");
            source.start(queue.pusher());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let pusher = queue.pusher();
        let dispatcher = Dispatcher {
            handlers,
            queue,
            idle_backoff,
            stop: Arc::clone(&stop),
            stats: DispatchStats::default(),
        };

        let worker = tokio::task::spawn_blocking(move || dispatcher.run());
        info!(sources = sources.len(), "Scheduler started");

        SchedulerHandle {
            sources,
            stop,
            pusher,
            worker,
        }
    }
}

/// A running scheduler.
///
/// Dropping the handle without calling [`SchedulerHandle::shutdown`] still
/// stops the sources and the dispatch loop, but does not wait for the drain.
pub struct SchedulerHandle {
    sources: Vec<Box<dyn EventSource>>,
    stop: Arc<AtomicBool>,
    pusher: Pusher,
    worker: JoinHandle<DispatchStats>,
}

impl SchedulerHandle {
    pub fn pusher(&self) -> Pusher {
        self.pusher.clone()
    }

    /// Stops the sources, processes everything already queued, then returns.
    ///
    /// I/O already handed to workers is not awaited; whatever those workers
    /// push after the drain is discarded.
    pub async fn shutdown(mut self) -> Result<DispatchStats, JoinError> {
        self.signal_stop();
        let stats = (&mut self.worker).await?;

        info!(
            handled = stats.handled,
            failed = stats.failed,
            dropped = stats.dropped,
            "Scheduler stopped"
        );
        Ok(stats)
    }

    /// Stops each source once and tells the dispatcher to drain and exit.
    fn signal_stop(&mut self) {
        for mut source in self.sources.drain(..) {
            debug!(source = source.name(), "Stopping event source");
            source.stop();
        }
        self.stop.store(true, Ordering::Release);
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if !self.stop.load(Ordering::Acquire) {
            debug!("Scheduler handle dropped without shutdown");
        }
        self.signal_stop();
    }
}

struct Dispatcher {
    handlers: HashMap<EventKind, Box<dyn Handler>>,
    queue: EventQueue,
    idle_backoff: Duration,
    stop: Arc<AtomicBool>,
    stats: DispatchStats,
}

impl Dispatcher {
    fn run(mut self) -> DispatchStats {
        loop {
            if self.stop.load(Ordering::Acquire) {
                let mut drained = 0usize;
                while let Some(event) = self.queue.pop() {
                    self.dispatch(event);
                    drained += 1;
                }
                debug!(drained, "Event queue drained");
                return self.stats;
            }

            match self.queue.pop() {
                Some(event) => self.dispatch(event),
                None => std::thread::sleep(self.idle_backoff),
            }
        }
    }

    fn dispatch(&mut self, event: Event) {
        let kind = event.kind();
        let id = event.id();

        let Some(handler) = self.handlers.get_mut(&kind) else {
            error!(id, kind = %kind, "No handler registered for event");
            self.stats.dropped += 1;
            return;
        };

        let pusher = self.queue.pusher();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event, &pusher)))
            .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload))));

        match outcome {
            Ok(()) => self.stats.handled += 1,
            Err(e) => {
                warn!(id, kind = %kind, error = %e, "Failed to handle event");
                self.stats.failed += 1;
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
