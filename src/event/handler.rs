//! Handler and event-source contracts.

use crate::commands::CommandError;
use crate::connection::TransportError;
use crate::event::{Event, EventKind, Pusher};
use crate::protocol::DecodeError;
use crate::storage::StorageError;
use thiserror::Error;
use tracing::error;

/// Failure of a single handler invocation.
///
/// The scheduler logs it and drops the event; it never stops dispatching.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The scheduler routed an event to a handler registered for another kind
    #[error("{expected} handler received a {actual} event")]
    UnexpectedEvent {
        expected: EventKind,
        actual: EventKind,
    },

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("command rejected: {0}")]
    Command(#[from] CommandError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    /// The handler panicked; the panic payload is kept as text
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn unexpected(expected: EventKind, event: &Event) -> Self {
        HandlerError::UnexpectedEvent {
            expected,
            actual: event.kind(),
        }
    }
}

/// Processes events of one kind on the dispatch thread.
///
/// Handlers must not block; anything that waits on the network is spawned
/// onto the runtime and reports back by pushing events.
pub trait Handler: Send {
    /// The event kind this handler is registered for.
    fn target(&self) -> EventKind;

    fn handle(&mut self, event: Event, push: &Pusher) -> Result<(), HandlerError>;
}

/// Something that produces events on its own schedule (accepted connections,
/// timer ticks).
pub trait EventSource: Send {
    fn name(&self) -> &'static str;

    /// Begins producing events. Called once, from inside the tokio runtime.
    fn start(&mut self, push: Pusher);

    /// Stops producing events. Must be idempotent.
    fn stop(&mut self);
}

/// Logs failures that I/O workers report back through the queue.
#[derive(Debug, Default)]
pub struct ErrorReportHandler;

impl Handler for ErrorReportHandler {
    fn target(&self) -> EventKind {
        EventKind::ErrorReport
    }

    fn handle(&mut self, event: Event, _push: &Pusher) -> Result<(), HandlerError> {
        match event {
            Event::ErrorReport { id, origin, error } => {
                error!(id, origin = %origin, error = %error, "Error reported while processing event");
                Ok(())
            }
            other => Err(HandlerError::unexpected(self.target(), &other)),
        }
    }
}
