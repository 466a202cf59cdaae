//! Events exchanged between the scheduler and its handlers.

use crate::commands::Command;
use crate::event::HandlerError;
use crate::protocol::RespValue;
use bytes::Bytes;
use std::fmt;
use std::time::Instant;

/// Identifier carried by every event.
///
/// Connections get one on accept and a fresh one after every completed
/// write; sweep ticks get their own.
pub type RequestId = u64;

/// A unit of work for the scheduler. Consumed exactly once.
#[derive(Debug)]
pub enum Event {
    /// Scan the next frame from the connection bound to `id`.
    Read { id: RequestId },

    /// Write encoded bytes to the connection bound to `id`.
    Write { id: RequestId, data: Bytes },

    /// Remove and close the connection bound to `id`.
    Close { id: RequestId },

    /// Drop every key whose expiry is before `at`.
    Sweep { id: RequestId, at: Instant },

    /// Feed one frame into the decode state for `id`.
    Decode { id: RequestId, frame: Bytes },

    /// Turn a completed protocol value into a command.
    Parse { id: RequestId, value: RespValue },

    /// Run a command against storage.
    Execute { id: RequestId, command: Command },

    /// Encode a result value for the wire.
    Format { id: RequestId, value: RespValue },

    /// A failure observed off the dispatch thread.
    ErrorReport {
        id: RequestId,
        origin: EventKind,
        error: HandlerError,
    },
}

impl Event {
    pub fn id(&self) -> RequestId {
        match self {
            Event::Read { id }
            | Event::Write { id, .. }
            | Event::Close { id }
            | Event::Sweep { id, .. }
            | Event::Decode { id, .. }
            | Event::Parse { id, .. }
            | Event::Execute { id, .. }
            | Event::Format { id, .. }
            | Event::ErrorReport { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Read { .. } => EventKind::Read,
            Event::Write { .. } => EventKind::Write,
            Event::Close { .. } => EventKind::Close,
            Event::Sweep { .. } => EventKind::Sweep,
            Event::Decode { .. } => EventKind::Decode,
            Event::Parse { .. } => EventKind::Parse,
            Event::Execute { .. } => EventKind::Execute,
            Event::Format { .. } => EventKind::Format,
            Event::ErrorReport { .. } => EventKind::ErrorReport,
        }
    }
}

/// Tag of an [`Event`]; the scheduler routes on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Read,
    Write,
    Close,
    Sweep,
    Decode,
    Parse,
    Execute,
    Format,
    ErrorReport,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Read => "read",
            EventKind::Write => "write",
            EventKind::Close => "close",
            EventKind::Sweep => "sweep",
            EventKind::Decode => "decode",
            EventKind::Parse => "parse",
            EventKind::Execute => "execute",
            EventKind::Format => "format",
            EventKind::ErrorReport => "error-report",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
