//! Scheduler handlers for the protocol layer.

use crate::event::{Event, EventKind, Handler, HandlerError, Pusher};
use crate::protocol::{Decoded, Decoder};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Feeds frames into the [`Decoder`].
///
/// A finished value moves on to parsing; an unfinished one asks the
/// transport for another frame under the same identifier. A frame that
/// fails to decode closes the connection without a reply.
///
/// The decoder is shared so the close path can drop state left behind by
/// a client that disconnects mid-value.
#[derive(Debug, Default)]
pub struct DecodeHandler {
    decoder: Arc<Decoder>,
}

impl DecodeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decoder(decoder: Arc<Decoder>) -> Self {
        Self { decoder }
    }

    pub fn decoder(&self) -> &Arc<Decoder> {
        &self.decoder
    }
}

impl Handler for DecodeHandler {
    fn target(&self) -> EventKind {
        EventKind::Decode
    }

    fn handle(&mut self, event: Event, push: &Pusher) -> Result<(), HandlerError> {
        let (id, frame) = match event {
            Event::Decode { id, frame } => (id, frame),
            other => return Err(HandlerError::unexpected(self.target(), &other)),
        };

        match self.decoder.decode(id, &frame) {
            Ok(Decoded::Complete(value)) => {
                debug!(id, value = %value, "Decoded value");
                push.push(Event::Parse { id, value });
                Ok(())
            }
            Ok(Decoded::Incomplete) => {
                trace!(id, frame_len = frame.len(), "Value incomplete, reading more");
                push.push(Event::Read { id });
                Ok(())
            }
            Err(e) => {
                warn!(id, error = %e, "Malformed frame, closing connection");
                push.push(Event::Close { id });
                Err(e.into())
            }
        }
    }
}

/// Encodes result values and hands the bytes to the transport.
#[derive(Debug, Default)]
pub struct FormatHandler;

impl Handler for FormatHandler {
    fn target(&self) -> EventKind {
        EventKind::Format
    }

    fn handle(&mut self, event: Event, push: &Pusher) -> Result<(), HandlerError> {
        match event {
            Event::Format { id, value } => {
                let data = Bytes::from(value.serialize());
                trace!(id, bytes = data.len(), "Formatted response");
                push.push(Event::Write { id, data });
                Ok(())
            }
            other => Err(HandlerError::unexpected(self.target(), &other)),
        }
    }
}
