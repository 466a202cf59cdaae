//! Read, write and close handlers.
//!
//! These run on the dispatch thread and must not block, so each one looks up
//! the connection, spawns the socket operation onto the runtime and returns.
//! The spawned worker reports its outcome by pushing events.
//!
//! ## Request Lifecycle
//!
//! ```text
//! Read{id} ──> frame ──> Decode{id, frame}
//!          ──> EOF   ──> Close{id}
//!          ──> error ──> ErrorReport{id} + Close{id}
//!
//! Write{id, data} ──> ok    ──> rebind id -> id' ──> Read{id'}
//!                 ──> error ──> ErrorReport{id} + Close{id}
//!
//! Close{id} ──> drop partial decode state, unregister, shut down write side
//! ```

use crate::connection::transport::TransportShared;
use crate::connection::TransportError;
use crate::event::{Event, EventKind, Handler, HandlerError, Pusher, RequestId};
use crate::protocol::Decoder;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

fn report(push: &Pusher, id: RequestId, origin: EventKind, error: TransportError) {
    push.push(Event::ErrorReport {
        id,
        origin,
        error: error.into(),
    });
}

/// Reads the next frame from a connection.
#[derive(Debug)]
pub struct ReadHandler {
    shared: Arc<TransportShared>,
}

impl ReadHandler {
    pub(crate) fn new(shared: Arc<TransportShared>) -> Self {
        Self { shared }
    }
}

impl Handler for ReadHandler {
    fn target(&self) -> EventKind {
        EventKind::Read
    }

    fn handle(&mut self, event: Event, push: &Pusher) -> Result<(), HandlerError> {
        let id = match event {
            Event::Read { id } => id,
            other => return Err(HandlerError::unexpected(self.target(), &other)),
        };

        let entry = self
            .shared
            .registry
            .get(id)
            .ok_or(TransportError::UnknownConnection(id))?;
        let shared = Arc::clone(&self.shared);
        let push = push.clone();

        tokio::spawn(async move {
            match entry.read_frame(shared.max_frame).await {
                Ok(Some(frame)) => {
                    shared.stats.frame_read();
                    trace!(id, len = frame.len(), "Read frame");
                    push.push(Event::Decode { id, frame });
                }
                Ok(None) => {
                    debug!(id, client = %entry.peer(), "Client closed connection");
                    push.push(Event::Close { id });
                }
                Err(TransportError::Io(e)) if e.kind() == ErrorKind::ConnectionReset => {
                    debug!(id, client = %entry.peer(), "Connection reset by client");
                    push.push(Event::Close { id });
                }
                Err(e) => {
                    report(&push, id, EventKind::Read, e);
                    push.push(Event::Close { id });
                }
            }
        });

        Ok(())
    }
}

/// Writes a formatted reply, then rebinds the connection to a fresh id and
/// requests the next read.
#[derive(Debug)]
pub struct WriteHandler {
    shared: Arc<TransportShared>,
}

impl WriteHandler {
    pub(crate) fn new(shared: Arc<TransportShared>) -> Self {
        Self { shared }
    }
}

impl Handler for WriteHandler {
    fn target(&self) -> EventKind {
        EventKind::Write
    }

    fn handle(&mut self, event: Event, push: &Pusher) -> Result<(), HandlerError> {
        let (id, data) = match event {
            Event::Write { id, data } => (id, data),
            other => return Err(HandlerError::unexpected(self.target(), &other)),
        };

        let entry = self
            .shared
            .registry
            .get(id)
            .ok_or(TransportError::UnknownConnection(id))?;
        let shared = Arc::clone(&self.shared);
        let push = push.clone();

        tokio::spawn(async move {
            if let Err(e) = entry.write_all(&data).await {
                report(&push, id, EventKind::Write, e);
                push.push(Event::Close { id });
                return;
            }
            shared.stats.bytes_written(data.len());
            trace!(id, bytes = data.len(), "Sent response");

            let next = shared.issuer.issue();
            if shared.registry.rebind(id, next) {
                push.push(Event::Read { id: next });
            } else {
                debug!(id, "Connection closed before the next read");
            }
        });

        Ok(())
    }
}

/// Unregisters a connection and shuts it down. Closing an id that is no
/// longer registered does nothing.
#[derive(Debug)]
pub struct CloseHandler {
    shared: Arc<TransportShared>,
    decoder: Arc<Decoder>,
}

impl CloseHandler {
    pub(crate) fn new(shared: Arc<TransportShared>, decoder: Arc<Decoder>) -> Self {
        Self { shared, decoder }
    }
}

impl Handler for CloseHandler {
    fn target(&self) -> EventKind {
        EventKind::Close
    }

    fn handle(&mut self, event: Event, push: &Pusher) -> Result<(), HandlerError> {
        let id = match event {
            Event::Close { id } => id,
            other => return Err(HandlerError::unexpected(self.target(), &other)),
        };

        if self.decoder.discard(id) {
            debug!(id, "Discarded partial value");
        }

        let entry = match self.shared.registry.remove(id) {
            Some(entry) => entry,
            None => {
                debug!(id, "Connection already closed");
                return Ok(());
            }
        };
        self.shared.stats.connection_closed();
        let push = push.clone();

        tokio::spawn(async move {
            match entry.shutdown().await {
                Ok(()) => info!(id, client = %entry.peer(), "Client disconnected"),
                Err(TransportError::Io(e)) if e.kind() == ErrorKind::NotConnected => {
                    info!(id, client = %entry.peer(), "Client disconnected")
                }
                Err(e) => {
                    warn!(id, client = %entry.peer(), "Connection did not shut down cleanly");
                    report(&push, id, EventKind::Close, e);
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::TransportAdapter;
    use crate::event::{EventQueue, EventSource, IdIssuer};
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn wait_for_event(queue: &EventQueue) -> Event {
        for _ in 0..200 {
            if let Some(event) = queue.pop() {
                return event;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no event arrived");
    }

    /// Starts a transport, connects one client and returns the id it was
    /// bound to.
    async fn connect() -> (TransportAdapter, EventQueue, TcpStream, RequestId) {
        let issuer = Arc::new(IdIssuer::new());
        let mut transport = TransportAdapter::bind("127.0.0.1:0", issuer, 1024)
            .await
            .unwrap();
        let queue = EventQueue::new();
        transport.start(queue.pusher());

        let client = TcpStream::connect(transport.local_addr()).await.unwrap();
        let id = match wait_for_event(&queue).await {
            Event::Read { id } => id,
            other => panic!("expected read event, got {:?}", other),
        };
        (transport, queue, client, id)
    }

    #[tokio::test]
    async fn test_read_emits_decode() {
        let (transport, queue, mut client, id) = connect().await;
        client.write_all(b"*1\r\n").await.unwrap();

        transport
            .read_handler()
            .handle(Event::Read { id }, &queue.pusher())
            .unwrap();

        match wait_for_event(&queue).await {
            Event::Decode { id: got, frame } => {
                assert_eq!(got, id);
                assert_eq!(frame, Bytes::from("*1"));
            }
            other => panic!("expected decode event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_eof_emits_close() {
        let (transport, queue, client, id) = connect().await;
        drop(client);

        transport
            .read_handler()
            .handle(Event::Read { id }, &queue.pusher())
            .unwrap();

        assert!(matches!(wait_for_event(&queue).await, Event::Close { id: got } if got == id));
    }

    #[tokio::test]
    async fn test_read_unknown_connection() {
        let (transport, queue, _client, _id) = connect().await;

        let result = transport
            .read_handler()
            .handle(Event::Read { id: 999 }, &queue.pusher());
        assert!(matches!(
            result,
            Err(HandlerError::Transport(TransportError::UnknownConnection(999)))
        ));
    }

    #[tokio::test]
    async fn test_write_rebinds_and_requests_read() {
        let (transport, queue, mut client, id) = connect().await;

        transport
            .write_handler()
            .handle(
                Event::Write {
                    id,
                    data: Bytes::from_static(b"+PONG\r\n"),
                },
                &queue.pusher(),
            )
            .unwrap();

        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+PONG\r\n");

        match wait_for_event(&queue).await {
            Event::Read { id: next } => {
                assert_ne!(next, id);
                assert!(transport.registry().contains(next));
                assert!(!transport.registry().contains(id));
            }
            other => panic!("expected read event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (transport, queue, mut client, id) = connect().await;
        let mut close = transport.close_handler(Arc::new(Decoder::new()));

        close.handle(Event::Close { id }, &queue.pusher()).unwrap();
        close.handle(Event::Close { id }, &queue.pusher()).unwrap();
        assert!(transport.registry().is_empty());

        let mut buf = [0u8; 16];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_discards_abandoned_value() {
        use crate::protocol::DecodeHandler;

        let (transport, queue, client, id) = connect().await;
        let decoder = Arc::new(Decoder::new());
        let mut decode = DecodeHandler::with_decoder(Arc::clone(&decoder));
        let mut close = transport.close_handler(Arc::clone(&decoder));

        // First frame of a two-element array, then the client hangs up.
        decode
            .handle(
                Event::Decode {
                    id,
                    frame: Bytes::from_static(b"*2"),
                },
                &queue.pusher(),
            )
            .unwrap();
        assert!(matches!(queue.pop(), Some(Event::Read { id: got }) if got == id));
        assert_eq!(decoder.in_flight(), 1);
        drop(client);

        close.handle(Event::Close { id }, &queue.pusher()).unwrap();
        assert_eq!(decoder.in_flight(), 0);
        assert!(transport.registry().is_empty());

        // Ids no longer registered are still cleared.
        for stale in 1000..1100 {
            decoder.decode(stale, b"*2").unwrap();
            close.handle(Event::Close { id: stale }, &queue.pusher()).unwrap();
        }
        assert_eq!(decoder.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wrong_event_kind() {
        let (transport, queue, _client, id) = connect().await;

        let result = transport
            .close_handler(Arc::new(Decoder::new()))
            .handle(Event::Read { id }, &queue.pusher());
        assert!(matches!(result, Err(HandlerError::UnexpectedEvent { .. })));
    }
}
