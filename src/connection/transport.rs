//! TCP transport adapter.
//!
//! Owns the listener and the connection registry. As an [`EventSource`] it
//! accepts clients, binds each one to a fresh request id and requests the
//! first read. The read, write and close handlers it hands out perform the
//! actual socket I/O on the tokio runtime.

use crate::connection::{
    CloseHandler, ConnectionEntry, ConnectionRegistry, ReadHandler, TransportStats, WriteHandler,
};
use crate::event::{Event, EventSource, IdIssuer, Pusher, RequestId};
use crate::protocol::Decoder;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Errors raised by socket I/O.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line grew past the configured maximum without a CRLF
    #[error("frame exceeds {max} bytes")]
    FrameTooLarge { max: usize },

    #[error("no connection bound to request {0}")]
    UnknownConnection(RequestId),

    #[error("connection read side is no longer available")]
    ReaderUnavailable,

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// State shared by the accept loop and the I/O handlers.
#[derive(Debug)]
pub(crate) struct TransportShared {
    pub(crate) registry: ConnectionRegistry,
    pub(crate) issuer: Arc<IdIssuer>,
    pub(crate) stats: TransportStats,
    pub(crate) max_frame: usize,
}

/// Accepts TCP clients and performs their I/O.
#[derive(Debug)]
pub struct TransportAdapter {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    shared: Arc<TransportShared>,
    /// Present while the accept loop runs
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl TransportAdapter {
    /// Binds the listener. Connections are not accepted until the adapter
    /// is started as an event source.
    pub async fn bind<A: ToSocketAddrs + std::fmt::Display>(
        address: A,
        issuer: Arc<IdIssuer>,
        max_frame: usize,
    ) -> Result<Self, TransportError> {
        let label = address.to_string();
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| TransportError::Bind {
                address: label.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!(address = %local_addr, "Listener bound");

        Ok(Self {
            listener: Some(listener),
            local_addr,
            shared: Arc::new(TransportShared {
                registry: ConnectionRegistry::new(),
                issuer,
                stats: TransportStats::new(),
                max_frame,
            }),
            shutdown_tx: None,
        })
    }

    /// The address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.shared.registry
    }

    pub fn stats(&self) -> &TransportStats {
        &self.shared.stats
    }

    pub fn read_handler(&self) -> ReadHandler {
        ReadHandler::new(Arc::clone(&self.shared))
    }

    pub fn write_handler(&self) -> WriteHandler {
        WriteHandler::new(Arc::clone(&self.shared))
    }

    /// The close handler also discards any partial value `decoder` holds
    /// for the closed id.
    pub fn close_handler(&self, decoder: Arc<Decoder>) -> CloseHandler {
        CloseHandler::new(Arc::clone(&self.shared), decoder)
    }
}

impl EventSource for TransportAdapter {
    fn name(&self) -> &'static str {
        "transport"
    }

    fn start(&mut self, push: Pusher) {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => {
                error!("Transport already started");
                return;
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.shared),
            push,
            shutdown_rx,
        ));
        self.shutdown_tx = Some(shutdown_tx);

        info!(address = %self.local_addr, "Accepting connections");
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
            info!("Transport stopped accepting connections");
        }
    }
}

impl Drop for TransportAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<TransportShared>,
    push: Pusher,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(client = %peer, error = %e, "Failed to set TCP_NODELAY");
                        }
                        let id = shared.issuer.issue();
                        shared
                            .registry
                            .insert(id, Arc::new(ConnectionEntry::new(stream, peer)));
                        shared.stats.connection_opened();
                        info!(id, client = %peer, "Client connected");
                        push.push(Event::Read { id });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                }
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Accept loop received shutdown signal");
                    return;
                }
            }
        }
    }
}
