//! Server Assembly
//!
//! Wires the transport, protocol, command and storage handlers into one
//! [`Scheduler`] and exposes start and shutdown.
//!
//! ```text
//! Read ─> Decode ─> Parse ─> Execute ─> Format ─> Write ─> Read ...
//!            │                                       │
//!            └──────────────> Close <────────────────┘
//!
//! Sweep (timer) ─> SweepHandler          ErrorReport ─> ErrorReportHandler
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use eventkv::config::Config;
//! use eventkv::server::Server;
//!
//! # async fn run() -> Result<(), eventkv::server::ServerError> {
//! let server = Server::bind(&Config::default()).await?;
//! let running = server.start();
//! println!("listening on {}", running.local_addr());
//! running.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use crate::commands::{ExecuteHandler, ParseHandler};
use crate::config::{Config, ConfigError};
use crate::connection::{TransportAdapter, TransportError};
use crate::event::{DispatchStats, ErrorReportHandler, IdIssuer, Scheduler, SchedulerHandle};
use crate::protocol::{DecodeHandler, Decoder, FormatHandler};
use crate::storage::{ExpirationService, SharedStorage, StorageEngine, SweepHandler};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::info;

/// Failures while starting or stopping the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("dispatch loop terminated abnormally: {0}")]
    Join(#[from] JoinError),
}

/// A bound but not yet running server.
pub struct Server {
    scheduler: Scheduler,
    local_addr: SocketAddr,
    storage: SharedStorage,
}

impl Server {
    /// Validates `config`, binds the listener and registers every handler.
    pub async fn bind(config: &Config) -> Result<Self, ServerError> {
        config.validate()?;

        let issuer = Arc::new(IdIssuer::new());
        let storage = StorageEngine::shared();
        let transport = TransportAdapter::bind(
            config.bind_address(),
            Arc::clone(&issuer),
            config.max_frame_bytes,
        )
        .await?;
        let local_addr = transport.local_addr();

        let decoder = Arc::new(Decoder::new());

        let mut scheduler = Scheduler::new();
        scheduler.register(transport.read_handler());
        scheduler.register(transport.write_handler());
        scheduler.register(transport.close_handler(Arc::clone(&decoder)));
        scheduler.register(DecodeHandler::with_decoder(decoder));
        scheduler.register(ParseHandler::new());
        scheduler.register(ExecuteHandler::new(Arc::clone(&storage)));
        scheduler.register(FormatHandler);
        scheduler.register(SweepHandler::new(Arc::clone(&storage)));
        scheduler.register(ErrorReportHandler);

        scheduler.add_source(transport);
        scheduler.add_source(ExpirationService::new(config.sweep_interval(), issuer));

        Ok(Self {
            scheduler,
            local_addr,
            storage,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn storage(&self) -> SharedStorage {
        Arc::clone(&self.storage)
    }

    /// Starts accepting connections and dispatching events.
    pub fn start(self) -> RunningServer {
        let handle = self.scheduler.start();
        info!(address = %self.local_addr, "Server started");

        RunningServer {
            handle,
            local_addr: self.local_addr,
            storage: self.storage,
        }
    }
}

/// A server that is accepting connections.
pub struct RunningServer {
    handle: SchedulerHandle,
    local_addr: SocketAddr,
    storage: SharedStorage,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn storage(&self) -> SharedStorage {
        Arc::clone(&self.storage)
    }

    /// Stops accepting and sweeping, then finishes every queued event.
    pub async fn shutdown(self) -> Result<DispatchStats, ServerError> {
        let stats = self.handle.shutdown().await?;
        info!("Server shutdown complete");
        Ok(stats)
    }
}
