//! # EventKV - An Event-Driven In-Memory Key-Value Server
//!
//! EventKV speaks a subset of the Redis serialization protocol (RESP) and
//! serves `PING`, `ECHO`, `GET` and `SET ... [PX ms]`. Every step of a
//! request, from reading a line off the socket to writing the reply, is an
//! event on a single queue processed by one dispatch loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              EventKV                                    │
//! │                                                                         │
//! │  ┌──────────────┐                          ┌─────────────────────────┐  │
//! │  │  Transport   │── Read{id} ──┐           │  ExpirationService      │  │
//! │  │  (accept)    │              │           │  (interval timer)       │  │
//! │  └──────────────┘              ▼           └───────────┬─────────────┘  │
//! │                       ┌─────────────────┐              │ Sweep{at}      │
//! │   I/O workers ───────>│   EventQueue    │<─────────────┘                │
//! │   (tokio tasks)       └────────┬────────┘                               │
//! │         ▲                      │                                        │
//! │         │                      ▼                                        │
//! │         │             ┌─────────────────┐                               │
//! │         └─────────────│   Dispatcher    │── one handler per EventKind   │
//! │                       └────────┬────────┘                               │
//! │                                │                                        │
//! │      Decode ─> Parse ─> Execute ─> Format ─> Write ─> Read (new id)     │
//! │                           │                                             │
//! │                           ▼                                             │
//! │                  ┌─────────────────┐                                    │
//! │                  │  StorageEngine  │  data + expirations + min-heap     │
//! │                  └─────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use eventkv::config::Config;
//! use eventkv::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Server::bind(&Config::default()).await?.start();
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO message`
//! - `GET key`
//! - `SET key value [PX milliseconds]`
//!
//! ## Module Overview
//!
//! - [`event`]: event types, queue, handler contract and the scheduler
//! - [`connection`]: TCP accept loop, frame scanning and socket I/O handlers
//! - [`protocol`]: RESP values, the resumable decoder and the encoder
//! - [`commands`]: command parsing and execution
//! - [`storage`]: key-value storage with expiry and the sweep timer
//! - [`server`]: wires everything together
//! - [`config`]: command-line and environment configuration
//!
//! ## Design Highlights
//!
//! ### One-Shot Request Ids
//!
//! A connection is bound to a fresh id for every request. The id is retired
//! when the reply is written, so an id never refers to two requests.
//!
//! ### Lazy + Active Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: When a key is accessed, we check if it's expired
//! 2. **Active**: A timer periodically pops due entries off a min-heap
//!
//! This ensures memory is reclaimed even for keys that are never accessed again.

pub mod commands;
pub mod config;
pub mod connection;
pub mod event;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::Config;
pub use protocol::RespValue;
pub use server::{RunningServer, Server, ServerError};
pub use storage::StorageEngine;

/// The default port EventKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host EventKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of EventKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
