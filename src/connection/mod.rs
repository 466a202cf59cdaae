//! Connection Module
//!
//! Socket I/O for the event pipeline. Nothing here parses commands: the
//! transport turns bytes on the wire into frames and frames back into bytes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TransportAdapter (EventSource)              │
//! │         accept() ─> mint id ─> register ─> Read{id}         │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        ▼
//!           ┌────────────────────────┐
//!           │   ConnectionRegistry   │   id -> ConnectionEntry
//!           └────────────┬───────────┘
//!                        │
//!        ┌───────────────┼────────────────┐
//!        ▼               ▼                ▼
//!  ┌───────────┐   ┌────────────┐   ┌────────────┐
//!  │ReadHandler│   │WriteHandler│   │CloseHandler│
//!  └─────┬─────┘   └─────┬──────┘   └────────────┘
//!        │               │
//!        ▼               ▼
//!  FrameScanner     write + flush,
//!  (one CRLF line)  rebind to new id
//! ```
//!
//! ## Features
//!
//! - **Async I/O**: every socket operation runs on a spawned tokio task
//! - **Buffer Management**: a BytesMut buffer per connection holds bytes
//!   read past the current frame, so pipelined commands are not lost
//! - **Frame Limit**: a line longer than the configured maximum closes the
//!   connection
//! - **Statistics**: [`TransportStats`] tracks connections and traffic

pub mod handler;
pub mod registry;
pub mod scanner;
pub mod transport;

pub use handler::{CloseHandler, ReadHandler, WriteHandler};
pub use registry::{ConnectionEntry, ConnectionRegistry, TransportStats};
pub use scanner::{FrameScanner, DEFAULT_MAX_FRAME_SIZE};
pub use transport::{TransportAdapter, TransportError};
