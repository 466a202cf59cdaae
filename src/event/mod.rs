//! Event Bus
//!
//! Everything the server does is an [`Event`] flowing through one queue:
//!
//! ```text
//! accept ──> Read ──> Decode ──> Parse ──> Execute ──> Format ──> Write
//!             ▲         │                                           │
//!             └─────────┘ (value incomplete)                        │
//!             ▲                                                     │
//!             └──────────────── new id ─────────────────────────────┘
//!
//! timer ──> Sweep
//! ```
//!
//! The [`Scheduler`] owns the queue and routes each event to the single
//! [`Handler`] registered for its [`EventKind`]. Handlers run on the
//! dispatch thread and never block on the network; connection I/O is
//! spawned onto the tokio runtime and reports back with more events.
//!
//! ## Modules
//!
//! - `types`: [`Event`], [`EventKind`], [`RequestId`]
//! - `queue`: [`EventQueue`] and the enqueue-only [`Pusher`]
//! - `id`: [`IdIssuer`]
//! - `handler`: [`Handler`], [`EventSource`], [`HandlerError`]
//! - `scheduler`: [`Scheduler`] and its running [`SchedulerHandle`]

pub mod handler;
pub mod id;
pub mod queue;
pub mod scheduler;
pub mod types;

pub use handler::{ErrorReportHandler, EventSource, Handler, HandlerError};
pub use id::IdIssuer;
pub use queue::{EventQueue, Pusher};
pub use scheduler::{DispatchStats, Scheduler, SchedulerHandle, DEFAULT_IDLE_BACKOFF};
pub use types::{Event, EventKind, RequestId};
