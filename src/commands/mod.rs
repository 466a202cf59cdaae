//! Command Module
//!
//! Turns decoded protocol values into typed commands and runs them.
//!
//! ## Architecture
//!
//! ```text
//!  Event::Parse
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  ParseHandler   │  CommandParser: RespValue -> Command
//! └────────┬────────┘
//!          │ Event::Execute
//!          ▼
//! ┌─────────────────┐
//! │ ExecuteHandler  │  Executor: Command -> RespValue
//! └────────┬────────┘
//!          │ Event::Format
//!          ▼
//!   protocol::FormatHandler
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO value`
//! - `GET key`
//! - `SET key value [PX milliseconds]`

pub mod command;
pub mod executor;
pub mod handler;

pub use command::{Command, CommandError, CommandParser};
pub use executor::Executor;
pub use handler::{ExecuteHandler, ParseHandler};
