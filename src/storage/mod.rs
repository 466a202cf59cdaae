//! Storage Engine Module
//!
//! Key-value storage with per-key expiry and heap-driven sweeping.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   StorageEngine                      │
//! │  data: key -> value                                  │
//! │  expirations: key -> expiry (earliest wins)          │
//! │  expiry_heap: (expiry, key) candidates, maybe stale  │
//! └──────────────────────────────────────────────────────┘
//!            ▲                            ▲
//!            │ get / set                  │ expire_all_until
//!   ┌────────┴────────┐          ┌────────┴────────┐
//!   │ ExecuteHandler  │          │  SweepHandler   │ <── ExpirationService
//!   └─────────────────┘          └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use eventkv::storage::{Storage, StorageEngine};
//! use bytes::Bytes;
//! use std::time::{Duration, Instant};
//!
//! let mut engine = StorageEngine::new();
//! let later = Instant::now() + Duration::from_secs(60);
//! engine.set(Bytes::from("session"), Bytes::from("token"), Some(later)).unwrap();
//! assert_eq!(engine.get(b"session").unwrap(), Some(Bytes::from("token")));
//!
//! assert_eq!(engine.expire_all_until(later + Duration::from_millis(1)), 1);
//! assert_eq!(engine.get(b"session").unwrap(), None);
//! ```

pub mod engine;
pub mod expiry;

pub use engine::{ExpiryEntry, SharedStorage, Storage, StorageEngine, StorageError};
pub use expiry::{ExpirationService, SweepHandler, DEFAULT_SWEEP_INTERVAL};
