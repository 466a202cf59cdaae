//! In-Memory Storage Engine with Lazy TTL Sweeping
//!
//! The engine keeps three structures:
//!
//! ```text
//! ┌──────────────────────┐  ┌───────────────────────┐  ┌──────────────────────────┐
//! │ data                 │  │ expirations           │  │ expiry_heap (min-heap)   │
//! │ key -> value         │  │ key -> current expiry │  │ (expires_at, key) ...    │
//! └──────────────────────┘  └───────────────────────┘  └──────────────────────────┘
//!        authoritative            authoritative             candidates, may be stale
//! ```
//!
//! Reads check `expirations` directly, so an expired key is invisible even
//! before any sweep. Sweeps pop heap candidates in expiry order and
//! cross-check them against `expirations`; superseded candidates are simply
//! skipped, so the heap never needs decrease-key or removal.
//!
//! ## Concurrency
//!
//! The engine itself is not synchronized. The server only touches it from
//! the dispatch thread, through a [`SharedStorage`] lock that is therefore
//! never contended.

use bytes::Bytes;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::trace;

/// Storage failures.
///
/// The in-memory engine never fails; other backends may.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Operations the executor and the expiration sweep need from storage.
pub trait Storage: Send {
    /// Returns the value for `key`, or `None` if it is missing or expired.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StorageError>;

    /// Stores `value` under `key`, optionally expiring at `expire_at`.
    fn set(&mut self, key: Bytes, value: Bytes, expire_at: Option<Instant>)
        -> Result<(), StorageError>;

    /// Removes every key whose expiry is before `until`. Returns how many.
    fn expire_all_until(&mut self, until: Instant) -> usize;
}

/// Storage shared between the execute and sweep handlers.
pub type SharedStorage<S = StorageEngine> = Arc<Mutex<S>>;

/// A deletion candidate. Ordered by expiry, then key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExpiryEntry {
    pub expires_at: Instant,
    pub key: Bytes,
}

/// The in-memory storage engine.
///
/// # Example
///
/// ```
/// use eventkv::storage::StorageEngine;
/// use bytes::Bytes;
/// use std::time::{Duration, Instant};
///
/// let mut engine = StorageEngine::new();
/// engine.insert(Bytes::from("name"), Bytes::from("value"), None);
/// assert_eq!(engine.lookup(b"name"), Some(Bytes::from("value")));
///
/// let soon = Instant::now() + Duration::from_millis(50);
/// engine.insert(Bytes::from("session"), Bytes::from("abc"), Some(soon));
/// assert_eq!(engine.lookup_at(b"session", soon), None);
/// ```
#[derive(Debug, Default)]
pub struct StorageEngine {
    data: HashMap<Bytes, Bytes>,
    expirations: HashMap<Bytes, Instant>,
    expiry_heap: BinaryHeap<Reverse<ExpiryEntry>>,
}

impl StorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh engine for sharing between handlers.
    pub fn shared() -> SharedStorage {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Looks up `key` as of now.
    pub fn lookup(&self, key: &[u8]) -> Option<Bytes> {
        self.lookup_at(key, Instant::now())
    }

    /// Looks up `key` as of `now`. A key is expired once `now` is past its
    /// expiry.
    pub fn lookup_at(&self, key: &[u8], now: Instant) -> Option<Bytes> {
        let value = self.data.get(key)?;
        match self.expirations.get(key) {
            Some(&expires_at) if now > expires_at => None,
            _ => Some(value.clone()),
        }
    }

    /// Stores `value` under `key` as of now.
    pub fn insert(&mut self, key: Bytes, value: Bytes, expire_at: Option<Instant>) {
        self.insert_at(key, value, expire_at, Instant::now())
    }

    /// Stores `value` under `key` as of `now`.
    ///
    /// - An expiry before `now` deletes the key instead.
    /// - An existing expiry is only replaced by an earlier one.
    /// - No expiry clears any recorded one.
    pub fn insert_at(&mut self, key: Bytes, value: Bytes, expire_at: Option<Instant>, now: Instant) {
        match expire_at {
            Some(expires_at) if expires_at < now => {
                self.delete(&key);
                return;
            }
            Some(expires_at) => {
                let earlier = self
                    .expirations
                    .get(&key)
                    .map_or(true, |&current| expires_at < current);
                if earlier {
                    self.expirations.insert(key.clone(), expires_at);
                }
                self.expiry_heap.push(Reverse(ExpiryEntry {
                    expires_at,
                    key: key.clone(),
                }));
            }
            None => {
                self.expirations.remove(&key);
            }
        }

        self.data.insert(key, value);
    }

    /// Removes `key` and its expiry. Returns true if the key existed.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.expirations.remove(key);
        self.data.remove(key).is_some()
    }

    /// Pops candidates expiring before `until` and deletes their keys unless
    /// the candidate has been superseded.
    ///
    /// A candidate is stale only when the key's recorded expiry is later
    /// than `until`. A key with no recorded expiry is deleted.
    pub fn sweep(&mut self, until: Instant) -> usize {
        let mut removed = 0;

        while let Some(Reverse(next)) = self.expiry_heap.peek() {
            if next.expires_at >= until {
                break;
            }
            let Some(Reverse(entry)) = self.expiry_heap.pop() else {
                break;
            };

            if let Some(&current) = self.expirations.get(&entry.key) {
                if current > until {
                    continue;
                }
            }
            if self.delete(&entry.key) {
                removed += 1;
                trace!(key = ?entry.key, "Expired key removed");
            }
        }

        removed
    }

    /// Number of keys stored, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current expiry recorded for `key`, if any.
    pub fn expiry_of(&self, key: &[u8]) -> Option<Instant> {
        self.expirations.get(key).copied()
    }

    /// Heap candidates still waiting to be swept, stale ones included.
    pub fn pending_expirations(&self) -> usize {
        self.expiry_heap.len()
    }
}

impl Storage for StorageEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StorageError> {
        Ok(self.lookup(key))
    }

    fn set(
        &mut self,
        key: Bytes,
        value: Bytes,
        expire_at: Option<Instant>,
    ) -> Result<(), StorageError> {
        self.insert(key, value, expire_at);
        Ok(())
    }

    fn expire_all_until(&mut self, until: Instant) -> usize {
        self.sweep(until)
    }
}
