//! Runs commands against storage.

use crate::commands::Command;
use crate::protocol::RespValue;
use crate::storage::{SharedStorage, Storage, StorageEngine, StorageError};

/// Applies commands to storage and produces the reply value.
pub struct Executor<S: Storage = StorageEngine> {
    storage: SharedStorage<S>,
}

impl<S: Storage> Executor<S> {
    pub fn new(storage: SharedStorage<S>) -> Self {
        Self { storage }
    }

    /// Executes `command`.
    ///
    /// A missing or expired key is a null reply, not an error. Only storage
    /// failures are errors.
    pub fn execute(&self, command: Command) -> Result<RespValue, StorageError> {
        match command {
            Command::Ping => Ok(RespValue::pong()),
            Command::Echo(value) => Ok(RespValue::bulk_string(value)),
            Command::Get { key } => Ok(match self.storage.lock().get(&key)? {
                Some(value) => RespValue::bulk_string(value),
                None => RespValue::null(),
            }),
            Command::Set {
                key,
                value,
                expire_at,
            } => {
                self.storage.lock().set(key, value, expire_at)?;
                Ok(RespValue::ok())
            }
        }
    }
}
