//! Scheduler handlers for parsing and executing commands.
//!
//! A command that fails to parse or execute is logged and dropped: the
//! client gets no reply and its connection is left as is.

use crate::commands::{CommandParser, Executor};
use crate::event::{Event, EventKind, Handler, HandlerError, Pusher};
use crate::storage::{SharedStorage, Storage, StorageEngine};
use tracing::debug;

/// Turns completed protocol values into commands.
#[derive(Debug, Default)]
pub struct ParseHandler {
    parser: CommandParser,
}

impl ParseHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Handler for ParseHandler {
    fn target(&self) -> EventKind {
        EventKind::Parse
    }

    fn handle(&mut self, event: Event, push: &Pusher) -> Result<(), HandlerError> {
        let (id, value) = match event {
            Event::Parse { id, value } => (id, value),
            other => return Err(HandlerError::unexpected(self.target(), &other)),
        };

        let command = self.parser.parse(&value)?;
        debug!(id, command = command.name(), "Parsed command");
        push.push(Event::Execute { id, command });
        Ok(())
    }
}

/// Executes commands and queues their replies for formatting.
pub struct ExecuteHandler<S: Storage = StorageEngine> {
    executor: Executor<S>,
}

impl<S: Storage> ExecuteHandler<S> {
    pub fn new(storage: SharedStorage<S>) -> Self {
        Self {
            executor: Executor::new(storage),
        }
    }
}

impl<S: Storage> Handler for ExecuteHandler<S> {
    fn target(&self) -> EventKind {
        EventKind::Execute
    }

    fn handle(&mut self, event: Event, push: &Pusher) -> Result<(), HandlerError> {
        let (id, command) = match event {
            Event::Execute { id, command } => (id, command),
            other => return Err(HandlerError::unexpected(self.target(), &other)),
        };

        let name = command.name();
        let value = self.executor.execute(command)?;
        debug!(id, command = name, "Executed command");
        push.push(Event::Format { id, value });
        Ok(())
    }
}
