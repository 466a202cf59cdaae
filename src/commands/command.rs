//! Typed commands and the parser that builds them from protocol values.
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO value`
//! - `GET key`
//! - `SET key value [PX milliseconds]`

use crate::protocol::RespValue;
use bytes::Bytes;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A parsed command, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Echo(Bytes),
    Get {
        key: Bytes,
    },
    Set {
        key: Bytes,
        value: Bytes,
        /// Absolute expiry computed when the command was parsed
        expire_at: Option<Instant>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Echo(_) => "ECHO",
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
        }
    }
}

/// Why a protocol value could not become a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    /// The value that should name the command is not a string
    #[error("{0} cannot name a command")]
    InvalidName(&'static str),

    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("wrong number of arguments for '{command}' command: expected {expected}, got {actual}")]
    WrongArity {
        command: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("invalid {argument} for '{command}' command: expected {expected}, got {actual}")]
    WrongType {
        command: &'static str,
        argument: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid expire time '{0}'")]
    InvalidExpire(String),

    #[error("{0} flag given more than once")]
    DuplicateFlag(String),

    #[error("unsupported flag '{0}'")]
    UnsupportedFlag(String),

    #[error("flag '{0}' is missing its value")]
    MissingFlagValue(String),
}

impl CommandError {
    /// True for an unrecognized command name, false for a malformed known one.
    pub fn is_unknown_command(&self) -> bool {
        matches!(self, CommandError::Unknown(_))
    }
}

/// Builds [`Command`]s from decoded values.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandParser;

impl CommandParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses `value`, resolving relative expiries against the current time.
    pub fn parse(&self, value: &RespValue) -> Result<Command, CommandError> {
        self.parse_at(value, Instant::now())
    }

    /// Parses `value`, resolving relative expiries against `now`.
    pub fn parse_at(&self, value: &RespValue, now: Instant) -> Result<Command, CommandError> {
        let name = command_name(value)?;
        let args: &[RespValue] = match value {
            RespValue::Array(items) => &items[1..],
            _ => &[],
        };

        match name.as_str() {
            "PING" => Ok(Command::Ping),
            "ECHO" => parse_echo(args),
            "GET" => parse_get(args),
            "SET" => parse_set(args, now),
            _ => Err(CommandError::Unknown(name)),
        }
    }
}

/// Resolves the upper-cased command name: a string names itself, an array
/// is named by its first element.
fn command_name(value: &RespValue) -> Result<String, CommandError> {
    match value {
        RespValue::SimpleString(_) | RespValue::BulkString(_) => value
            .as_str()
            .map(str::to_uppercase)
            .ok_or(CommandError::InvalidName("non-UTF-8 bulk string")),
        RespValue::Array(items) => match items.first() {
            Some(first) => command_name(first),
            None => Err(CommandError::Empty),
        },
        other => Err(CommandError::InvalidName(other.kind_name())),
    }
}

fn expect_arity(
    command: &'static str,
    args: &[RespValue],
    expected: &'static str,
    ok: bool,
) -> Result<(), CommandError> {
    if ok {
        Ok(())
    } else {
        Err(CommandError::WrongArity {
            command,
            expected,
            actual: args.len(),
        })
    }
}

fn string_arg(
    command: &'static str,
    argument: &'static str,
    value: &RespValue,
) -> Result<Bytes, CommandError> {
    value.string_bytes().ok_or(CommandError::WrongType {
        command,
        argument,
        expected: "string",
        actual: value.kind_name(),
    })
}

/// ECHO value
fn parse_echo(args: &[RespValue]) -> Result<Command, CommandError> {
    expect_arity("ECHO", args, "1", args.len() == 1)?;

    match &args[0] {
        RespValue::Integer(n) => Ok(Command::Echo(Bytes::from(n.to_string()))),
        other => Ok(Command::Echo(string_arg("ECHO", "value", other)?)),
    }
}

/// GET key
fn parse_get(args: &[RespValue]) -> Result<Command, CommandError> {
    expect_arity("GET", args, "1", args.len() == 1)?;

    Ok(Command::Get {
        key: string_arg("GET", "key", &args[0])?,
    })
}

/// SET key value [PX milliseconds]
fn parse_set(args: &[RespValue], now: Instant) -> Result<Command, CommandError> {
    expect_arity("SET", args, "at least 2", args.len() >= 2)?;

    let key = string_arg("SET", "key", &args[0])?;
    let value = string_arg("SET", "value", &args[1])?;

    let mut expire_at = None;
    let mut flags = args[2..].iter();
    while let Some(flag) = flags.next() {
        let name = flag
            .as_str()
            .ok_or(CommandError::WrongType {
                command: "SET",
                argument: "flag",
                expected: "string",
                actual: flag.kind_name(),
            })?
            .to_uppercase();

        let Some(flag_value) = flags.next() else {
            return Err(CommandError::MissingFlagValue(name));
        };

        match name.as_str() {
            "PX" => {
                if expire_at.is_some() {
                    return Err(CommandError::DuplicateFlag(name));
                }
                expire_at = Some(deadline(now, millis(flag_value)?)?);
            }
            _ => return Err(CommandError::UnsupportedFlag(name)),
        }
    }

    Ok(Command::Set {
        key,
        value,
        expire_at,
    })
}

fn millis(value: &RespValue) -> Result<i64, CommandError> {
    match value {
        RespValue::Integer(n) => Ok(*n),
        RespValue::SimpleString(_) | RespValue::BulkString(_) => {
            let text = value.as_str().unwrap_or_default();
            text.parse()
                .map_err(|_| CommandError::InvalidExpire(text.to_string()))
        }
        other => Err(CommandError::WrongType {
            command: "SET",
            argument: "PX value",
            expected: "integer",
            actual: other.kind_name(),
        }),
    }
}

/// Converts a relative millisecond TTL into an absolute instant. A negative
/// TTL yields an instant that is already due.
fn deadline(now: Instant, ms: i64) -> Result<Instant, CommandError> {
    if ms >= 0 {
        now.checked_add(Duration::from_millis(ms as u64))
            .ok_or_else(|| CommandError::InvalidExpire(ms.to_string()))
    } else {
        Ok(now
            .checked_sub(Duration::from_millis(ms.unsigned_abs()))
            .unwrap_or(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_command(args: &[&str]) -> RespValue {
        RespValue::Array(
            args.iter()
                .map(|s| RespValue::bulk_string(Bytes::from(s.to_string())))
                .collect(),
        )
    }

    fn parse(args: &[&str]) -> Result<Command, CommandError> {
        CommandParser::new().parse(&make_command(args))
    }

    #[test]
    fn test_ping() {
        assert_eq!(parse(&["PING"]), Ok(Command::Ping));
        assert_eq!(parse(&["ping"]), Ok(Command::Ping));
        assert_eq!(
            CommandParser::new().parse(&RespValue::simple_string("Ping")),
            Ok(Command::Ping)
        );
    }

    #[test]
    fn test_nested_command_name() {
        let value = RespValue::array(vec![make_command(&["ping"])]);
        assert_eq!(CommandParser::new().parse(&value), Ok(Command::Ping));
    }

    #[test]
    fn test_empty_and_invalid_names() {
        assert_eq!(
            CommandParser::new().parse(&RespValue::array(vec![])),
            Err(CommandError::Empty)
        );
        assert_eq!(
            CommandParser::new().parse(&RespValue::integer(3)),
            Err(CommandError::InvalidName("integer"))
        );
        assert_eq!(
            CommandParser::new().parse(&RespValue::array(vec![RespValue::null()])),
            Err(CommandError::InvalidName("null"))
        );
    }

    #[test]
    fn test_unknown_command() {
        let err = parse(&["FLUSHALL"]).unwrap_err();
        assert_eq!(err, CommandError::Unknown("FLUSHALL".to_string()));
        assert!(err.is_unknown_command());
    }

    #[test]
    fn test_echo() {
        assert_eq!(
            parse(&["ECHO", "hey"]),
            Ok(Command::Echo(Bytes::from("hey")))
        );

        let value = RespValue::array(vec![
            RespValue::bulk_string(Bytes::from("ECHO")),
            RespValue::integer(-12),
        ]);
        assert_eq!(
            CommandParser::new().parse(&value),
            Ok(Command::Echo(Bytes::from("-12")))
        );
    }

    #[test]
    fn test_echo_errors() {
        let err = parse(&["ECHO"]).unwrap_err();
        assert!(matches!(err, CommandError::WrongArity { command: "ECHO", actual: 0, .. }));
        assert!(!err.is_unknown_command());

        assert!(matches!(
            parse(&["ECHO", "a", "b"]),
            Err(CommandError::WrongArity { actual: 2, .. })
        ));

        let value = RespValue::array(vec![
            RespValue::bulk_string(Bytes::from("ECHO")),
            RespValue::array(vec![]),
        ]);
        assert!(matches!(
            CommandParser::new().parse(&value),
            Err(CommandError::WrongType { actual: "array", .. })
        ));
    }

    #[test]
    fn test_get() {
        assert_eq!(
            parse(&["get", "foo"]),
            Ok(Command::Get {
                key: Bytes::from("foo")
            })
        );
        assert!(matches!(
            parse(&["GET"]),
            Err(CommandError::WrongArity { command: "GET", .. })
        ));

        let value = RespValue::array(vec![
            RespValue::bulk_string(Bytes::from("GET")),
            RespValue::integer(1),
        ]);
        assert!(matches!(
            CommandParser::new().parse(&value),
            Err(CommandError::WrongType { argument: "key", .. })
        ));
    }

    #[test]
    fn test_set_plain() {
        assert_eq!(
            parse(&["SET", "foo", "bar"]),
            Ok(Command::Set {
                key: Bytes::from("foo"),
                value: Bytes::from("bar"),
                expire_at: None,
            })
        );
        assert!(matches!(
            parse(&["SET", "foo"]),
            Err(CommandError::WrongArity { expected: "at least 2", actual: 1, .. })
        ));
    }

    #[test]
    fn test_set_px() {
        let now = Instant::now();
        let parsed = CommandParser::new()
            .parse_at(&make_command(&["SET", "foo", "bar", "px", "50"]), now)
            .unwrap();
        assert_eq!(
            parsed,
            Command::Set {
                key: Bytes::from("foo"),
                value: Bytes::from("bar"),
                expire_at: Some(now + Duration::from_millis(50)),
            }
        );

        let value = RespValue::array(vec![
            RespValue::bulk_string(Bytes::from("SET")),
            RespValue::bulk_string(Bytes::from("foo")),
            RespValue::bulk_string(Bytes::from("bar")),
            RespValue::bulk_string(Bytes::from("PX")),
            RespValue::integer(100),
        ]);
        let parsed = CommandParser::new().parse_at(&value, now).unwrap();
        assert!(matches!(
            parsed,
            Command::Set { expire_at: Some(at), .. } if at == now + Duration::from_millis(100)
        ));
    }

    #[test]
    fn test_set_negative_px_is_already_due() {
        let now = Instant::now();
        let parsed = CommandParser::new()
            .parse_at(&make_command(&["SET", "foo", "bar", "PX", "-10"]), now)
            .unwrap();
        match parsed {
            Command::Set {
                expire_at: Some(at),
                ..
            } => assert!(at <= now),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_set_flag_errors() {
        assert_eq!(
            parse(&["SET", "k", "v", "PX", "10", "PX", "20"]),
            Err(CommandError::DuplicateFlag("PX".to_string()))
        );
        assert_eq!(
            parse(&["SET", "k", "v", "PX", "soon"]),
            Err(CommandError::InvalidExpire("soon".to_string()))
        );
        assert_eq!(
            parse(&["SET", "k", "v", "PX"]),
            Err(CommandError::MissingFlagValue("PX".to_string()))
        );
        assert_eq!(
            parse(&["SET", "k", "v", "EX", "10"]),
            Err(CommandError::UnsupportedFlag("EX".to_string()))
        );
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Command::Ping.name(), "PING");
        assert_eq!(Command::Echo(Bytes::new()).name(), "ECHO");
    }
}
