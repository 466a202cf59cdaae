//! Resumable, frame-at-a-time protocol decoder.
//!
//! The transport hands the decoder one CRLF-delimited frame at a time, so a
//! single value usually arrives over several calls:
//!
//! ```text
//! *2\r\n        begin array(2)           -> incomplete
//! $4\r\n        begin bulk(4) as child   -> incomplete
//! ECHO\r\n      bulk content, append     -> incomplete
//! $3\r\n        begin bulk(3) as child   -> incomplete
//! hey\r\n       bulk content, append     -> complete: ["ECHO", "hey"]
//! ```
//!
//! Progress is kept per request identifier in a concurrent registry. State
//! is removed once a value completes or a frame fails to decode; a failed
//! identifier is never resumable.

use crate::event::RequestId;
use crate::protocol::types::{prefix, RespValue};
use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;

/// Maximum declared length of a single bulk string (512 MB)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum declared element count of a single array
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Maximum array nesting depth
pub const MAX_NESTING_DEPTH: usize = 32;

/// Errors produced while decoding frames.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// A value must start with a type tag
    #[error("empty frame")]
    EmptyFrame,

    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for null)
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Bulk content frame does not match the declared length
    #[error("bulk string length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("array too large: {len} elements (max: {max})")]
    ArrayTooLarge { len: usize, max: usize },

    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("maximum nesting depth exceeded: {0}")]
    NestingTooDeep(usize),
}

/// Outcome of feeding one frame to the decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Complete(RespValue),
    /// More frames are needed for this identifier
    Incomplete,
}

/// Per-identifier decoder registry.
#[derive(Debug, Default)]
pub struct Decoder {
    states: DashMap<RequestId, DecodeState>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one frame (without its CRLF) for `id`.
    ///
    /// Starts a new value if nothing is in progress for `id`, otherwise
    /// continues the saved one.
    pub fn decode(&self, id: RequestId, frame: &[u8]) -> Result<Decoded, DecodeError> {
        let mut state = self
            .states
            .remove(&id)
            .map(|(_, state)| state)
            .unwrap_or_default();

        match state.advance(frame)? {
            Some(value) => Ok(Decoded::Complete(value)),
            None => {
                self.states.insert(id, state);
                Ok(Decoded::Incomplete)
            }
        }
    }

    /// Drops any partial value for `id`. Returns true if one existed.
    pub fn discard(&self, id: RequestId) -> bool {
        self.states.remove(&id).is_some()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.states.contains_key(&id)
    }

    /// Number of identifiers with a partial value.
    pub fn in_flight(&self) -> usize {
        self.states.len()
    }
}

/// Partially built value for one identifier.
///
/// `arrays` is the stack of open arrays, innermost last. A bulk string
/// waiting for its content frame always sits above them in `bulk`.
#[derive(Debug, Default)]
pub struct DecodeState {
    arrays: Vec<PartialArray>,
    bulk: Option<usize>,
}

#[derive(Debug)]
struct PartialArray {
    declared: usize,
    elements: Vec<RespValue>,
}

enum Header {
    Complete(RespValue),
    Bulk(usize),
    Array(usize),
}

impl DecodeState {
    pub fn is_complete(&self) -> bool {
        self.arrays.is_empty() && self.bulk.is_none()
    }

    /// Applies one frame; returns the value once the outermost one closes.
    fn advance(&mut self, frame: &[u8]) -> Result<Option<RespValue>, DecodeError> {
        let mut finished = match self.bulk.take() {
            Some(expected) => {
                if frame.len() != expected {
                    return Err(DecodeError::LengthMismatch {
                        expected,
                        actual: frame.len(),
                    });
                }
                Some(RespValue::BulkString(Bytes::copy_from_slice(frame)))
            }
            None => self.begin(frame)?,
        };

        // Collapse: every finished value becomes the next element of the
        // array below it, which may in turn finish.
        while let Some(value) = finished.take() {
            let Some(parent) = self.arrays.last_mut() else {
                return Ok(Some(value));
            };
            parent.elements.push(value);
            if parent.elements.len() == parent.declared {
                finished = self
                    .arrays
                    .pop()
                    .map(|array| RespValue::Array(array.elements));
            }
        }

        Ok(None)
    }

    fn begin(&mut self, frame: &[u8]) -> Result<Option<RespValue>, DecodeError> {
        match parse_header(frame)? {
            Header::Complete(value) => Ok(Some(value)),
            Header::Bulk(declared) => {
                self.bulk = Some(declared);
                Ok(None)
            }
            Header::Array(declared) => {
                if self.arrays.len() >= MAX_NESTING_DEPTH {
                    return Err(DecodeError::NestingTooDeep(MAX_NESTING_DEPTH));
                }
                self.arrays.push(PartialArray {
                    declared,
                    elements: Vec::with_capacity(declared.min(64)),
                });
                Ok(None)
            }
        }
    }
}

/// Reads the type tag and body of a frame that starts a value.
fn parse_header(frame: &[u8]) -> Result<Header, DecodeError> {
    let (&tag, body) = frame.split_first().ok_or(DecodeError::EmptyFrame)?;

    match tag {
        prefix::SIMPLE_STRING => Ok(Header::Complete(RespValue::SimpleString(
            utf8(body)?.to_string(),
        ))),
        prefix::ERROR => Ok(Header::Complete(RespValue::Error(utf8(body)?.to_string()))),
        prefix::INTEGER => Ok(Header::Complete(RespValue::Integer(integer(body)?))),
        prefix::BULK_STRING => match integer(body)? {
            -1 => Ok(Header::Complete(RespValue::Null)),
            n if n < 0 => Err(DecodeError::InvalidBulkLength(n)),
            n => {
                let size = n as usize;
                if size > MAX_BULK_SIZE {
                    return Err(DecodeError::MessageTooLarge {
                        size,
                        max: MAX_BULK_SIZE,
                    });
                }
                Ok(Header::Bulk(size))
            }
        },
        prefix::ARRAY => match integer(body)? {
            -1 => Ok(Header::Complete(RespValue::Null)),
            n if n < 0 => Err(DecodeError::InvalidArrayLength(n)),
            0 => Ok(Header::Complete(RespValue::Array(Vec::new()))),
            n => {
                let len = n as usize;
                if len > MAX_ARRAY_LEN {
                    return Err(DecodeError::ArrayTooLarge {
                        len,
                        max: MAX_ARRAY_LEN,
                    });
                }
                Ok(Header::Array(len))
            }
        },
        other => Err(DecodeError::UnknownPrefix(other)),
    }
}

fn utf8(body: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(body).map_err(|e| DecodeError::InvalidUtf8(e.to_string()))
}

fn integer(body: &[u8]) -> Result<i64, DecodeError> {
    utf8(body)?
        .parse()
        .map_err(|e: std::num::ParseIntError| DecodeError::InvalidInteger(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Splits wire bytes into CRLF-delimited frames, the way the transport does.
    fn frames(wire: &[u8]) -> Vec<&[u8]> {
        let mut out = Vec::new();
        let mut rest = wire;
        while let Some(pos) = rest.windows(2).position(|w| w == b"\r\n") {
            out.push(&rest[..pos]);
            rest = &rest[pos + 2..];
        }
        out
    }

    /// Feeds every frame to the decoder under `id` and returns the value.
    fn decode_all(decoder: &Decoder, id: RequestId, wire: &[u8]) -> RespValue {
        let frames = frames(wire);
        let last = frames.len() - 1;
        for (i, frame) in frames.into_iter().enumerate() {
            match decoder.decode(id, frame).unwrap() {
                Decoded::Complete(value) => {
                    assert_eq!(i, last, "value completed before the last frame");
                    return value;
                }
                Decoded::Incomplete => assert!(i < last, "last frame left value incomplete"),
            }
        }
        unreachable!("no frames decoded")
    }

    #[test]
    fn test_scalars_complete_in_one_frame() {
        let decoder = Decoder::new();
        assert_eq!(
            decoder.decode(1, b"+OK").unwrap(),
            Decoded::Complete(RespValue::simple_string("OK"))
        );
        assert_eq!(
            decoder.decode(1, b"-ERR boom").unwrap(),
            Decoded::Complete(RespValue::error("ERR boom"))
        );
        assert_eq!(
            decoder.decode(1, b":-42").unwrap(),
            Decoded::Complete(RespValue::integer(-42))
        );
        assert_eq!(decoder.in_flight(), 0);
    }

    #[test]
    fn test_bulk_string_spans_two_frames() {
        let decoder = Decoder::new();
        assert_eq!(decoder.decode(1, b"$5").unwrap(), Decoded::Incomplete);
        assert!(decoder.is_pending(1));
        assert_eq!(
            decoder.decode(1, b"hello").unwrap(),
            Decoded::Complete(RespValue::bulk_string(Bytes::from("hello")))
        );
        assert!(!decoder.is_pending(1));
    }

    #[test]
    fn test_empty_and_null_bulk_strings() {
        let decoder = Decoder::new();
        assert_eq!(decoder.decode(1, b"$0").unwrap(), Decoded::Incomplete);
        assert_eq!(
            decoder.decode(1, b"").unwrap(),
            Decoded::Complete(RespValue::bulk_string(Bytes::new()))
        );
        assert_eq!(
            decoder.decode(2, b"$-1").unwrap(),
            Decoded::Complete(RespValue::Null)
        );
        assert_eq!(
            decoder.decode(3, b"*-1").unwrap(),
            Decoded::Complete(RespValue::Null)
        );
        assert_eq!(
            decoder.decode(4, b"*0").unwrap(),
            Decoded::Complete(RespValue::array(vec![]))
        );
    }

    #[test]
    fn test_command_array() {
        let decoder = Decoder::new();
        let value = decode_all(&decoder, 9, b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n");
        assert_eq!(
            value,
            RespValue::array(vec![
                RespValue::bulk_string(Bytes::from("ECHO")),
                RespValue::bulk_string(Bytes::from("hey")),
            ])
        );
        assert_eq!(decoder.in_flight(), 0);
    }

    #[test]
    fn test_nested_arrays_collapse() {
        let decoder = Decoder::new();
        let value = decode_all(&decoder, 1, b"*3\r\n*2\r\n:1\r\n*1\r\n$1\r\nx\r\n+tail\r\n*0\r\n");
        assert_eq!(
            value,
            RespValue::array(vec![
                RespValue::array(vec![
                    RespValue::integer(1),
                    RespValue::array(vec![RespValue::bulk_string(Bytes::from("x"))]),
                ]),
                RespValue::simple_string("tail"),
                RespValue::array(vec![]),
            ])
        );
    }

    #[test]
    fn test_interleaved_identifiers() {
        let decoder = Decoder::new();
        assert_eq!(decoder.decode(1, b"*2").unwrap(), Decoded::Incomplete);
        assert_eq!(decoder.decode(2, b"*1").unwrap(), Decoded::Incomplete);
        assert_eq!(decoder.decode(1, b":1").unwrap(), Decoded::Incomplete);
        assert_eq!(
            decoder.decode(2, b"+two").unwrap(),
            Decoded::Complete(RespValue::array(vec![RespValue::simple_string("two")]))
        );
        assert_eq!(
            decoder.decode(1, b":2").unwrap(),
            Decoded::Complete(RespValue::array(vec![
                RespValue::integer(1),
                RespValue::integer(2)
            ]))
        );
        assert_eq!(decoder.in_flight(), 0);
    }

    #[test]
    fn test_length_mismatch_discards_state() {
        let decoder = Decoder::new();
        assert_eq!(decoder.decode(1, b"$3").unwrap(), Decoded::Incomplete);
        assert_eq!(
            decoder.decode(1, b"abcd"),
            Err(DecodeError::LengthMismatch {
                expected: 3,
                actual: 4
            })
        );
        assert!(!decoder.is_pending(1));

        // The identifier starts fresh afterwards.
        assert_eq!(
            decoder.decode(1, b":5").unwrap(),
            Decoded::Complete(RespValue::integer(5))
        );
    }

    #[test]
    fn test_error_inside_array_discards_state() {
        let decoder = Decoder::new();
        assert_eq!(decoder.decode(1, b"*2").unwrap(), Decoded::Incomplete);
        assert_eq!(decoder.decode(1, b":1").unwrap(), Decoded::Incomplete);
        assert_eq!(
            decoder.decode(1, b"?what"),
            Err(DecodeError::UnknownPrefix(b'?'))
        );
        assert_eq!(decoder.in_flight(), 0);
    }

    #[test]
    fn test_malformed_headers() {
        let decoder = Decoder::new();
        assert_eq!(decoder.decode(1, b""), Err(DecodeError::EmptyFrame));
        assert!(matches!(
            decoder.decode(1, b":abc"),
            Err(DecodeError::InvalidInteger(_))
        ));
        assert!(matches!(
            decoder.decode(1, b"$x"),
            Err(DecodeError::InvalidInteger(_))
        ));
        assert_eq!(
            decoder.decode(1, b"$-2"),
            Err(DecodeError::InvalidBulkLength(-2))
        );
        assert_eq!(
            decoder.decode(1, b"*-5"),
            Err(DecodeError::InvalidArrayLength(-5))
        );
        assert!(matches!(
            decoder.decode(1, b"$99999999999"),
            Err(DecodeError::MessageTooLarge { .. })
        ));
        assert_eq!(decoder.in_flight(), 0);
    }

    #[test]
    fn test_array_length_limit() {
        let decoder = Decoder::new();
        let header = format!("*{}", MAX_ARRAY_LEN + 1);
        assert_eq!(
            decoder.decode(1, header.as_bytes()),
            Err(DecodeError::ArrayTooLarge {
                len: MAX_ARRAY_LEN + 1,
                max: MAX_ARRAY_LEN
            })
        );
        assert!(matches!(
            decoder.decode(2, b"*9223372036854775807"),
            Err(DecodeError::ArrayTooLarge { .. })
        ));
        assert_eq!(decoder.in_flight(), 0);

        let header = format!("*{}", MAX_ARRAY_LEN);
        assert_eq!(
            decoder.decode(3, header.as_bytes()).unwrap(),
            Decoded::Incomplete
        );
    }

    #[test]
    fn test_nesting_limit() {
        let decoder = Decoder::new();
        for _ in 0..MAX_NESTING_DEPTH {
            assert_eq!(decoder.decode(1, b"*1").unwrap(), Decoded::Incomplete);
        }
        assert_eq!(
            decoder.decode(1, b"*1"),
            Err(DecodeError::NestingTooDeep(MAX_NESTING_DEPTH))
        );
        assert!(!decoder.is_pending(1));
    }

    #[test]
    fn test_roundtrip_through_encoder() {
        let values = vec![
            RespValue::simple_string("PONG"),
            RespValue::error("ERR wrong"),
            RespValue::integer(i64::MIN),
            RespValue::bulk_string(Bytes::from("bar")),
            RespValue::bulk_string(Bytes::new()),
            RespValue::null(),
            RespValue::array(vec![]),
            RespValue::array(vec![
                RespValue::bulk_string(Bytes::from("SET")),
                RespValue::array(vec![RespValue::null(), RespValue::integer(7)]),
                RespValue::simple_string("x"),
            ]),
        ];

        let decoder = Decoder::new();
        for (id, value) in values.into_iter().enumerate() {
            let wire = value.serialize();
            assert_eq!(decode_all(&decoder, id as RequestId, &wire), value);
        }
    }

    #[test]
    fn test_discard() {
        let decoder = Decoder::new();
        decoder.decode(3, b"*2").unwrap();
        assert!(decoder.discard(3));
        assert!(!decoder.discard(3));
    }
}
