//! Wire Protocol
//!
//! A compact, length-prefixed text protocol with five value kinds: simple
//! strings, errors, integers, bulk strings and (nested) arrays.
//!
//! ## Modules
//!
//! - `types`: [`RespValue`] and its encoder
//! - `decoder`: the resumable, frame-at-a-time [`Decoder`]
//! - `handler`: scheduler handlers for decoding and formatting
//!
//! ## Example
//!
//! ```
//! use eventkv::protocol::{Decoded, Decoder, RespValue};
//! use bytes::Bytes;
//!
//! let decoder = Decoder::new();
//! assert_eq!(decoder.decode(1, b"*1").unwrap(), Decoded::Incomplete);
//! assert_eq!(decoder.decode(1, b"$4").unwrap(), Decoded::Incomplete);
//!
//! let ping = RespValue::array(vec![RespValue::bulk_string(Bytes::from("PING"))]);
//! assert_eq!(decoder.decode(1, b"PING").unwrap(), Decoded::Complete(ping.clone()));
//! assert_eq!(ping.serialize(), b"*1\r\n$4\r\nPING\r\n");
//! ```

pub mod decoder;
pub mod handler;
pub mod types;

pub use decoder::{
    DecodeError, DecodeState, Decoded, Decoder, MAX_ARRAY_LEN, MAX_BULK_SIZE, MAX_NESTING_DEPTH,
};
pub use handler::{DecodeHandler, FormatHandler};
pub use types::RespValue;
