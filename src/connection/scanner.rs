//! CRLF frame scanner.
//!
//! TCP is a stream protocol: a single read may carry half a frame or several
//! pipelined commands. The scanner buffers whatever arrives and hands out one
//! CRLF-terminated frame per call, keeping the remainder for the next call.

use crate::connection::TransportError;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default upper bound on a single frame (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Splits a byte stream into CRLF-delimited frames.
#[derive(Debug)]
pub struct FrameScanner<R> {
    reader: R,
    buffer: BytesMut,
    /// Bytes of `buffer` already searched without finding a CRLF
    searched: usize,
    max_frame: usize,
}

impl<R: AsyncRead + Unpin> FrameScanner<R> {
    pub fn new(reader: R, max_frame: usize) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            searched: 0,
            max_frame,
        }
    }

    /// Returns the next frame without its CRLF.
    ///
    /// `Ok(None)` means the peer closed the stream cleanly. If it closes
    /// after sending an unterminated tail, that tail is returned first.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            if let Some(pos) = self.find_crlf() {
                if pos > self.max_frame {
                    return Err(TransportError::FrameTooLarge { max: self.max_frame });
                }
                let frame = self.buffer.split_to(pos).freeze();
                self.buffer.advance(2);
                self.searched = 0;
                return Ok(Some(frame));
            }

            if self.buffer.len() > self.max_frame + 1 {
                return Err(TransportError::FrameTooLarge { max: self.max_frame });
            }

            if self.buffer.capacity() - self.buffer.len() < 1024 {
                self.buffer.reserve(INITIAL_BUFFER_SIZE);
            }

            let n = self.reader.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                self.searched = 0;
                return Ok(Some(self.buffer.split().freeze()));
            }
        }
    }

    /// Bytes received but not yet returned as frames.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Finds the position of `\r\n`, resuming where the last search stopped.
    fn find_crlf(&mut self) -> Option<usize> {
        let start = self.searched.saturating_sub(1);
        match self.buffer[start..].windows(2).position(|w| w == b"\r\n") {
            Some(offset) => Some(start + offset),
            None => {
                self.searched = self.buffer.len();
                None
            }
        }
    }
}
