//! Live connections, keyed by the request id currently bound to them.
//!
//! A connection is bound to exactly one id at a time. The id is retired once
//! the reply for it has been written, and the connection is rebound to a
//! fresh id before the next read is requested.

use crate::connection::{FrameScanner, TransportError};
use crate::event::RequestId;
use bytes::Bytes;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Transport counters shared by the accept loop and the I/O handlers.
#[derive(Debug, Default)]
pub struct TransportStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently registered connections
    pub active_connections: AtomicU64,
    /// Total frames handed to the decoder
    pub frames_read: AtomicU64,
    /// Total bytes written to clients
    pub bytes_written: AtomicU64,
}

impl TransportStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn frame_read(&self) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Read side of a connection. The scanner is created on the first read.
#[derive(Debug)]
struct ReadSide {
    half: Option<OwnedReadHalf>,
    scanner: Option<FrameScanner<OwnedReadHalf>>,
}

impl ReadSide {
    fn scanner(
        &mut self,
        max_frame: usize,
    ) -> Result<&mut FrameScanner<OwnedReadHalf>, TransportError> {
        if self.scanner.is_none() {
            let half = self.half.take().ok_or(TransportError::ReaderUnavailable)?;
            self.scanner = Some(FrameScanner::new(half, max_frame));
        }
        self.scanner
            .as_mut()
            .ok_or(TransportError::ReaderUnavailable)
    }
}

/// One accepted client connection.
///
/// Reads and writes are serialized by separate locks, so a worker waiting
/// for input never blocks a reply going out.
#[derive(Debug)]
pub struct ConnectionEntry {
    peer: SocketAddr,
    reader: Mutex<ReadSide>,
    writer: Mutex<BufWriter<OwnedWriteHalf>>,
}

impl ConnectionEntry {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            peer,
            reader: Mutex::new(ReadSide {
                half: Some(read_half),
                scanner: None,
            }),
            writer: Mutex::new(BufWriter::new(write_half)),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Reads the next CRLF-delimited frame. `Ok(None)` on clean EOF.
    pub async fn read_frame(&self, max_frame: usize) -> Result<Option<Bytes>, TransportError> {
        let mut side = self.reader.lock().await;
        side.scanner(max_frame)?.next_frame().await
    }

    /// Writes `data` in full and flushes it.
    pub async fn write_all(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Flushes pending output and shuts down the write side.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

/// Maps request ids to live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: DashMap<RequestId, Arc<ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `entry` to `id`, returning any entry previously bound to it.
    pub fn insert(&self, id: RequestId, entry: Arc<ConnectionEntry>) -> Option<Arc<ConnectionEntry>> {
        self.entries.insert(id, entry)
    }

    pub fn get(&self, id: RequestId) -> Option<Arc<ConnectionEntry>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: RequestId) -> Option<Arc<ConnectionEntry>> {
        self.entries.remove(&id).map(|(_, entry)| entry)
    }

    /// Moves the connection bound to `old` over to `new`.
    ///
    /// Returns false if nothing is bound to `old`, which happens when the
    /// connection was closed while the write was in flight.
    pub fn rebind(&self, old: RequestId, new: RequestId) -> bool {
        match self.entries.remove(&old) {
            Some((_, entry)) => {
                self.entries.insert(new, entry);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
