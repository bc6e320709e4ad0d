// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::http::chunked::encode_chunk;
use crate::net::buffer::Buffer;

#[derive(Debug, Error)]
pub enum ConnError {
    #[error("Connection closed")]
    Closed,
    #[error("operation canceled")]
    Cancelled,
    #[error("read() called on connection that is not registered to receive read events")]
    NotReading,
    #[error("connection is already registered to receive read events")]
    AlreadyReading,
    #[error("buffer passed to read() is already full")]
    Overflow,
    #[error("another task is already reading this connection")]
    ReadBusy,
    #[error("another task is already writing this connection")]
    WriteBusy,
    #[error("invalid address {0}:{1}")]
    BadAddr(String, u16),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Successful read outcome: more content landed in the buffer, or the peer
/// shut the stream down cleanly (after which the connection is closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// New high-water mark of the read buffer.
    Data(usize),
    Eof,
}

enum IoWait<T> {
    Done(std::io::Result<T>),
    TimedOut,
    Cancelled,
}

/// Runs one socket operation against the connection's cancellation token
/// and an optional deadline. `None` or a zero timeout waits indefinitely.
async fn guarded<F, T>(fut: F, timeout: Option<Duration>, cancel: &CancellationToken) -> IoWait<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout {
        Some(t) if !t.is_zero() => tokio::select! {
            _ = cancel.cancelled() => IoWait::Cancelled,
            res = tokio::time::timeout(t, fut) => match res {
                Ok(io) => IoWait::Done(io),
                Err(_) => IoWait::TimedOut,
            },
        },
        _ => tokio::select! {
            _ = cancel.cancelled() => IoWait::Cancelled,
            io = fut => IoWait::Done(io),
        },
    }
}

/// A full-duplex TCP stream serving one handler task.
///
/// The read and write paths are independent; each admits at most one
/// in-flight operation, and a second concurrent caller is rejected
/// synchronously. `close` is idempotent and makes every pending operation
/// resolve exactly once with a cancellation error.
#[derive(Debug)]
pub struct Connection {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    peer: Option<SocketAddr>,
    reading: AtomicBool,
    cancel: CancellationToken,
}

impl Connection {
    /// Wraps an accepted (or connected) stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        let peer = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            peer,
            reading: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Client-side connect with an optional deadline.
    pub async fn connect(
        ip: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<Self, ConnError> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| ConnError::BadAddr(ip.to_string(), port))?;
        if port == 0 {
            return Err(ConnError::BadAddr(ip.to_string(), port));
        }
        let fut = TcpStream::connect((addr, port));
        let stream = match timeout {
            Some(t) if !t.is_zero() => tokio::time::timeout(t, fut)
                .await
                .map_err(|_| ConnError::Cancelled)??,
            _ => fut.await?,
        };
        Ok(Self::from_stream(stream))
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Registers the connection for reads. Calling twice is a handler
    /// error, as is arming a closed connection.
    pub fn start_reading(&self) -> Result<(), ConnError> {
        if self.is_closed() {
            return Err(ConnError::Closed);
        }
        if self.reading.swap(true, Ordering::SeqCst) {
            return Err(ConnError::AlreadyReading);
        }
        Ok(())
    }

    /// Awaits at least one more byte appended to `buf`, an EOF, an error,
    /// or the optional timeout. Timeouts and errors close the connection.
    /// The buffer is the caller's and fills incrementally across calls.
    pub async fn read(
        &self,
        buf: &mut Buffer,
        timeout: Option<Duration>,
    ) -> Result<ReadStatus, ConnError> {
        if self.is_closed() {
            return Err(ConnError::Closed);
        }
        if !self.reading.load(Ordering::SeqCst) {
            self.close();
            return Err(ConnError::NotReading);
        }
        let mut reader = self.reader.try_lock().map_err(|_| ConnError::ReadBusy)?;
        if buf.remaining_capacity() == 0 {
            self.close();
            return Err(ConnError::Overflow);
        }

        let outcome = guarded(reader.read(buf.fill_slice()), timeout, &self.cancel).await;
        match outcome {
            IoWait::Done(Ok(0)) => {
                self.close();
                Ok(ReadStatus::Eof)
            }
            IoWait::Done(Ok(n)) => {
                buf.advance_end(n);
                Ok(ReadStatus::Data(buf.len()))
            }
            IoWait::Done(Err(e)) => {
                self.close();
                Err(ConnError::Io(e))
            }
            IoWait::TimedOut => {
                self.close();
                Err(ConnError::Cancelled)
            }
            IoWait::Cancelled => Err(ConnError::Cancelled),
        }
    }

    /// Writes all of `data`, returning the byte count. An empty write
    /// succeeds without touching the socket. Timeouts and errors close the
    /// connection.
    pub async fn write(&self, data: &[u8], timeout: Option<Duration>) -> Result<usize, ConnError> {
        if self.is_closed() {
            return Err(ConnError::Closed);
        }
        if data.is_empty() {
            return Ok(0);
        }
        let mut writer = self.writer.try_lock().map_err(|_| ConnError::WriteBusy)?;

        let outcome = guarded(writer.write_all(data), timeout, &self.cancel).await;
        match outcome {
            IoWait::Done(Ok(())) => Ok(data.len()),
            IoWait::Done(Err(e)) => {
                self.close();
                Err(ConnError::Io(e))
            }
            IoWait::TimedOut => {
                self.close();
                Err(ConnError::Cancelled)
            }
            IoWait::Cancelled => Err(ConnError::Cancelled),
        }
    }

    /// Writes one chunked-transfer framed body piece; an empty payload
    /// emits the stream terminator.
    pub async fn write_chunk(
        &self,
        payload: &[u8],
        timeout: Option<Duration>,
    ) -> Result<usize, ConnError> {
        if self.is_closed() {
            return Err(ConnError::Closed);
        }
        let framed = encode_chunk(payload);
        self.write(&framed, timeout).await
    }

    /// Idempotent. Pending reads and writes resolve with a cancellation
    /// error; all later operations fail with `Closed`. The socket itself
    /// is released when the connection is dropped.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            debug!(peer = ?self.peer, "closing connection");
            self.cancel.cancel();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
