//! Helper utilities for Sockrelay
//!
//! Timeout-bounded frame I/O used by the handshake, plus a few shared
//! constants and the accept-loop backoff.
//!
//! Both [`read_all`] and [`write_all`] run the whole transfer inside
//! [`tokio::time::timeout`]. When the deadline fires the in-flight future
//! is dropped, so a timed-out attempt is aborted rather than left running
//! against the connection.

use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Chunk size used by [`read_all`]; a shorter read ends the frame
pub const READ_CHUNK_SIZE: usize = 1024;

/// Default buffer size for relay copies
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Default per-call I/O timeout in seconds
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 10;

/// Read one frame of application data within `timeout`.
///
/// Reads in [`READ_CHUNK_SIZE`] chunks and accumulates them until a read
/// returns fewer bytes than the chunk size. End of stream before that
/// point is an [`io::ErrorKind::UnexpectedEof`] error, and an elapsed
/// deadline is an [`io::ErrorKind::TimedOut`] error. Partial data is
/// never returned.
pub async fn read_all<S>(conn: &mut S, timeout: Duration) -> io::Result<BytesMut>
where
    S: AsyncRead + Unpin + ?Sized,
{
    match tokio::time::timeout(timeout, read_frame(conn)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "timeout when reading on connection",
        )),
    }
}

async fn read_frame<S>(conn: &mut S) -> io::Result<BytesMut>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut frame = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = conn.read(&mut chunk).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed while reading",
            ));
        }
        frame.extend_from_slice(&chunk[..n]);
        if n < READ_CHUNK_SIZE {
            return Ok(frame);
        }
    }
}

/// Write the whole buffer within `timeout`.
///
/// Short writes are retried with the unwritten suffix only. A write that
/// accepts zero bytes is an [`io::ErrorKind::WriteZero`] error and an
/// elapsed deadline is an [`io::ErrorKind::TimedOut`] error.
pub async fn write_all<S>(conn: &mut S, data: &[u8], timeout: Duration) -> io::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    match tokio::time::timeout(timeout, write_frame(conn, data)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "timeout when writing to connection",
        )),
    }
}

async fn write_frame<S>(conn: &mut S, data: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0;
    while written < data.len() {
        let n = conn.write(&data[written..]).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "connection accepted no bytes",
            ));
        }
        written += n;
    }
    conn.flush().await
}

/// Backoff applied between failed accept attempts
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);

        std::cmp::min(delay, self.max_delay)
    }
}
