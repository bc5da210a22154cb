//! The line-oriented connection to the daemon.
//!
//! A [`Connection`] owns one duplex byte stream and exposes the
//! operations the encoder and parser need: write a line, write a raw
//! payload, flush, read a line. Every operation is bounded by the
//! connection's current deadline. Callers arm the deadline before each
//! operation and clear it once the exchange is over.

use std::future::Future;
use std::time::Duration;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
    ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::client::config::ClientConfig;
use crate::client::retry::retry_dial;
use crate::core::{FprotError, Result};

const LINE_END: &[u8] = b"\n";

/// A connection to the daemon over any duplex stream.
pub struct Connection<S = TcpStream> {
    reader: BufReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,
    command_timeout: Duration,
    deadline: Option<Instant>,
    broken: bool,
}

impl<S> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("command_timeout", &self.command_timeout)
            .field("deadline", &self.deadline)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Wraps an established stream.
    pub fn new(stream: S, command_timeout: Duration) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read),
            writer: BufWriter::new(write),
            command_timeout,
            deadline: None,
            broken: false,
        }
    }

    /// Returns the timeout used by [`Connection::arm`].
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Changes the timeout used by later calls to [`Connection::arm`].
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.command_timeout = timeout;
    }

    /// Returns the current deadline.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sets the deadline to one command timeout from now.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.command_timeout);
    }

    /// Removes the deadline.
    pub fn clear_deadline(&mut self) {
        self.deadline = None;
    }

    /// Returns `true` once a timeout or I/O failure has left the session
    /// in an unknown state.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Marks the session as unusable.
    pub fn mark_broken(&mut self) {
        if !self.broken {
            tracing::warn!("Connection marked broken");
        }
        self.broken = true;
    }

    /// Buffers one line followed by the terminator.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        tracing::debug!(line = %line, "Sending line");
        let writer = &mut self.writer;
        let result = bounded(self.deadline, self.command_timeout, "write", async move {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(LINE_END).await
        })
        .await;
        self.track(result)
    }

    /// Copies exactly `len` bytes from `reader`.
    ///
    /// A reader that runs dry early leaves the daemon waiting for the
    /// rest of the declared payload, so the connection is marked broken.
    pub async fn write_payload<R>(&mut self, reader: R, len: u64) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let writer = &mut self.writer;
        let result = bounded(self.deadline, self.command_timeout, "write", async move {
            let mut limited = reader.take(len);
            tokio::io::copy(&mut limited, writer).await
        })
        .await;
        let copied = self.track(result)?;

        if copied != len {
            self.mark_broken();
            return Err(FprotError::ContentLengthMismatch {
                expected: len,
                copied,
            });
        }
        Ok(())
    }

    /// Flushes buffered output to the stream.
    pub async fn flush(&mut self) -> Result<()> {
        let result = bounded(
            self.deadline,
            self.command_timeout,
            "flush",
            self.writer.flush(),
        )
        .await;
        self.track(result)
    }

    /// Reads one line without its terminator, or `None` at end of stream.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let result = bounded(
            self.deadline,
            self.command_timeout,
            "read",
            self.reader.read_until(b'\n', &mut buf),
        )
        .await;
        if self.track(result)? == 0 {
            return Ok(None);
        }

        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Flushes and shuts down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        let result = bounded(
            self.deadline,
            self.command_timeout,
            "shutdown",
            self.writer.shutdown(),
        )
        .await;
        self.track(result)
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e @ (FprotError::Timeout { .. } | FprotError::Io(_))) = &result {
            tracing::warn!(error = %e, "Connection failure");
            self.mark_broken();
        }
        result
    }
}

/// Runs `op`, failing with [`FprotError::Timeout`] if `deadline` passes first.
async fn bounded<T, F>(
    deadline: Option<Instant>,
    timeout: Duration,
    operation: &'static str,
    op: F,
) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    let result = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, op)
            .await
            .map_err(|_| FprotError::timeout(operation, timeout))?,
        None => op.await,
    };
    result.map_err(FprotError::Io)
}

/// Dials the configured address, retrying timed-out attempts.
///
/// Only IPv4 endpoints are tried.
pub async fn dial(config: &ClientConfig) -> Result<Connection<TcpStream>> {
    let stream = establish(config, connect_first_v4).await?;

    tracing::info!(
        address = %config.address,
        peer = ?stream.peer_addr().ok(),
        "Connected to daemon"
    );

    Ok(Connection::new(stream, config.command_timeout))
}

/// Runs `connect` under the dial policy, bounding each attempt by the
/// connect timeout.
async fn establish<'a, F, Fut, T>(config: &'a ClientConfig, connect: F) -> Result<T>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    let address = config.address.as_str();
    let policy = config.dial_policy();

    tracing::debug!(
        address = %address,
        max_attempts = policy.max_attempts(),
        "Dialing daemon"
    );

    retry_dial(&policy, address, || {
        within(config.connect_timeout, address, connect(address))
    })
    .await
}

async fn within<T, Fut>(timeout: Duration, address: &str, attempt: Fut) -> std::io::Result<T>
where
    Fut: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("dial {address}: i/o timeout"),
        )),
    }
}

async fn connect_first_v4(address: &str) -> std::io::Result<TcpStream> {
    let mut last_error = None;
    for addr in tokio::net::lookup_host(address).await? {
        if !addr.is_ipv4() {
            continue;
        }
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("no IPv4 address for {address}"),
        )
    }))
}
