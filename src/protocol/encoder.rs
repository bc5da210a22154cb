//! Request framing.
//!
//! Every request is a sequence of newline-terminated lines. A stream
//! upload line is followed directly by exactly `SIZE` raw bytes with no
//! further framing. A batch is wrapped between `QUEUE` and `SCAN`.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::client::connection::Connection;
use crate::core::{FprotError, Result, StreamSource};
use crate::protocol::command::Command;

/// Formats a command line without its terminator.
///
/// ```rust
/// use fprot::protocol::{format_command, Command};
///
/// assert_eq!(format_command(Command::ScanFile, &["/tmp/x"]), "SCAN FILE /tmp/x");
/// assert_eq!(format_command(Command::Help, &[]), "HELP");
/// ```
pub fn format_command(command: Command, args: &[&str]) -> String {
    let mut line = String::from(command.as_str());
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Formats the header line of a stream upload.
pub fn format_stream_header(name: &str, size: u64) -> String {
    let size = size.to_string();
    format_command(Command::ScanStream, &[name, "SIZE", size.as_str()])
}

/// Checks that an argument cannot break the line framing.
pub fn validate_argument(arg: &str) -> Result<()> {
    if arg.is_empty() {
        return Err(FprotError::invalid_argument("empty path"));
    }
    if arg.contains(['\n', '\r']) {
        return Err(FprotError::invalid_argument(format!(
            "path contains a line break: {arg:?}"
        )));
    }
    Ok(())
}

/// Sends a bare command line and flushes it.
pub async fn send_command<S>(conn: &mut Connection<S>, command: Command) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    conn.arm();
    conn.write_line(command.as_str()).await?;
    conn.arm();
    conn.flush().await
}

/// Sends `SCAN FILE` requests for `paths`, queued when there is more than one.
pub async fn send_file_scan<S>(conn: &mut Connection<S>, paths: &[String]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let queued = open_queue(conn, paths.len()).await?;
    for path in paths {
        conn.arm();
        conn.write_line(&format_command(Command::ScanFile, &[path.as_str()]))
            .await?;
    }
    close_queue(conn, queued).await
}

/// Uploads the files at `paths` with `SCAN STREAM`, queued when there is
/// more than one.
///
/// Every path is checked before the first line is written. A queued file
/// that disappears after that check leaves a half-written batch behind,
/// so the connection is marked broken.
pub async fn send_stream_scan<S>(conn: &mut Connection<S>, paths: &[String]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    for path in paths {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(FprotError::invalid_argument(format!(
                "not a regular file: {path}"
            )));
        }
    }

    let queued = open_queue(conn, paths.len()).await?;
    for path in paths {
        let mut source = match StreamSource::open(path).await {
            Ok(source) => source,
            Err(e) => {
                if queued {
                    conn.mark_broken();
                }
                return Err(e);
            }
        };
        send_source(conn, &mut source).await?;
    }
    close_queue(conn, queued).await
}

/// Writes one stream header and its payload without flushing.
pub async fn send_source<S>(conn: &mut Connection<S>, source: &mut StreamSource) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let size = source.content_length().await?;
    let header = format_stream_header(source.name(), size);

    tracing::debug!(name = %source.name(), size, "Uploading stream");

    conn.arm();
    conn.write_line(&header).await?;
    conn.arm();
    conn.write_payload(source.reader(), size).await
}

async fn open_queue<S>(conn: &mut Connection<S>, count: usize) -> Result<bool>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    if count < 2 {
        return Ok(false);
    }
    conn.arm();
    conn.write_line(Command::Queue.as_str()).await?;
    Ok(true)
}

async fn close_queue<S>(conn: &mut Connection<S>, queued: bool) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    if queued {
        conn.arm();
        conn.write_line(Command::ScanQueue.as_str()).await?;
    }
    conn.arm();
    conn.flush().await
}
