//! The public client.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::client::config::ClientConfig;
use crate::client::connection::{self, Connection};
use crate::core::{
    FileEnumerator, FprotError, Info, Response, Result, StreamSource, WalkDirEnumerator,
};
use crate::protocol::{encoder, parser, Command, Verdicts};

/// A client for one session with the scanning daemon.
///
/// The connection is dialed lazily on first use and reused by every later
/// call until [`Client::close`]. Calls on one client are serialized: the
/// protocol allows a single outstanding exchange per connection, so an
/// exchange holds the connection for its whole duration. Use one client
/// per task to scan in parallel.
///
/// After a timeout or I/O failure the session is left in an unknown state
/// and every call returns [`FprotError::ConnectionBroken`] until the
/// client is closed. Nothing is retried automatically once connected.
///
/// # Example
///
/// ```rust,no_run
/// use fprot::Client;
///
/// # async fn run() -> fprot::Result<()> {
/// let client = Client::new("127.0.0.1:10200")?;
/// for response in client.scan_file("/var/spool/testfiles/eicar.txt").await? {
///     println!("{:?} infected={}", response.filename, response.infected);
/// }
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
    enumerator: Arc<dyn FileEnumerator>,
    conn: Mutex<Option<Connection<TcpStream>>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("enumerator", &self.enumerator)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client for `address` (`host:port`) with default settings.
    ///
    /// An empty address selects `127.0.0.1:10200`. Fails without any
    /// network activity if the address is not of the form `host:port`.
    pub fn new(address: &str) -> Result<Self> {
        Self::with_config(ClientConfig::new(address))
    }

    /// Creates a client from a full configuration.
    ///
    /// An empty address selects `127.0.0.1:10200`.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let config = config.resolved();
        config.validate()?;
        Ok(Self {
            config,
            enumerator: Arc::new(WalkDirEnumerator::new()),
            conn: Mutex::new(None),
        })
    }

    /// Replaces the directory enumerator used by the directory scans.
    pub fn with_enumerator(mut self, enumerator: impl FileEnumerator + 'static) -> Self {
        self.enumerator = Arc::new(enumerator);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the daemon address.
    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// Sets the dial timeout. Takes effect on the next dial.
    pub fn set_conn_timeout(&mut self, timeout: Duration) {
        self.config.connect_timeout = timeout;
    }

    /// Sets the per-operation timeout. Applies to a live connection from
    /// the next call on, without redialing.
    pub fn set_cmd_timeout(&mut self, timeout: Duration) {
        self.config.command_timeout = timeout;
    }

    /// Sets how many times a timed-out dial is retried.
    pub fn set_conn_retries(&mut self, retries: u32) {
        self.config.connect_retries = retries;
    }

    /// Sets the pause between dial retries.
    pub fn set_conn_sleep(&mut self, sleep: Duration) {
        self.config.connect_sleep = sleep;
    }

    /// Returns `true` if a connection is currently held.
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Queries the daemon's version information with `HELP`.
    pub async fn info(&self) -> Result<Info> {
        let mut guard = self.connection().await?;
        let conn = &mut *guard;
        let result = query_info(conn).await;
        conn.clear_deadline();

        if let Ok(info) = &result {
            tracing::debug!(
                version = %info.version,
                engine = %info.engine,
                signature = %info.signature,
                "Server info"
            );
        }
        result
    }

    /// Sends `QUIT` and releases the connection.
    ///
    /// The `QUIT` is best effort; a broken session is closed without it.
    /// A later call dials a new connection.
    pub async fn close(&self) -> Result<()> {
        let Some(mut conn) = self.conn.lock().await.take() else {
            return Ok(());
        };

        let mut result = Ok(());
        if !conn.is_broken() {
            conn.set_command_timeout(self.config.command_timeout);
            result = encoder::send_command(&mut conn, Command::Quit).await;
            if result.is_ok() {
                conn.arm();
                // the daemon may already have closed its side
                let _ = conn.shutdown().await;
            }
        }

        tracing::info!(address = %self.config.address, "Connection closed");
        result
    }

    /// Scans one file by path. The daemon must be able to read the path.
    pub async fn scan_file(&self, path: impl AsRef<Path>) -> Result<Vec<Response>> {
        self.scan_files(&[path]).await
    }

    /// Scans files by path, queued in one batch when there are several.
    ///
    /// Returns one response per path in submission order. If any item
    /// reports an error status, fails with [`FprotError::ScanFailed`],
    /// which still carries every response.
    pub async fn scan_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Response>> {
        let paths = wire_paths(paths)?;
        self.run_scan(Command::ScanFile, &paths).await
    }

    /// Uploads files and scans their contents.
    ///
    /// Use this when the daemon has no access to the client's filesystem.
    pub async fn scan_stream<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Response>> {
        let paths = wire_paths(paths)?;
        self.run_scan(Command::ScanStream, &paths).await
    }

    /// Uploads the contents of `source` and scans it.
    ///
    /// Fails with [`FprotError::ContentLengthUnknown`] before any network
    /// activity if the source cannot report its length.
    pub async fn scan_reader(&self, mut source: StreamSource) -> Result<Vec<Response>> {
        source.content_length().await?;
        encoder::validate_argument(source.name())?;

        let mut guard = self.connection().await?;
        let conn = &mut *guard;
        let result = upload(conn, &mut source).await;
        conn.clear_deadline();

        finish(Command::ScanStream, result)
    }

    /// Scans every regular file under `dir` by path.
    pub async fn scan_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<Response>> {
        let files = self.enumerator.list_files(dir.as_ref()).await?;
        self.scan_files(&files).await
    }

    /// Uploads every regular file under `dir` and scans the contents.
    pub async fn scan_dir_stream(&self, dir: impl AsRef<Path>) -> Result<Vec<Response>> {
        let files = self.enumerator.list_files(dir.as_ref()).await?;
        self.scan_stream(&files).await
    }

    async fn run_scan(&self, command: Command, paths: &[String]) -> Result<Vec<Response>> {
        let mut guard = self.connection().await?;
        let conn = &mut *guard;
        let result = scan_paths(conn, command, paths).await;
        conn.clear_deadline();

        finish(command, result)
    }

    /// Locks the session, dialing first if there is no connection.
    async fn connection(&self) -> Result<MappedMutexGuard<'_, Connection<TcpStream>>> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(connection::dial(&self.config).await?);
        }

        let mut conn = MutexGuard::try_map(guard, |slot| slot.as_mut())
            .map_err(|_| FprotError::ConnectionClosed)?;
        if conn.is_broken() {
            return Err(FprotError::ConnectionBroken);
        }
        conn.set_command_timeout(self.config.command_timeout);
        Ok(conn)
    }
}

async fn query_info(conn: &mut Connection<TcpStream>) -> Result<Info> {
    encoder::send_command(conn, Command::Help).await?;
    parser::read_info(conn).await
}

async fn upload(conn: &mut Connection<TcpStream>, source: &mut StreamSource) -> Result<Verdicts> {
    encoder::send_source(conn, source).await?;
    conn.arm();
    conn.flush().await?;
    parser::read_responses(conn, 1).await
}

async fn scan_paths(
    conn: &mut Connection<TcpStream>,
    command: Command,
    paths: &[String],
) -> Result<Verdicts> {
    match command {
        Command::ScanStream => encoder::send_stream_scan(conn, paths).await?,
        _ => encoder::send_file_scan(conn, paths).await?,
    }
    parser::read_responses(conn, paths.len()).await
}

fn finish(command: Command, result: Result<Verdicts>) -> Result<Vec<Response>> {
    let verdicts = result?;
    tracing::info!(
        command = %command,
        items = verdicts.len(),
        infected = verdicts.responses().iter().filter(|r| r.infected).count(),
        first_error = ?verdicts.first_error().map(|r| r.status.as_str()),
        "Scan completed"
    );
    verdicts.into_result()
}

fn wire_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<String>> {
    if paths.is_empty() {
        return Err(FprotError::invalid_argument(
            "Atleast one path to scan is required",
        ));
    }

    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let text = path.to_str().ok_or_else(|| {
                FprotError::invalid_argument(format!("path is not valid UTF-8: {}", path.display()))
            })?;
            encoder::validate_argument(text)?;
            Ok(text.to_string())
        })
        .collect()
}
