//! Response parsing.
//!
//! Scan responses follow one line grammar:
//!
//! ```text
//! <statuscode> <<status>[: <signature>]> [<filename>][-><archive-item>]
//! ```
//!
//! The `HELP` handshake uses its own single-line grammar. Any line that
//! fails its grammar aborts the whole exchange; responses already parsed
//! for that exchange are dropped.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::client::connection::Connection;
use crate::core::{FprotError, Info, Response, Result, StatusCode};

static RESPONSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<code>[0-9]+)\s<(?P<status>[^:]+)(?::\s+(?P<signature>.+?))?>\s?(?P<filename>.+?)?(?:->(?P<archive>.*))?$",
    )
    .expect("response pattern should compile")
});

static HELP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^FPSCAND:(?P<version>\S+)\s*ENGINE:(?P<engine>\S+)\s*PROTOCOL:(?P<protocol>\S+)\s*SIGNATURE:(?P<signature>\S+)\s*UPTIME:(?P<uptime>\S+)$",
    )
    .expect("help pattern should compile")
});

/// Parses one scan response line.
///
/// ```rust
/// use fprot::protocol::parse_response_line;
///
/// let response = parse_response_line("1 <infected: EICAR_Test_File> /tmp/eicar.txt").unwrap();
/// assert!(response.infected);
/// assert_eq!(response.signature(), "EICAR_Test_File");
/// ```
pub fn parse_response_line(line: &str) -> Result<Response> {
    let caps = RESPONSE_RE
        .captures(line)
        .ok_or_else(|| FprotError::malformed(line))?;

    let token = &caps["code"];
    let bits: u64 = token.parse().map_err(|_| FprotError::InvalidStatusCode {
        token: token.to_string(),
    })?;
    let status_code = StatusCode::from_bits(bits);

    let group = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

    Ok(Response {
        filename: group("filename"),
        archive_item: group("archive"),
        signature: group("signature"),
        status: caps["status"].to_string(),
        status_code,
        infected: status_code.is_infected(),
        raw: line.to_string(),
    })
}

/// Parses the `HELP` handshake line.
pub fn parse_info_line(line: &str) -> Result<Info> {
    let caps = HELP_RE
        .captures(line)
        .ok_or_else(|| FprotError::InvalidServerInfo {
            line: line.to_string(),
        })?;

    Ok(Info {
        version: caps["version"].to_string(),
        engine: caps["engine"].to_string(),
        protocol: caps["protocol"].to_string(),
        signature: caps["signature"].to_string(),
        uptime: caps["uptime"].to_string(),
    })
}

impl FromStr for Response {
    type Err = FprotError;

    fn from_str(s: &str) -> Result<Self> {
        parse_response_line(s)
    }
}

impl FromStr for Info {
    type Err = FprotError;

    fn from_str(s: &str) -> Result<Self> {
        parse_info_line(s)
    }
}

/// The ordered responses of one exchange and its first soft error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdicts {
    responses: Vec<Response>,
    first_error: Option<usize>,
}

impl Verdicts {
    /// Collects responses, locating the first one with an error bit set.
    pub fn new(responses: Vec<Response>) -> Self {
        let first_error = responses.iter().position(Response::is_error);
        Self {
            responses,
            first_error,
        }
    }

    /// Returns the responses in submission order.
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// Returns the first response that reported a soft error.
    pub fn first_error(&self) -> Option<&Response> {
        self.first_error.map(|i| &self.responses[i])
    }

    /// Returns the number of responses.
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Returns `true` if there are no responses.
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Returns all responses, or [`FprotError::ScanFailed`] carrying them
    /// when any item reported an error.
    pub fn into_result(self) -> Result<Vec<Response>> {
        match self.first_error {
            None => Ok(self.responses),
            Some(i) => {
                let first = &self.responses[i];
                Err(FprotError::ScanFailed {
                    status: first.status.clone(),
                    code: first.status_code,
                    responses: self.responses,
                })
            }
        }
    }
}

impl IntoIterator for Verdicts {
    type Item = Response;
    type IntoIter = std::vec::IntoIter<Response>;

    fn into_iter(self) -> Self::IntoIter {
        self.responses.into_iter()
    }
}

/// Reads up to `expected` response lines.
///
/// Stops early if the daemon closes the connection. Closing before the
/// first line is an error.
pub async fn read_responses<S>(conn: &mut Connection<S>, expected: usize) -> Result<Verdicts>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let mut responses = Vec::with_capacity(expected);

    while responses.len() < expected {
        conn.arm();
        let Some(line) = conn.read_line().await? else {
            conn.mark_broken();
            break;
        };
        tracing::debug!(line = %line, "Response line");
        match parse_response_line(&line) {
            Ok(response) => responses.push(response),
            Err(e) => {
                // unread lines of the batch would answer the next command
                conn.mark_broken();
                return Err(e);
            }
        }
    }

    if responses.is_empty() && expected > 0 {
        return Err(FprotError::ConnectionClosed);
    }
    if responses.len() < expected {
        tracing::warn!(
            expected,
            received = responses.len(),
            "Daemon closed the connection before answering every item"
        );
    }

    Ok(Verdicts::new(responses))
}

/// Reads the `HELP` handshake line and its blank terminator.
pub async fn read_info<S>(conn: &mut Connection<S>) -> Result<Info>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    conn.arm();
    let Some(line) = conn.read_line().await? else {
        conn.mark_broken();
        return Err(FprotError::ConnectionClosed);
    };
    let info = parse_info_line(&line).inspect_err(|_| conn.mark_broken())?;

    // terminator
    conn.arm();
    conn.read_line().await?;

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    async fn connection_with(input: &[u8]) -> Connection<tokio::io::DuplexStream> {
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        server.write_all(input).await.unwrap();
        drop(server);
        Connection::new(client, Duration::from_secs(5))
    }

    #[test]
    fn test_clean_line() {
        let r = parse_response_line("0 <OK> /tmp/x").unwrap();
        assert_eq!(r.filename.as_deref(), Some("/tmp/x"));
        assert_eq!(r.status, "OK");
        assert_eq!(r.status_code, StatusCode::NO_MATCH);
        assert!(!r.infected);
        assert_eq!(r.signature(), "");
        assert!(r.signature.is_none());
        assert!(r.archive_item.is_none());
        assert_eq!(r.raw, "0 <OK> /tmp/x");
    }

    #[test]
    fn test_infected_line() {
        let r = parse_response_line("3 <infected: EICAR_Test_File> /tmp/eicar.txt").unwrap();
        assert_eq!(r.status, "infected");
        assert_eq!(r.signature(), "EICAR_Test_File");
        assert_eq!(r.filename.as_deref(), Some("/tmp/eicar.txt"));
        assert_eq!(r.status_code.bits(), 3);
        assert!(r.infected);
    }

    #[test]
    fn test_archive_member() {
        let r = parse_response_line(
            "1 <infected: EICAR_Test_File> /var/spool/testfiles/eicar.tar.bz2->eicar.com",
        )
        .unwrap();
        assert_eq!(
            r.filename.as_deref(),
            Some("/var/spool/testfiles/eicar.tar.bz2")
        );
        assert_eq!(r.archive_item.as_deref(), Some("eicar.com"));

        let r = parse_response_line("2 <contains infected objects: W32/Heur> /tmp/a.zip->docs/x.exe")
            .unwrap();
        assert_eq!(r.status, "contains infected objects");
        assert_eq!(r.signature(), "W32/Heur");
        assert_eq!(r.filename.as_deref(), Some("/tmp/a.zip"));
        assert_eq!(r.archive_item.as_deref(), Some("docs/x.exe"));
        assert!(r.infected);
    }

    #[test]
    fn test_empty_archive_member_is_present() {
        let r = parse_response_line("1 <infected: X> /tmp/a.zip->").unwrap();
        assert_eq!(r.archive_item.as_deref(), Some(""));
    }

    #[test]
    fn test_status_without_signature_runs_to_last_angle_bracket() {
        let r = parse_response_line("0 <clean> /tmp/a>b").unwrap();
        assert_eq!(r.status, "clean> /tmp/a");
        assert_eq!(r.filename.as_deref(), Some("b"));
        assert!(r.signature.is_none());

        let r = parse_response_line("1 <infected: EICAR> /tmp/a>b").unwrap();
        assert_eq!(r.status, "infected");
        assert_eq!(r.filename.as_deref(), Some("/tmp/a>b"));
    }

    #[test]
    fn test_wide_status_code() {
        let r = parse_response_line("4294967296 <clean> /x").unwrap();
        assert_eq!(r.status_code.bits(), 1 << 32);
        assert!(r.is_clean());
    }

    #[test]
    fn test_missing_filename() {
        let r = parse_response_line("0 <clean>").unwrap();
        assert!(r.filename.is_none());
    }

    #[test]
    fn test_soft_error_line() {
        let r = parse_response_line("64 <skipped> /tmp/big.iso").unwrap();
        assert!(r.is_error());
        assert!(!r.infected);
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(
            parse_response_line("garbage"),
            Err(FprotError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_response_line("<clean> /tmp/x"),
            Err(FprotError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_response_line("99999999999999999999 <clean> /tmp/x"),
            Err(FprotError::InvalidStatusCode { .. })
        ));
    }

    #[test]
    fn test_info_line() {
        let info = parse_info_line("FPSCAND:1.0 ENGINE:4.0 PROTOCOL:1 SIGNATURE:100 UPTIME:3600")
            .unwrap();
        assert_eq!(
            info,
            Info {
                version: "1.0".into(),
                engine: "4.0".into(),
                protocol: "1".into(),
                signature: "100".into(),
                uptime: "3600".into(),
            }
        );
        assert!(matches!(
            "hello".parse::<Info>(),
            Err(FprotError::InvalidServerInfo { .. })
        ));
    }

    #[test]
    fn test_verdicts_first_error() {
        let verdicts = Verdicts::new(vec![
            "0 <clean> /a".parse().unwrap(),
            "4 <interrupted> /b".parse().unwrap(),
            "8 <restricted> /c".parse().unwrap(),
        ]);
        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts.first_error().unwrap().status, "interrupted");

        match verdicts.into_result() {
            Err(FprotError::ScanFailed {
                status,
                code,
                responses,
            }) => {
                assert_eq!(status, "interrupted");
                assert_eq!(code, StatusCode::USER_ERROR);
                assert_eq!(responses.len(), 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_verdicts_infected_is_not_an_error() {
        let verdicts = Verdicts::new(vec!["1 <infected: X> /a".parse().unwrap()]);
        assert!(verdicts.first_error().is_none());
        assert_eq!(verdicts.into_result().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_responses_in_order() {
        let mut conn = connection_with(b"0 <clean> /a\r\n1 <infected: X> /b\n0 <clean> /c\n").await;
        let verdicts = read_responses(&mut conn, 3).await.unwrap();
        let names: Vec<_> = verdicts
            .responses()
            .iter()
            .map(|r| r.filename.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["/a", "/b", "/c"]);
        assert!(verdicts.responses()[1].infected);
    }

    #[tokio::test]
    async fn test_read_responses_stops_at_expected() {
        let mut conn = connection_with(b"0 <clean> /a\n0 <clean> /b\n").await;
        let verdicts = read_responses(&mut conn, 1).await.unwrap();
        assert_eq!(verdicts.len(), 1);
    }

    #[tokio::test]
    async fn test_read_responses_short_read() {
        let mut conn = connection_with(b"0 <clean> /a\n").await;
        let verdicts = read_responses(&mut conn, 3).await.unwrap();
        assert_eq!(verdicts.len(), 1);
        assert!(conn.is_broken());

        let mut conn = connection_with(b"").await;
        assert!(matches!(
            read_responses(&mut conn, 1).await,
            Err(FprotError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_responses_malformed_aborts() {
        let mut conn = connection_with(b"0 <clean> /a\nnot a response\n0 <clean> /c\n").await;
        assert!(matches!(
            read_responses(&mut conn, 3).await,
            Err(FprotError::MalformedResponse { .. })
        ));
        assert!(conn.is_broken());
    }

    #[tokio::test]
    async fn test_read_info_consumes_terminator() {
        let mut conn = connection_with(
            b"FPSCAND:6.7.10.6267 ENGINE:4.6.5.141 PROTOCOL:4.1 SIGNATURE:201810160753a8 UPTIME:3d\n\n0 <clean> /a\n",
        )
        .await;
        let info = read_info(&mut conn).await.unwrap();
        assert_eq!(info.version, "6.7.10.6267");
        assert_eq!(info.uptime, "3d");

        let next = read_responses(&mut conn, 1).await.unwrap();
        assert_eq!(next.responses()[0].filename.as_deref(), Some("/a"));
    }
}
