//! Error types for the fprot client.
//!
//! Every failure surfaces as a typed [`FprotError`]. Nothing is retried
//! automatically except a dial attempt that timed out.

use std::time::Duration;
use thiserror::Error;

use crate::core::types::{Response, StatusCode};

/// The error type for every client operation.
#[derive(Debug, Error)]
pub enum FprotError {
    /// The client configuration is invalid (for example a malformed address).
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A call was made with arguments that can never succeed.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the bad argument.
        message: String,
    },

    /// A directory scan was requested for a path that is not a directory.
    #[error("the path: {path} is not a directory")]
    NotADirectory {
        /// The offending path.
        path: String,
    },

    /// A stream source could not report its total length up front.
    #[error("the content length could not be determined")]
    ContentLengthUnknown,

    /// A stream source produced fewer bytes than were declared to the daemon.
    #[error("declared {expected} bytes but the source yielded {copied}")]
    ContentLengthMismatch {
        /// Length announced in the `SIZE` token.
        expected: u64,
        /// Bytes actually written.
        copied: u64,
    },

    /// The daemon could not be reached.
    #[error("connection to '{address}' failed after {attempts} attempt(s): {message}")]
    ConnectionFailed {
        /// Address that was dialed.
        address: String,
        /// Number of dial attempts made.
        attempts: u32,
        /// Last error observed.
        message: String,
    },

    /// A read or write missed its deadline.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        /// What was in progress when the deadline passed.
        operation: &'static str,
        /// The command timeout that applied.
        elapsed: Duration,
    },

    /// The daemon closed the connection before sending any response line.
    #[error("connection closed by the daemon before a response was read")]
    ConnectionClosed,

    /// An earlier failure left the session in an unknown state.
    #[error("connection is in an indeterminate state; close the client and reconnect")]
    ConnectionBroken,

    /// A response line did not match the response grammar.
    #[error("invalid server response: {line}")]
    MalformedResponse {
        /// The raw line.
        line: String,
    },

    /// A status code token was not a valid integer.
    #[error("invalid status code: {token}")]
    InvalidStatusCode {
        /// The token that failed to parse.
        token: String,
    },

    /// The `HELP` handshake line did not match its grammar.
    #[error("invalid server info response: {line}")]
    InvalidServerInfo {
        /// The raw line.
        line: String,
    },

    /// At least one scanned item reported an error status.
    ///
    /// Every response parsed during the exchange is kept so the caller can
    /// see which items triggered it.
    #[error("ERROR: {status}")]
    ScanFailed {
        /// Status phrase of the first failing item.
        status: String,
        /// Status code of the first failing item.
        code: StatusCode,
        /// All responses of the exchange, in submission order.
        responses: Vec<Response>,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FprotError {
    /// Returns `true` if repeating the call on a fresh client may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::ConnectionFailed { .. }
                | Self::ConnectionClosed
                | Self::ConnectionBroken
        )
    }

    /// Returns `true` if the daemon sent something the client could not parse.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedResponse { .. }
                | Self::InvalidStatusCode { .. }
                | Self::InvalidServerInfo { .. }
        )
    }

    /// Returns the responses carried by a [`FprotError::ScanFailed`].
    pub fn responses(&self) -> Option<&[Response]> {
        match self {
            Self::ScanFailed { responses, .. } => Some(responses),
            _ => None,
        }
    }

    /// Consumes the error, returning the carried responses if any.
    pub fn into_responses(self) -> Option<Vec<Response>> {
        match self {
            Self::ScanFailed { responses, .. } => Some(responses),
            _ => None,
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an `InvalidArgument` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(operation: &'static str, elapsed: Duration) -> Self {
        Self::Timeout { operation, elapsed }
    }

    /// Creates a `MalformedResponse` error.
    pub fn malformed(line: impl Into<String>) -> Self {
        Self::MalformedResponse { line: line.into() }
    }
}

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, FprotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable() {
        assert!(FprotError::timeout("read", Duration::from_secs(60)).is_recoverable());
        assert!(FprotError::ConnectionBroken.is_recoverable());
        assert!(!FprotError::malformed("garbage").is_recoverable());
        assert!(!FprotError::configuration("bad").is_recoverable());
    }

    #[test]
    fn test_protocol_error() {
        assert!(FprotError::malformed("x").is_protocol_error());
        assert!(FprotError::InvalidStatusCode { token: "9x".into() }.is_protocol_error());
        assert!(!FprotError::ContentLengthUnknown.is_protocol_error());
    }

    #[test]
    fn test_scan_failed_keeps_responses() {
        let response: Response = "4 <interrupted> /tmp/a".parse().unwrap();
        let err = FprotError::ScanFailed {
            status: response.status.clone(),
            code: response.status_code,
            responses: vec![response],
        };
        assert_eq!(err.to_string(), "ERROR: interrupted");
        assert_eq!(err.responses().map(<[_]>::len), Some(1));
        assert_eq!(err.into_responses().unwrap()[0].filename.as_deref(), Some("/tmp/a"));
    }

    #[test]
    fn test_display() {
        let err = FprotError::ContentLengthMismatch {
            expected: 100,
            copied: 40,
        };
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("40"));
    }
}
