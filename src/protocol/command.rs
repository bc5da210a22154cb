//! Daemon commands and their canonical wire text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A command understood by the scanning daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// `HELP`: server handshake and version information.
    Help,
    /// `SCAN FILE <path>`: scan a file the daemon can read itself.
    ScanFile,
    /// `SCAN STREAM <name> SIZE <n>`: scan `n` uploaded bytes.
    ScanStream,
    /// `QUEUE`: start a batch of scan requests.
    Queue,
    /// `SCAN`: run the queued batch.
    ScanQueue,
    /// `QUIT`: end the session.
    Quit,
}

impl Command {
    /// Returns the canonical wire text.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Help => "HELP",
            Self::ScanFile => "SCAN FILE",
            Self::ScanStream => "SCAN STREAM",
            Self::Queue => "QUEUE",
            Self::ScanQueue => "SCAN",
            Self::Quit => "QUIT",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_text() {
        let expected = [
            (Command::Help, "HELP"),
            (Command::ScanFile, "SCAN FILE"),
            (Command::ScanStream, "SCAN STREAM"),
            (Command::Queue, "QUEUE"),
            (Command::ScanQueue, "SCAN"),
            (Command::Quit, "QUIT"),
        ];
        for (command, text) in expected {
            assert_eq!(command.to_string(), text);
            assert_eq!(command.as_str(), text);
        }
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&Command::ScanQueue).unwrap(),
            "\"scan_queue\""
        );
    }
}
