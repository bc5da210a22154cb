//! # fprot
//!
//! An async client for the F-Prot `fpscand` scanning daemon.
//!
//! ## Overview
//!
//! The daemon speaks a line protocol over TCP. This crate lets you:
//!
//! - Scan files the daemon can read by path
//! - Upload files or any length-aware byte source for scanning
//! - Scan whole directory trees, batched into a single exchange
//! - Query the daemon's engine and signature versions
//!
//! Every item gets a [`Response`] whose [`StatusCode`] bitmask tells
//! infections, heuristic hits and per-item errors apart.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fprot::{Client, FprotError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("127.0.0.1:10200")?;
//!
//!     match client.scan_dir("/var/spool/testfiles").await {
//!         Ok(responses) => {
//!             for r in responses.iter().filter(|r| r.infected) {
//!                 println!("{:?}: {}", r.filename, r.signature());
//!             }
//!         }
//!         Err(FprotError::ScanFailed { status, responses, .. }) => {
//!             println!("{status}: {} item(s) answered", responses.len());
//!         }
//!         Err(e) => return Err(e.into()),
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Core**: Status codes, responses, errors, stream sources
//! - **Protocol**: Command framing and response parsing
//! - **Client**: Configuration, dialing, deadlines and the session

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod core;
pub mod protocol;

// Re-export commonly used types at the crate root
pub use crate::client::{Client, ClientConfig};
pub use crate::core::{
    FileEnumerator, FprotError, Info, Response, Result, StatusCode, StreamSource,
    WalkDirEnumerator,
};
pub use crate::protocol::{Command, Verdicts};

/// Prelude module for convenient imports.
///
/// ```rust
/// use fprot::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{Client, ClientConfig};
    pub use crate::core::{
        FileEnumerator, FprotError, Info, Response, StatusCode, StreamSource, WalkDirEnumerator,
    };
    pub use crate::protocol::{Command, Verdicts};
}
