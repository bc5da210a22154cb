//! The daemon client.
//!
//! - [`config`] - Addresses, timeouts and dial retry settings
//! - [`connection`] - Deadline-bounded line I/O over one stream
//! - [`retry`] - Retrying a dial that timed out
//! - [`session`] - The public [`Client`]

pub mod config;
pub mod connection;
pub mod retry;
pub mod session;

pub use config::{
    validate_address, ClientConfig, DEFAULT_ADDRESS, DEFAULT_COMMAND_TIMEOUT,
    DEFAULT_CONNECT_SLEEP, DEFAULT_CONNECT_TIMEOUT,
};
pub use connection::{dial, Connection};
pub use retry::DialPolicy;
pub use session::Client;
