//! The line protocol spoken by the scanning daemon.
//!
//! Requests are newline-terminated command lines; a stream upload line
//! is followed by its raw payload. Each scanned item is answered by one
//! line of the form
//!
//! ```text
//! <code> <<status>[: <signature>]> [<filename>][-><archive item>]
//! ```
//!
//! where `<code>` is a decimal [`StatusCode`](crate::StatusCode) bitmask.
//!
//! ```rust
//! use fprot::protocol::parse_response_line;
//!
//! let response = parse_response_line("1 <infected: EICAR_Test_File> /tmp/eicar.com").unwrap();
//! assert!(response.infected);
//! assert_eq!(response.signature(), "EICAR_Test_File");
//! ```

pub mod command;
pub mod encoder;
pub mod parser;

pub use command::Command;
pub use encoder::{format_command, format_stream_header, validate_argument};
pub use parser::{parse_info_line, parse_response_line, Verdicts};
