//! Core types and traits for the fprot client.
//!
//! - [`types`] - `StatusCode`, `Response` and `Info`
//! - [`error`] - The `FprotError` type
//! - [`input`] - Length-aware stream sources
//! - [`traits`] - The `FileEnumerator` capability and its default walker

pub mod error;
pub mod input;
pub mod traits;
pub mod types;

pub use error::{FprotError, Result};
pub use input::{SeekableRead, StreamSource, DEFAULT_STREAM_NAME};
pub use traits::{FileEnumerator, WalkDirEnumerator};
pub use types::{Info, Response, StatusCode};
