//! Content sources for `SCAN STREAM` uploads.
//!
//! The daemon finds the end of an uploaded payload only from the declared
//! `SIZE`, so every source must know its exact length before the first
//! byte is sent. [`StreamSource`] wraps the kinds of input whose length
//! can be determined up front.

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};

use crate::core::error::{FprotError, Result};

/// Name sent in place of a path when a source has no name of its own.
pub const DEFAULT_STREAM_NAME: &str = "stream";

/// A readable source that can also seek, used to measure its length.
pub trait SeekableRead: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableRead for T {}

/// A byte source for stream scanning.
///
/// # Examples
///
/// ```rust
/// use fprot::StreamSource;
///
/// let source = StreamSource::from_bytes(b"hello".to_vec()).with_name("greeting.txt");
/// assert_eq!(source.name(), "greeting.txt");
/// ```
pub enum StreamSource {
    /// An in-memory buffer.
    Bytes {
        /// The payload.
        data: Vec<u8>,
        /// Optional display name.
        name: Option<String>,
    },

    /// An open file; its length comes from metadata.
    File {
        /// The open file.
        file: File,
        /// Optional display name.
        name: Option<String>,
    },

    /// A seekable reader; its length is measured from the current position.
    Seekable {
        /// The reader.
        reader: Box<dyn SeekableRead>,
        /// Optional display name.
        name: Option<String>,
    },

    /// A plain reader; usable only when its length is supplied.
    Reader {
        /// The reader.
        reader: Box<dyn AsyncRead + Send + Unpin>,
        /// Length supplied by the caller.
        length: Option<u64>,
        /// Optional display name.
        name: Option<String>,
    },
}

impl std::fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes { data, name } => f
                .debug_struct("Bytes")
                .field("data_len", &data.len())
                .field("name", name)
                .finish(),
            Self::File { file, name } => f
                .debug_struct("File")
                .field("file", file)
                .field("name", name)
                .finish(),
            Self::Seekable { name, .. } => f
                .debug_struct("Seekable")
                .field("name", name)
                .finish_non_exhaustive(),
            Self::Reader { length, name, .. } => f
                .debug_struct("Reader")
                .field("length", length)
                .field("name", name)
                .finish_non_exhaustive(),
        }
    }
}

impl StreamSource {
    /// Creates a source from an in-memory buffer.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            data: data.into(),
            name: None,
        }
    }

    /// Creates a source from an open file.
    pub fn from_file(file: File) -> Self {
        Self::File { file, name: None }
    }

    /// Opens the file at `path` and names the source after it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        Ok(Self::File {
            file,
            name: Some(path.display().to_string()),
        })
    }

    /// Creates a source from a seekable reader.
    ///
    /// Only the bytes between the current position and the end are sent.
    pub fn from_seekable(reader: impl SeekableRead + 'static) -> Self {
        Self::Seekable {
            reader: Box::new(reader),
            name: None,
        }
    }

    /// Creates a source from a reader of unknown length.
    ///
    /// Scanning fails with [`FprotError::ContentLengthUnknown`] unless a
    /// length is supplied with [`StreamSource::with_length`].
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Reader {
            reader: Box::new(reader),
            length: None,
            name: None,
        }
    }

    /// Sets the name sent to the daemon.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        match &mut self {
            Self::Bytes { name: n, .. }
            | Self::File { name: n, .. }
            | Self::Seekable { name: n, .. }
            | Self::Reader { name: n, .. } => *n = Some(name.into()),
        }
        self
    }

    /// Declares the length of a plain reader. Ignored for other sources.
    pub fn with_length(mut self, len: u64) -> Self {
        if let Self::Reader { length, .. } = &mut self {
            *length = Some(len);
        }
        self
    }

    /// Returns the name sent to the daemon.
    pub fn name(&self) -> &str {
        let name = match self {
            Self::Bytes { name, .. }
            | Self::File { name, .. }
            | Self::Seekable { name, .. }
            | Self::Reader { name, .. } => name.as_deref(),
        };
        name.unwrap_or(DEFAULT_STREAM_NAME)
    }

    /// Determines the exact number of bytes this source will yield.
    ///
    /// A seekable reader is returned to its original position.
    pub async fn content_length(&mut self) -> Result<u64> {
        match self {
            Self::Bytes { data, .. } => Ok(data.len() as u64),
            Self::File { file, .. } => Ok(file.metadata().await?.len()),
            Self::Seekable { reader, .. } => {
                let current = reader.stream_position().await?;
                let end = reader.seek(SeekFrom::End(0)).await?;
                reader.seek(SeekFrom::Start(current)).await?;
                Ok(end.saturating_sub(current))
            }
            Self::Reader { length, .. } => length.ok_or(FprotError::ContentLengthUnknown),
        }
    }

    /// Borrows the payload as a reader.
    pub(crate) fn reader(&mut self) -> Box<dyn AsyncRead + Send + Unpin + '_> {
        match self {
            Self::Bytes { data, .. } => Box::new(data.as_slice()),
            Self::File { file, .. } => Box::new(file),
            Self::Seekable { reader, .. } => Box::new(reader),
            Self::Reader { reader, .. } => Box::new(reader),
        }
    }
}

impl From<Vec<u8>> for StreamSource {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl From<&[u8]> for StreamSource {
    fn from(data: &[u8]) -> Self {
        Self::from_bytes(data.to_vec())
    }
}

impl From<File> for StreamSource {
    fn from(file: File) -> Self {
        Self::from_file(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_bytes_length() {
        let mut source = StreamSource::from_bytes(vec![1, 2, 3, 4]);
        assert_eq!(source.content_length().await.unwrap(), 4);
        assert_eq!(source.name(), DEFAULT_STREAM_NAME);
    }

    #[tokio::test]
    async fn test_seekable_length_from_position() {
        let mut cursor = Cursor::new(vec![0u8; 10]);
        cursor.set_position(3);
        let mut source = StreamSource::from_seekable(cursor);
        assert_eq!(source.content_length().await.unwrap(), 7);

        let mut rest = Vec::new();
        source.reader().read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest.len(), 7);
    }

    #[tokio::test]
    async fn test_reader_requires_length() {
        let mut source = StreamSource::from_reader(&b"abc"[..]);
        assert!(matches!(
            source.content_length().await,
            Err(FprotError::ContentLengthUnknown)
        ));

        let mut source = StreamSource::from_reader(&b"abc"[..]).with_length(3);
        assert_eq!(source.content_length().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_file_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.bin");
        std::fs::write(&path, b"temporary file's content").unwrap();

        let mut source = StreamSource::open(&path).await.unwrap();
        assert_eq!(source.content_length().await.unwrap(), 24);
        assert_eq!(source.name(), path.display().to_string());
    }

    #[test]
    fn test_with_name() {
        let source = StreamSource::from_bytes(b"x".as_slice()).with_name("x.txt");
        assert_eq!(source.name(), "x.txt");
    }
}
