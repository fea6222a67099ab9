//! The unit flowing through the build pipeline.
//!
//! A [`FileRecord`] names one source file and optionally carries its
//! contents. Only the path matters for PDF export; the contents decide
//! whether the record qualifies at all:
//!
//! | Contents | Adapter behaviour |
//! |----------|-------------------|
//! | `Null`   | forwarded untouched, no PDF |
//! | `Buffer` | PDF written beside the file, record forwarded |
//! | `Stream` | rejected with an unsupported-input error |

use futures::stream::BoxStream;
use std::fmt;
use std::path::{Path, PathBuf};

/// A byte stream for records whose content arrives incrementally.
pub type ByteStream = BoxStream<'static, std::io::Result<Vec<u8>>>;

/// What a record carries besides its path.
pub enum Contents {
    /// Placeholder record with no backing content (e.g. a directory entry).
    Null,
    /// Content already read into memory from the file at `path`.
    Buffer(Vec<u8>),
    /// Content still arriving.
    Stream(ByteStream),
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contents::Null => f.write_str("Null"),
            Contents::Buffer(b) => write!(f, "Buffer({} bytes)", b.len()),
            Contents::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// One file passing through the pipeline.
#[derive(Debug)]
pub struct FileRecord {
    pub path: PathBuf,
    pub contents: Contents,
}

impl FileRecord {
    /// A materialised record: `contents` were read from `path`.
    pub fn buffered(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: Contents::Buffer(contents.into()),
        }
    }

    /// A placeholder record with no content.
    pub fn null(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: Contents::Null,
        }
    }

    /// A record whose content is still streaming in.
    pub fn streaming(path: impl Into<PathBuf>, stream: ByteStream) -> Self {
        Self {
            path: path.into(),
            contents: Contents::Stream(stream),
        }
    }

    /// Read `path` into a buffered record.
    pub async fn read(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let bytes = tokio::fs::read(&path).await?;
        Ok(Self::buffered(path, bytes))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_null(&self) -> bool {
        matches!(self.contents, Contents::Null)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.contents, Contents::Stream(_))
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self.contents, Contents::Buffer(_))
    }

    /// The buffered bytes, if any.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.contents {
            Contents::Buffer(b) => Some(b),
            _ => None,
        }
    }
}
