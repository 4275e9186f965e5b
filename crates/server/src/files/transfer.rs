//! Streaming file downloads.
//!
//! A download reads the file in bounded chunks as the consumer polls for
//! them, so memory use stays at one chunk regardless of the file size. The
//! stream promises exactly the length reported when the file was opened:
//! a file that shrinks underneath it ends the stream with an error rather
//! than a short, successful-looking body.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, Take};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::sandbox::ResolvedPath;

/// Default chunk size for transfers (64KB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Maximum chunk size (1MB).
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Errors that can occur when opening a download.
///
/// Paths carried by these errors are relative to the share root.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The requested file does not exist or is not a regular file.
    #[error("file not found: {0:?}")]
    NotFound(String),

    /// The requested path is a directory, not a file.
    #[error("path is a directory: {0:?}")]
    IsADirectory(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TransferError {
    fn from_io(error: io::Error, path: &ResolvedPath) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                TransferError::NotFound(path.relative().to_string())
            }
            _ => TransferError::Io(error),
        }
    }
}

/// An opened file, ready to be streamed.
#[derive(Debug)]
pub struct Download {
    /// File name suggested to the receiver.
    pub name: String,
    /// Exact number of bytes the stream will yield on success.
    pub len: u64,
    /// The file contents.
    pub stream: TransferStream,
}

/// File download handler.
#[derive(Debug, Clone)]
pub struct FileTransfer {
    /// Read size per chunk.
    chunk_size: usize,
}

impl Default for FileTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTransfer {
    /// Create a new file transfer handler.
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the chunk size, clamped to `1..=MAX_CHUNK_SIZE`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    /// Read size per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Open a file for streaming.
    ///
    /// Directories are rejected before any file handle is opened.
    pub async fn open(&self, file: &ResolvedPath) -> Result<Download, TransferError> {
        let metadata = tokio::fs::metadata(file.as_path())
            .await
            .map_err(|e| TransferError::from_io(e, file))?;

        if metadata.is_dir() {
            return Err(TransferError::IsADirectory(file.relative().to_string()));
        }
        if !metadata.is_file() {
            return Err(TransferError::NotFound(file.relative().to_string()));
        }

        let handle = File::open(file.as_path())
            .await
            .map_err(|e| TransferError::from_io(e, file))?;

        // The path may have been replaced between the stat and the open.
        let metadata = handle.metadata().await?;
        if metadata.is_dir() {
            return Err(TransferError::IsADirectory(file.relative().to_string()));
        }

        let len = metadata.len();
        let name = file.file_name().unwrap_or("download").to_string();

        debug!(path = %file.relative(), len, "Opened file for transfer");

        Ok(Download {
            name,
            len,
            stream: TransferStream::new(handle, len, self.chunk_size, file.relative()),
        })
    }
}

/// Chunked byte stream over an open file.
///
/// Yields at most `len` bytes. Dropping the stream closes the file, which is
/// how a client disconnect releases the handle.
#[derive(Debug)]
pub struct TransferStream {
    inner: ReaderStream<Take<File>>,
    /// Relative path, for logging.
    path: String,
    expected: u64,
    sent: u64,
    finished: bool,
}

impl TransferStream {
    fn new(file: File, len: u64, chunk_size: usize, path: &str) -> Self {
        Self {
            inner: ReaderStream::with_capacity(file.take(len), chunk_size),
            path: path.to_string(),
            expected: len,
            sent: 0,
            finished: false,
        }
    }

    /// Bytes yielded so far.
    pub fn bytes_sent(&self) -> u64 {
        self.sent
    }
}

impl Stream for TransferStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                this.finished = true;
                warn!(path = %this.path, sent = this.sent, error = %e, "Read failed during transfer");
                Poll::Ready(Some(Err(e)))
            }
            None if this.sent < this.expected => {
                this.finished = true;
                warn!(
                    path = %this.path,
                    sent = this.sent,
                    expected = this.expected,
                    "File truncated during transfer"
                );
                Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "file shrank during transfer",
                ))))
            }
            None => {
                this.finished = true;
                debug!(path = %this.path, sent = this.sent, "Transfer complete");
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for TransferStream {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                path = %self.path,
                sent = self.sent,
                expected = self.expected,
                "Transfer cancelled"
            );
        }
    }
}
