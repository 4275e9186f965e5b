//! Wire types for the dirshare HTTP API.
//!
//! Every JSON body the server emits is one of the types defined here. They
//! are kept free of filesystem types so that clients can depend on this
//! crate without pulling in the server.

use serde::{Deserialize, Serialize};

/// Kind of a directory child.
///
/// The set is closed: anything that is neither a plain directory nor a plain
/// file (devices, sockets, excluded symlinks) is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Directory.
    Directory,
    /// Regular file.
    File,
    /// Anything else.
    Other,
}

impl EntryKind {
    /// Returns true for [`EntryKind::Directory`].
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Returns true for [`EntryKind::File`].
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File)
    }
}

/// A single child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry kind.
    pub kind: EntryKind,
}

impl FileEntry {
    /// Create a new entry.
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Response to a directory listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Normalized path of the listed directory, relative to the share root.
    pub path: String,
    /// Parent of `path`, or `None` when `path` is the root.
    pub parent: Option<String>,
    /// Subdirectories, in stable order.
    pub dirs: Vec<FileEntry>,
    /// Files, in stable order.
    pub files: Vec<FileEntry>,
}

/// Response to a manifest request: every file below a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestResponse {
    /// File paths relative to the share root, `/`-separated.
    pub files: Vec<String>,
}

/// Error body returned by the JSON routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable error message. Never contains host filesystem paths.
    pub message: String,
}

/// Error codes for the operations of the share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The session is not authenticated.
    Unauthorized,
    /// The requested path would leave the share root.
    InvalidPath,
    /// Nothing exists at the requested path.
    NotFound,
    /// A directory operation was requested on something else.
    NotADirectory,
    /// A file operation was requested on a directory.
    IsADirectory,
    /// The filesystem failed while serving the request.
    IoFailure,
}

impl ErrorCode {
    /// HTTP status code conventionally associated with this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::InvalidPath | Self::NotADirectory | Self::IsADirectory => 400,
            Self::NotFound => 404,
            Self::IoFailure => 500,
        }
    }

    /// Whether the client caused the error (4xx) rather than the host (5xx).
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

/// Parent of a normalized relative path, `None` for the root itself.
///
/// ```
/// use protocol::messages::parent_path;
///
/// assert_eq!(parent_path(""), None);
/// assert_eq!(parent_path("docs"), Some(String::new()));
/// assert_eq!(parent_path("docs/2024"), Some("docs".to_string()));
/// ```
pub fn parent_path(path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    Some(match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    })
}

/// Join a normalized relative directory path and a child name with `/`.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
