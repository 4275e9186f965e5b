//! # dirshare protocol
//!
//! Wire types for the dirshare file share.
//!
//! The server exposes three path-bearing operations over HTTP: listing a
//! directory, building a recursive manifest of a directory, and streaming a
//! single file. The first two answer with JSON bodies defined in
//! [`messages`]; failures answer with an [`ErrorMessage`].
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{EntryKind, FileEntry, ListResponse};
//!
//! let response = ListResponse {
//!     path: "docs".to_string(),
//!     parent: Some(String::new()),
//!     dirs: vec![],
//!     files: vec![FileEntry::new("notes.txt", EntryKind::File)],
//! };
//! let json = serde_json::to_string(&response).unwrap();
//! assert!(json.contains("notes.txt"));
//! ```

pub mod messages;

pub use messages::{
    EntryKind, ErrorCode, ErrorMessage, FileEntry, ListResponse, ManifestResponse,
};
