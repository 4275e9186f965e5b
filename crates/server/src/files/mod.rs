//! Sandboxed access to the shared directory tree.
//!
//! This module provides the read-only file operations of the share:
//! - Path resolution confined to the share root
//! - Directory listing, partitioned into directories and files
//! - Recursive manifests of every file below a directory
//! - Chunked streaming of single files
//!
//! # Security
//!
//! Every operation takes a [`ResolvedPath`], which only [`PathSandbox`] can
//! produce. Resolution normalizes `.` and `..` structurally, compares against
//! the root component by component, and re-checks existing paths after
//! symlinks are resolved, so no request can reach outside the root.

pub mod browser;
pub mod manifest;
pub mod sandbox;
pub mod transfer;

pub use browser::{BrowserError, DirectoryBrowser, DirectoryEntry, Listing};
pub use manifest::{Manifest, ManifestBuilder};
pub use sandbox::{PathSandbox, ResolvedPath, SandboxError};
pub use transfer::{Download, FileTransfer, TransferError, TransferStream};
