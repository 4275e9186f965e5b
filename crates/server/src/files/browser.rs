//! Directory listing inside the share root.
//!
//! The browser only ever operates on a [`ResolvedPath`], so every listing is
//! already confined to the root. Children are partitioned into directories
//! and files, each sorted by name so repeated listings of an unchanged
//! directory come back identical.

use std::fs::{self, DirEntry};
use std::io;

use protocol::messages::{EntryKind, FileEntry};
use thiserror::Error;
use tracing::debug;

use super::sandbox::{PathSandbox, ResolvedPath};

/// Errors that can occur during directory browsing.
///
/// Paths carried by these errors are relative to the share root.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The requested path does not exist.
    #[error("path does not exist: {0:?}")]
    NotFound(String),

    /// The requested path is not a directory.
    #[error("path is not a directory: {0:?}")]
    NotADirectory(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl BrowserError {
    /// Map an IO error on `path` to the most specific variant.
    fn from_io(error: io::Error, path: &ResolvedPath) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                BrowserError::NotFound(path.relative().to_string())
            }
            _ => BrowserError::Io(error),
        }
    }
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry kind.
    pub kind: EntryKind,
}

impl DirectoryEntry {
    /// Convert to protocol FileEntry.
    pub fn to_protocol(&self) -> FileEntry {
        FileEntry::new(self.name.clone(), self.kind)
    }
}

/// Immediate children of a directory, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Subdirectories, sorted by name.
    pub dirs: Vec<DirectoryEntry>,
    /// Regular files, sorted by name.
    pub files: Vec<DirectoryEntry>,
}

impl Listing {
    /// Total number of listed entries.
    pub fn len(&self) -> usize {
        self.dirs.len() + self.files.len()
    }

    /// Whether the directory has no listable entries.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }
}

/// Directory browser over a sandboxed root.
///
/// Entries that are neither directories nor regular files are never listed,
/// nor are hidden entries when the sandbox does not allow them.
/// Symlinks are excluded by default; with [`follow_symlinks`] enabled they
/// are classified by their target, but only when that target resolves inside
/// the root.
///
/// [`follow_symlinks`]: DirectoryBrowser::follow_symlinks
#[derive(Debug, Clone)]
pub struct DirectoryBrowser {
    /// Sandbox used to re-validate symlink targets.
    sandbox: PathSandbox,
    /// Whether to follow symlinks (default: false for security).
    follow_symlinks: bool,
}

impl DirectoryBrowser {
    /// Create a new directory browser over the given sandbox.
    pub fn new(sandbox: PathSandbox) -> Self {
        Self {
            sandbox,
            follow_symlinks: false,
        }
    }

    /// Set whether to follow symlinks.
    ///
    /// By default, symlinks are not followed for security. When enabled,
    /// symlink targets are still validated against the root.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Whether symlinks are followed.
    pub fn follows_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    /// Sandbox this browser lists from.
    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// List the immediate children of a directory.
    pub fn list(&self, dir: &ResolvedPath) -> Result<Listing, BrowserError> {
        let metadata = fs::metadata(dir.as_path()).map_err(|e| BrowserError::from_io(e, dir))?;
        if !metadata.is_dir() {
            return Err(BrowserError::NotADirectory(dir.relative().to_string()));
        }

        let entries = fs::read_dir(dir.as_path()).map_err(|e| BrowserError::from_io(e, dir))?;

        let mut listing = Listing::default();

        for entry_result in entries {
            let entry = entry_result?;

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                debug!(dir = %dir.relative(), "Skipping entry with non UTF-8 name");
                continue;
            };

            if !self.sandbox.allows_hidden() && name.starts_with('.') {
                continue;
            }

            let kind = match self.classify(&entry) {
                Ok(kind) => kind,
                // Removed since the directory was read.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(BrowserError::Io(e)),
            };

            match kind {
                EntryKind::Directory => listing.dirs.push(DirectoryEntry { name, kind }),
                EntryKind::File => listing.files.push(DirectoryEntry { name, kind }),
                EntryKind::Other => {}
            }
        }

        listing.dirs.sort_by(|a, b| a.name.cmp(&b.name));
        listing.files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(listing)
    }

    /// Determine the kind of a directory entry.
    fn classify(&self, entry: &DirEntry) -> io::Result<EntryKind> {
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            return Ok(EntryKind::Directory);
        }
        if file_type.is_file() {
            return Ok(EntryKind::File);
        }
        if !file_type.is_symlink() || !self.follow_symlinks {
            return Ok(EntryKind::Other);
        }

        let path = entry.path();
        if !self.sandbox.contains(&path) {
            debug!(name = ?entry.file_name(), "Symlink target outside share root, not listed");
            return Ok(EntryKind::Other);
        }

        let target = fs::metadata(&path)?;
        Ok(if target.is_dir() {
            EntryKind::Directory
        } else if target.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        })
    }
}
