//! Recursive file manifests for batch downloads.
//!
//! A manifest is the flat list of every file below a directory, as paths
//! relative to the share root. It is built with an explicit depth-first
//! walk: the files of a directory come first, then each subdirectory in
//! name order, fully, before its next sibling.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::browser::{BrowserError, DirectoryBrowser};
use super::sandbox::ResolvedPath;

/// Ordered list of file paths relative to the share root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest(Vec<String>);

impl Manifest {
    /// Number of files.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no files were found.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the file paths in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Consume the manifest, returning the paths.
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

/// Builds manifests using the same listing rules as [`DirectoryBrowser`].
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    browser: DirectoryBrowser,
}

impl ManifestBuilder {
    /// Create a builder that enumerates directories through `browser`.
    pub fn new(browser: DirectoryBrowser) -> Self {
        Self { browser }
    }

    /// Collect every file below `dir`.
    ///
    /// Fails if `dir` is missing or not a directory, and fails as a whole on
    /// any IO error during the walk; a manifest is never returned partially
    /// populated. A subdirectory that disappears after its parent was listed
    /// is treated as if it had never existed.
    pub fn build(&self, dir: &ResolvedPath) -> Result<Manifest, BrowserError> {
        let mut files = Vec::new();
        let mut visited: HashSet<PathBuf> = HashSet::new();

        // Validates the starting point with the lister's error semantics.
        let first = self.browser.list(dir)?;
        let mut pending = vec![(dir.clone(), first)];

        while let Some((current, listing)) = pending.pop() {
            if self.browser.follows_symlinks() && !self.first_visit(&current, &mut visited) {
                debug!(dir = %current.relative(), "Directory already visited, skipping");
                continue;
            }

            files.extend(
                listing
                    .files
                    .iter()
                    .map(|file| current.child(&file.name).relative().to_string()),
            );

            // Reverse so the first subdirectory is walked first.
            for sub in listing.dirs.iter().rev() {
                let child = current.child(&sub.name);
                match self.browser.list(&child) {
                    Ok(listing) => pending.push((child, listing)),
                    Err(BrowserError::NotFound(_)) | Err(BrowserError::NotADirectory(_)) => {
                        debug!(dir = %child.relative(), "Directory vanished during walk");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        debug!(dir = %dir.relative(), files = files.len(), "Built manifest");
        Ok(Manifest(files))
    }

    /// Record `dir` by canonical path; false if it was already walked.
    fn first_visit(&self, dir: &ResolvedPath, visited: &mut HashSet<PathBuf>) -> bool {
        match fs::canonicalize(dir.as_path()) {
            Ok(canonical) => visited.insert(canonical),
            Err(_) => false,
        }
    }
}
