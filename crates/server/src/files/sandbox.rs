//! Resolution of untrusted relative paths against the share root.
//!
//! [`PathSandbox`] is the only way to obtain a [`ResolvedPath`], and every
//! other file operation takes a `&ResolvedPath`. A value of that type is
//! therefore proof that the path was checked against the root.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while resolving paths.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The requested path would resolve outside the share root.
    #[error("path escapes the share root: {0:?}")]
    PathTraversal(String),

    /// The configured root is unusable.
    #[error("invalid share root {path}: {reason}")]
    InvalidRoot {
        /// Root as configured.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// IO error while preparing the root.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A location inside the share root.
///
/// Holds both the absolute filesystem path and its normalized relative form
/// (`/`-separated, no empty, `.` or `..` segments, `""` for the root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    absolute: PathBuf,
    relative: String,
}

impl ResolvedPath {
    /// Absolute filesystem path.
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// Normalized path relative to the root.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Whether this is the root itself.
    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// Last segment of the relative path, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        Some(
            self.relative
                .rsplit('/')
                .next()
                .unwrap_or(self.relative.as_str()),
        )
    }

    /// Resolved child of this directory.
    ///
    /// `name` must come from a directory enumeration, never from a client.
    pub(crate) fn child(&self, name: &str) -> ResolvedPath {
        ResolvedPath {
            absolute: self.absolute.join(name),
            relative: protocol::messages::join_path(&self.relative, name),
        }
    }
}

/// Resolver that confines every path to a single root directory.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    /// Canonical absolute root.
    root: PathBuf,
    /// Whether names starting with '.' can be resolved.
    allow_hidden: bool,
}

impl PathSandbox {
    /// Create a sandbox over an existing directory.
    ///
    /// The root is canonicalized once here and never changes afterwards.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, SandboxError> {
        let root = root.as_ref();

        let canonical = fs::canonicalize(root).map_err(|e| SandboxError::InvalidRoot {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;

        if !canonical.is_dir() {
            return Err(SandboxError::InvalidRoot {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        Ok(Self {
            root: canonical,
            allow_hidden: true,
        })
    }

    /// Set whether hidden names (leading '.') can be resolved.
    ///
    /// When disabled, any path with a hidden component is rejected, whether
    /// it is typed by a client or reached through a symlink.
    pub fn allow_hidden(mut self, allow: bool) -> Self {
        self.allow_hidden = allow;
        self
    }

    /// Whether hidden names can be resolved.
    pub fn allows_hidden(&self) -> bool {
        self.allow_hidden
    }

    /// Create the root directory if needed, then build the sandbox over it.
    pub fn ensure_root<P: AsRef<Path>>(root: P) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        if !root.exists() {
            fs::create_dir_all(root)?;
            debug!("Created share root at {:?}", root);
        }
        Self::new(root)
    }

    /// Canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a client-supplied relative path.
    ///
    /// Empty segments are ignored, `.` is a no-op and `..` removes the last
    /// component of the joined absolute path. The result must be the root or
    /// lie below it, both lexically and after symlinks are resolved. For a
    /// path that does not exist yet, its deepest existing ancestor is checked
    /// instead, so a link pointing outside the root rejects every path below
    /// it alike.
    pub fn resolve(&self, relative: &str) -> Result<ResolvedPath, SandboxError> {
        let mut absolute = self.root.clone();

        for segment in relative.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    absolute.pop();
                }
                name => {
                    if !is_single_component(name) || !self.name_allowed(name) {
                        return Err(self.reject(relative));
                    }
                    absolute.push(name);
                }
            }
        }

        // Component-wise, so a root of /share never admits /share-evil.
        let Ok(rest) = absolute.strip_prefix(&self.root) else {
            return Err(self.reject(relative));
        };

        let relative_form = rest
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if !self.existing_ancestor_inside(&absolute) {
            return Err(self.reject(relative));
        }

        Ok(ResolvedPath {
            absolute,
            relative: relative_form,
        })
    }

    /// Re-check a path found while walking the tree (e.g. a symlink target).
    pub(crate) fn contains(&self, path: &Path) -> bool {
        match fs::canonicalize(path) {
            Ok(canonical) => self.canonical_inside(&canonical),
            Err(_) => false,
        }
    }

    /// Whether a canonical path is the root or below it, through visible
    /// names only when hidden names are disallowed.
    fn canonical_inside(&self, canonical: &Path) -> bool {
        match canonical.strip_prefix(&self.root) {
            Ok(rest) => {
                self.allow_hidden
                    || rest
                        .components()
                        .all(|c| !c.as_os_str().to_string_lossy().starts_with('.'))
            }
            Err(_) => false,
        }
    }

    /// Canonicalize the deepest existing ancestor of `path` (the path itself
    /// when it exists) and check it against the root.
    fn existing_ancestor_inside(&self, path: &Path) -> bool {
        for ancestor in path.ancestors() {
            match fs::canonicalize(ancestor) {
                Ok(canonical) => return self.canonical_inside(&canonical),
                Err(_) => continue,
            }
        }
        false
    }

    fn name_allowed(&self, name: &str) -> bool {
        self.allow_hidden || !name.starts_with('.')
    }

    fn reject(&self, relative: &str) -> SandboxError {
        warn!(path = %relative, "Rejected path outside share root");
        SandboxError::PathTraversal(relative.to_string())
    }
}

/// Whether `name` is exactly one normal path component on this platform.
fn is_single_component(name: &str) -> bool {
    if name.contains('\0') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == name
    )
}
