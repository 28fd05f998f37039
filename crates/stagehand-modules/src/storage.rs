//! Per-module storage directories.
//!
//! A module opts into storage by returning a [`ModuleFileConfig`] from
//! [`Module::file_config`](crate::Module::file_config). The manager resolves
//! it against the modules root and creates the directory before the first
//! hook runs. Everything inside the directory belongs to the module.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::key::ModuleKey;

/// A module's storage declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleFileConfig {
    /// Whether a directory should be provisioned at all.
    pub create: bool,
    /// Directory name. Defaults to the module key's name.
    pub dir_name: Option<String>,
    /// Parent directory. Defaults to the manager's modules root.
    pub root: Option<PathBuf>,
}

impl Default for ModuleFileConfig {
    fn default() -> Self {
        Self {
            create: true,
            dir_name: None,
            root: None,
        }
    }
}

impl ModuleFileConfig {
    /// Request a directory with default name and root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A declaration that provisions nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            create: false,
            ..Self::default()
        }
    }

    /// Use `dir_name` instead of the key's name.
    #[must_use]
    pub fn with_dir_name(mut self, dir_name: impl Into<String>) -> Self {
        self.dir_name = Some(dir_name.into());
        self
    }

    /// Place the directory under `root` instead of the modules root.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Resolve a (possibly absent) declaration for `key`.
    ///
    /// Pure: never touches the filesystem.
    #[must_use]
    pub fn resolve(
        declared: Option<&Self>,
        key: &ModuleKey,
        modules_root: &Path,
    ) -> ResolvedFileConfig {
        let Some(config) = declared.filter(|c| c.create) else {
            return ResolvedFileConfig::Disabled;
        };

        let dir_name = config.dir_name.clone().unwrap_or_else(|| key.name());
        let root = config.root.as_deref().unwrap_or(modules_root);
        let dir_path = root.join(&dir_name);

        ResolvedFileConfig::Enabled { dir_name, dir_path }
    }
}

/// Outcome of resolving a [`ModuleFileConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFileConfig {
    /// No directory for this module.
    Disabled,
    /// A directory at `dir_path`.
    Enabled {
        /// Final directory name.
        dir_name: String,
        /// Absolute directory path.
        dir_path: PathBuf,
    },
}

impl ResolvedFileConfig {
    /// Whether a directory is provisioned.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }

    /// The directory path, when enabled.
    #[must_use]
    pub fn dir_path(&self) -> Option<&Path> {
        match self {
            Self::Disabled => None,
            Self::Enabled { dir_path, .. } => Some(dir_path),
        }
    }

    /// A storage handle for the directory. Does not create it.
    #[must_use]
    pub fn storage(&self) -> Option<StorageDir> {
        self.dir_path().map(StorageDir::new)
    }
}

/// Handle onto one module's storage directory.
///
/// Relative paths are resolved lexically against the root. Absolute paths
/// and `..` components that climb above the root are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDir {
    root: PathBuf,
}

impl StorageDir {
    /// Wrap `root`. Does not touch the filesystem.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Join relative segments onto the root without touching disk.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PathEscape`] if a segment is absolute or the
    /// joined path leaves the root.
    pub fn join<I, S>(&self, segments: I) -> StorageResult<PathBuf>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolved = self.root.clone();
        for segment in segments {
            resolved = resolve_within(&self.root, &resolved, segment.as_ref())?;
        }
        Ok(resolved)
    }

    /// Create the directory and any missing parents. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub async fn ensure(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| io_err(&self.root, source))?;
        debug!(path = %self.root.display(), "storage directory ensured");
        Ok(())
    }

    /// Whether the root exists and is a directory.
    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .is_ok_and(|meta| meta.is_dir())
    }

    /// Names of the root's immediate children, sorted.
    ///
    /// Empty when the directory is missing or unreadable.
    pub async fn list(&self) -> Vec<String> {
        let Ok(mut entries) = tokio::fs::read_dir(&self.root).await else {
            return Vec::new();
        };

        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        names
    }

    /// Read a file relative to the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the path escapes the root or cannot be read.
    pub async fn read_file(&self, rel: &str) -> StorageResult<Vec<u8>> {
        let path = self.join([rel])?;
        tokio::fs::read(&path)
            .await
            .map_err(|source| io_err(&path, source))
    }

    /// Read a UTF-8 file relative to the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the path escapes the root, cannot be read, or is
    /// not valid UTF-8.
    pub async fn read_to_string(&self, rel: &str) -> StorageResult<String> {
        let path = self.join([rel])?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| io_err(&path, source))
    }

    /// Write a file relative to the root, creating missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the path escapes the root or cannot be written.
    pub async fn write_file(&self, rel: &str, data: impl AsRef<[u8]>) -> StorageResult<()> {
        let path = self.join([rel])?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_err(parent, source))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|source| io_err(&path, source))
    }

    /// Recursively delete `rel`, or the whole root when `None`.
    ///
    /// A missing target is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the path escapes the root or deletion fails.
    pub async fn remove(&self, rel: Option<&str>) -> StorageResult<()> {
        let path = match rel {
            Some(rel) => self.join([rel])?,
            None => self.root.clone(),
        };

        let meta = match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(io_err(&path, source)),
        };

        let result = if meta.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };

        match result {
            Ok(()) => {
                debug!(path = %path.display(), "storage path removed");
                Ok(())
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_err(&path, source)),
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Lexically resolve `rel` against `from`, refusing to climb above `root`.
fn resolve_within(root: &Path, from: &Path, rel: &str) -> StorageResult<PathBuf> {
    let escape = |reason| StorageError::PathEscape {
        path: rel.to_owned(),
        reason,
    };

    let req = Path::new(rel);
    if req.is_absolute() {
        return Err(escape("absolute paths are not allowed"));
    }

    let mut resolved = from.to_path_buf();
    for component in req.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(escape("prefix or root components are not allowed"));
            },
            Component::CurDir => {},
            Component::ParentDir => {
                if resolved == root {
                    return Err(escape("traverses above the module directory"));
                }
                resolved.pop();
            },
            Component::Normal(part) => resolved.push(part),
        }
    }

    Ok(resolved)
}
