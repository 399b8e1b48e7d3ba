//! Filesystem-backed text store, confined to a root directory.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::{StoreError, TextStore};

/// [`TextStore`] over a directory tree.
///
/// Every path is resolved against `root` and rejected if it escapes it,
/// whether by absolute path or by `..` traversal. Writes create missing
/// parent directories.
pub struct FsTextStore {
    root: PathBuf,
}

impl FsTextStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against the root and ensure it stays inside it.
    ///
    /// Non-existent paths are checked through their deepest existing
    /// ancestor so that `..` segments cannot dodge the comparison.
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let outside = || StoreError::OutsideRoot {
            path: path.to_string(),
            root: self.root.display().to_string(),
        };

        let candidate = Path::new(path);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let root_canonical = self
            .root
            .canonicalize()
            .map_err(|e| StoreError::from_io(path, e))?;

        // Walk up to the deepest existing ancestor, keeping the parts we
        // stepped over so they can be re-attached after canonicalization.
        let mut existing = joined.as_path();
        let mut pending: Vec<&OsStr> = Vec::new();
        while !existing.exists() {
            match (existing.file_name(), existing.parent()) {
                (Some(name), Some(parent)) if !parent.as_os_str().is_empty() => {
                    pending.push(name);
                    existing = parent;
                }
                _ => return Err(outside()),
            }
        }

        let mut resolved = existing
            .canonicalize()
            .map_err(|e| StoreError::from_io(path, e))?;
        if !resolved.starts_with(&root_canonical) {
            return Err(outside());
        }
        for part in pending.into_iter().rev() {
            resolved = resolved.join(part);
        }
        Ok(resolved)
    }
}

#[async_trait]
impl TextStore for FsTextStore {
    async fn read(&self, path: &str) -> Result<String, StoreError> {
        let resolved = self.resolve(path)?;
        fs::read_to_string(&resolved)
            .await
            .map_err(|e| StoreError::from_io(path, e))
    }

    async fn write(&self, path: &str, text: &str) -> Result<(), StoreError> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::from_io(path, e))?;
        }
        fs::write(&resolved, text)
            .await
            .map_err(|e| StoreError::from_io(path, e))
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let resolved = self.resolve(path)?;
        fs::remove_file(&resolved)
            .await
            .map_err(|e| StoreError::from_io(path, e))
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let resolved = self.resolve(path)?;
        Ok(fs::try_exists(&resolved)
            .await
            .map_err(|e| StoreError::from_io(path, e))?)
    }
}
