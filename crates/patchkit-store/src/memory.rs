//! In-memory text store for tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{StoreError, TextStore};

/// [`TextStore`] over a mutex-guarded map. Paths are plain keys; no
/// normalization or confinement is applied.
#[derive(Default)]
pub struct MemoryTextStore {
    files: Mutex<HashMap<String, String>>,
}

impl MemoryTextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `(path, contents)` pairs.
    pub fn with_files<I, P, T>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: Into<String>,
    {
        Self {
            files: Mutex::new(
                files
                    .into_iter()
                    .map(|(p, t)| (p.into(), t.into()))
                    .collect(),
            ),
        }
    }

    /// Current contents of a file, if present. Synchronous test helper.
    pub fn get(&self, path: &str) -> Option<String> {
        self.files.lock().get(path).cloned()
    }

    /// All stored paths, sorted. Synchronous test helper.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl TextStore for MemoryTextStore {
    async fn read(&self, path: &str) -> Result<String, StoreError> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }

    async fn write(&self, path: &str, text: &str) -> Result<(), StoreError> {
        self.files
            .lock()
            .insert(path.to_string(), text.to_string());
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.files.lock().contains_key(path))
    }
}
