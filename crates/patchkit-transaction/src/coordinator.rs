//! Multi-file patch batches: ordering, failure policy, atomic rollback.
//!
//! Files are processed sequentially in ascending priority order. The default
//! policy stops at the first failure; `continue_on_error` processes every
//! file regardless; `atomic` rolls back every already-patched file and
//! surfaces the batch as an error.

use std::collections::BTreeMap;

use patchkit_udiff::{parse, ApplyOptions, DiffResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::PatchEngine;
use crate::error::TransactionError;

/// One file's entry in a patch batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchFile {
    pub path: String,
    /// Unified diff text for this file.
    pub diff: String,
    /// Lower priorities are applied first. Ties keep input order.
    #[serde(default)]
    pub priority: i32,
}

/// How a batch is fed to the coordinator.
pub enum PatchInput {
    /// Explicit per-file entries.
    Files(Vec<PatchFile>),
    /// A single multi-file diff blob; sections are split on `diff --git`
    /// lines and paths taken from each section's headers.
    Blob(String),
    /// JSON array of [`PatchFile`] objects.
    Json(String),
}

impl PatchInput {
    fn into_files(self) -> Result<Vec<PatchFile>, TransactionError> {
        match self {
            Self::Files(files) => Ok(files),
            Self::Json(text) => Ok(serde_json::from_str(&text)?),
            Self::Blob(blob) => {
                let mut files = Vec::new();
                for section in split_blob(&blob) {
                    let parsed = parse(&section)?;
                    let diff = parsed
                        .first()
                        .ok_or_else(|| TransactionError::Input("empty diff section".into()))?;
                    let path = if !diff.new_path.is_empty() {
                        diff.new_path.clone()
                    } else if !diff.old_path.is_empty() {
                        diff.old_path.clone()
                    } else {
                        return Err(TransactionError::Input(
                            "diff section carries no file paths".into(),
                        ));
                    };
                    files.push(PatchFile {
                        path,
                        diff: section,
                        priority: 0,
                    });
                }
                Ok(files)
            }
        }
    }
}

/// Split a multi-file diff blob into one string per file section.
fn split_blob(blob: &str) -> Vec<String> {
    let mut sections = vec![String::new()];
    for line in blob.split_inclusive('\n') {
        if line.starts_with("diff --git ") && !sections.last().is_some_and(|s| s.is_empty()) {
            sections.push(String::new());
        }
        if let Some(current) = sections.last_mut() {
            current.push_str(line);
        }
    }
    sections.retain(|s| !s.trim().is_empty());
    sections
}

/// Batch-level policy around the per-file [`ApplyOptions`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchOptions {
    pub apply: ApplyOptions,
    /// All files apply or none do. Forces backups so rollback is possible.
    pub atomic: bool,
    /// Keep processing after a file fails instead of stopping.
    pub continue_on_error: bool,
}

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchResult {
    /// True when every processed file succeeded.
    pub success: bool,
    pub files_total: usize,
    pub files_processed: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    /// Per-file results, keyed by path.
    pub results: BTreeMap<String, DiffResult>,
    /// Whether backups exist for a manual rollback.
    pub rollback_available: bool,
    /// Backup files written during this batch.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub rollback_paths: Vec<String>,
}

/// Runs patch batches through a [`PatchEngine`].
pub struct PatchCoordinator {
    engine: PatchEngine,
}

impl PatchCoordinator {
    pub fn new(engine: PatchEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &PatchEngine {
        &self.engine
    }

    /// Apply a batch of patches.
    ///
    /// Returns `Err(TransactionError::Atomic)` when an atomic batch fails
    /// and its already-patched files have been rolled back. All other
    /// failures are reported inside the [`PatchResult`].
    pub async fn apply(
        &self,
        input: PatchInput,
        options: &PatchOptions,
    ) -> Result<PatchResult, TransactionError> {
        let mut files = input.into_files()?;
        files.sort_by_key(|f| f.priority);

        let mut apply_options = options.apply.clone();
        if options.atomic {
            apply_options.create_backup = true;
        }

        let mut result = PatchResult {
            files_total: files.len(),
            ..Default::default()
        };
        // (original path, backup path) per patched file, in apply order.
        let mut undo_log: Vec<(String, String)> = Vec::new();

        for file in &files {
            result.files_processed += 1;
            let file_result = match self
                .engine
                .apply_to_file(&file.path, &file.diff, &apply_options)
                .await
            {
                Ok(r) => r,
                Err(err) => DiffResult {
                    success: false,
                    path: Some(file.path.clone()),
                    warnings: vec![err.to_string()],
                    ..Default::default()
                },
            };

            if file_result.success {
                if let Some(backup) = &file_result.backup_path {
                    undo_log.push((file.path.clone(), backup.clone()));
                }
                result.files_succeeded += 1;
                result.results.insert(file.path.clone(), file_result);
                continue;
            }

            result.files_failed += 1;
            let reason = file_result
                .rejected
                .first()
                .map(|h| h.reason.clone())
                .or_else(|| file_result.warnings.first().cloned())
                .unwrap_or_else(|| "apply failed".to_string());
            result.results.insert(file.path.clone(), file_result);

            if options.atomic {
                warn!(path = %file.path, %reason, "atomic batch failed, rolling back");
                let rolled_back = self.rollback(&undo_log).await;
                return Err(TransactionError::Atomic {
                    failed_path: file.path.clone(),
                    reason,
                    rolled_back,
                });
            }
            if !options.continue_on_error {
                break;
            }
        }

        result.success = result.files_failed == 0;
        result.rollback_paths = undo_log.into_iter().map(|(_, backup)| backup).collect();
        result.rollback_available = !result.rollback_paths.is_empty();
        info!(
            total = result.files_total,
            succeeded = result.files_succeeded,
            failed = result.files_failed,
            "patch batch finished"
        );
        Ok(result)
    }

    /// Restore patched files from their backups, newest first.
    ///
    /// Best effort: a file whose backup cannot be read or re-applied is
    /// logged and skipped, the rest are still restored.
    async fn rollback(&self, undo_log: &[(String, String)]) -> Vec<String> {
        let store = self.engine.store();
        let mut restored = Vec::new();
        for (path, backup) in undo_log.iter().rev() {
            let contents = match store.read(backup).await {
                Ok(contents) => contents,
                Err(err) => {
                    warn!(path, backup, error = %err, "rollback could not read backup");
                    continue;
                }
            };
            if let Err(err) = store.write(path, &contents).await {
                warn!(path, backup, error = %err, "rollback could not restore file");
                continue;
            }
            if let Err(err) = store.remove(backup).await {
                warn!(backup, error = %err, "rollback could not remove backup");
            }
            restored.push(path.clone());
        }
        restored
    }
}
