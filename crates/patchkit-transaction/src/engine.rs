//! Single-file patch engine: storage, backup, validation, notification.
//!
//! The engine owns the side effects around one apply. The text transform
//! itself is delegated to the appliers in `patchkit-udiff`; everything here
//! is reading, backing up, writing, and the optional post-apply hooks.

use std::sync::Arc;

use patchkit_store::{backup_path, PostApplyNotifier, SyntaxValidator, TextStore};
use patchkit_udiff::{applier_for, parse, ApplyOptions, DiffResult, ParseError, ParsedDiff};
use tracing::{debug, info, warn};

use crate::error::TransactionError;

/// Applies diffs to files held in a [`TextStore`].
pub struct PatchEngine {
    store: Arc<dyn TextStore>,
    validator: Option<Arc<dyn SyntaxValidator>>,
    notifier: Option<Arc<dyn PostApplyNotifier>>,
}

impl PatchEngine {
    pub fn new(store: Arc<dyn TextStore>) -> Self {
        Self {
            store,
            validator: None,
            notifier: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn SyntaxValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn PostApplyNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(&self) -> &Arc<dyn TextStore> {
        &self.store
    }

    /// Apply raw unified diff text to one file.
    ///
    /// `diff_text` must contain exactly the diff for this file; its first
    /// file section is used.
    pub async fn apply_to_file(
        &self,
        path: &str,
        diff_text: &str,
        options: &ApplyOptions,
    ) -> Result<DiffResult, TransactionError> {
        let diffs = parse(diff_text)?;
        let diff = diffs.first().ok_or(ParseError::NoDiffContent)?;
        self.apply_parsed(path, diff, options).await
    }

    /// Apply an already-parsed diff to one file.
    pub async fn apply_parsed(
        &self,
        path: &str,
        diff: &ParsedDiff,
        options: &ApplyOptions,
    ) -> Result<DiffResult, TransactionError> {
        let original = self.store.read(path).await?;
        let outcome = applier_for(options.strategy).apply(&original, diff, options);
        let mut result = outcome.result;
        result.path = Some(path.to_string());
        debug!(
            path,
            applied = result.hunks_applied,
            rejected = result.hunks_rejected,
            "diff applied to buffer"
        );

        if !result.success {
            return Ok(result);
        }

        if options.dry_run {
            result.preview = Some(outcome.new_text);
            return Ok(result);
        }

        if options.create_backup {
            let backup = backup_path(path, chrono::Utc::now().timestamp_millis());
            self.store.write(&backup, &original).await?;
            result.backup_path = Some(backup);
        }
        self.store.write(path, &outcome.new_text).await?;
        info!(path, hunks = result.hunks_applied, "file patched");

        if options.validate_syntax {
            if let Some(validator) = &self.validator {
                let report = validator.check(path, &outcome.new_text).await;
                if !report.valid {
                    warn!(path, errors = report.errors.len(), "syntax check failed after apply");
                }
                result.syntax_valid = Some(report.valid);
                result.syntax_errors = report.errors;
            }
        }

        if options.notify_after_write {
            if let Some(notifier) = &self.notifier {
                if let Err(err) = notifier.file_written(path, &outcome.new_text).await {
                    warn!(path, error = %err, "post-apply notification failed");
                    result
                        .warnings
                        .push(format!("post-apply notification failed: {err:#}"));
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use patchkit_store::{MemoryTextStore, StoreError, SyntaxReport};
    use pretty_assertions::assert_eq;

    use super::*;

    const DIFF: &str = "--- a/f.txt\n+++ b/f.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+b2\n c\n";

    fn engine_with(files: &[(&str, &str)]) -> (Arc<MemoryTextStore>, PatchEngine) {
        let store = Arc::new(MemoryTextStore::with_files(files.iter().copied()));
        let engine = PatchEngine::new(store.clone());
        (store, engine)
    }

    #[tokio::test]
    async fn test_apply_writes_through_store() {
        let (store, engine) = engine_with(&[("f.txt", "a\nb\nc\n")]);
        let result = engine
            .apply_to_file("f.txt", DIFF, &ApplyOptions::default())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.path.as_deref(), Some("f.txt"));
        assert_eq!(store.get("f.txt").unwrap(), "a\nb2\nc\n");
        assert!(result.backup_path.is_none());
    }

    #[tokio::test]
    async fn test_backup_written_before_modification() {
        let (store, engine) = engine_with(&[("f.txt", "a\nb\nc\n")]);
        let options = ApplyOptions {
            create_backup: true,
            ..Default::default()
        };
        let result = engine
            .apply_to_file("f.txt", DIFF, &options)
            .await
            .unwrap();
        let backup = result.backup_path.unwrap();
        assert!(backup.starts_with("f.txt.backup."), "{backup}");
        assert_eq!(store.get(&backup).unwrap(), "a\nb\nc\n");
        assert_eq!(store.get("f.txt").unwrap(), "a\nb2\nc\n");
    }

    #[tokio::test]
    async fn test_dry_run_previews_without_writing() {
        let (store, engine) = engine_with(&[("f.txt", "a\nb\nc\n")]);
        let options = ApplyOptions {
            dry_run: true,
            create_backup: true,
            ..Default::default()
        };
        let result = engine
            .apply_to_file("f.txt", DIFF, &options)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.preview.as_deref(), Some("a\nb2\nc\n"));
        assert!(result.backup_path.is_none());
        assert_eq!(store.get("f.txt").unwrap(), "a\nb\nc\n");
        assert_eq!(store.paths(), vec!["f.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_apply_leaves_file_untouched() {
        let (store, engine) = engine_with(&[("f.txt", "a\nX\nc\n")]);
        let result = engine
            .apply_to_file("f.txt", DIFF, &ApplyOptions::default())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.hunks_rejected, 1);
        assert_eq!(store.get("f.txt").unwrap(), "a\nX\nc\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_store_error() {
        let (_store, engine) = engine_with(&[]);
        let err = engine
            .apply_to_file("absent.txt", DIFF, &ApplyOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransactionError::Store(StoreError::NotFound { .. })
        ));
    }

    struct RejectingValidator;

    #[async_trait]
    impl SyntaxValidator for RejectingValidator {
        async fn check(&self, _path: &str, _text: &str) -> SyntaxReport {
            SyntaxReport::invalid(vec!["unbalanced brace".to_string()])
        }
    }

    #[tokio::test]
    async fn test_syntax_report_recorded_but_write_stands() {
        let store = Arc::new(MemoryTextStore::with_files([("f.txt", "a\nb\nc\n")]));
        let engine =
            PatchEngine::new(store.clone()).with_validator(Arc::new(RejectingValidator));
        let options = ApplyOptions {
            validate_syntax: true,
            ..Default::default()
        };
        let result = engine
            .apply_to_file("f.txt", DIFF, &options)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.syntax_valid, Some(false));
        assert_eq!(result.syntax_errors, vec!["unbalanced brace".to_string()]);
        assert_eq!(store.get("f.txt").unwrap(), "a\nb2\nc\n");
    }

    struct FailingNotifier;

    #[async_trait]
    impl PostApplyNotifier for FailingNotifier {
        async fn file_written(&self, _path: &str, _text: &str) -> anyhow::Result<()> {
            anyhow::bail!("editor went away")
        }
    }

    #[tokio::test]
    async fn test_notifier_failure_is_only_a_warning() {
        let store = Arc::new(MemoryTextStore::with_files([("f.txt", "a\nb\nc\n")]));
        let engine = PatchEngine::new(store.clone()).with_notifier(Arc::new(FailingNotifier));
        let options = ApplyOptions {
            notify_after_write: true,
            ..Default::default()
        };
        let result = engine
            .apply_to_file("f.txt", DIFF, &options)
            .await
            .unwrap();
        assert!(result.success);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("notification failed")));
        assert_eq!(store.get("f.txt").unwrap(), "a\nb2\nc\n");
    }
}
