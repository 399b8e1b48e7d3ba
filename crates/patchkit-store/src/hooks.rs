//! Optional post-apply hooks: syntax validation and write notification.

use async_trait::async_trait;

/// Result of checking a buffer's syntax after a patch has been applied.
#[derive(Debug, Clone)]
pub struct SyntaxReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl SyntaxReport {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Language-aware syntax checker consulted after an apply.
///
/// The engine records the report on the result; a failed check never
/// reverts a write on its own.
#[async_trait]
pub trait SyntaxValidator: Send + Sync {
    async fn check(&self, path: &str, text: &str) -> SyntaxReport;
}

/// Receives a notification after the engine writes a file.
///
/// Errors are logged and swallowed by the engine; a broken notifier must
/// not turn a successful apply into a failure.
#[async_trait]
pub trait PostApplyNotifier: Send + Sync {
    async fn file_written(&self, path: &str, text: &str) -> anyhow::Result<()>;
}
