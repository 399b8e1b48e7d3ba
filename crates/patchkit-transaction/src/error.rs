use patchkit_store::StoreError;
use patchkit_udiff::ParseError;
use thiserror::Error;

/// Failures surfaced by the engine and coordinator.
///
/// Per-hunk rejections are not errors; they live on
/// [`DiffResult`](patchkit_udiff::DiffResult). An error here means the
/// operation itself could not run, or an atomic batch aborted.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("invalid patch input: {0}")]
    Input(String),

    #[error("atomic batch aborted at '{failed_path}': {reason}; rolled back {} file(s)", rolled_back.len())]
    Atomic {
        failed_path: String,
        reason: String,
        rolled_back: Vec<String>,
    },
}

impl From<serde_json::Error> for TransactionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Input(err.to_string())
    }
}
