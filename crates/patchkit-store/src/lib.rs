//! Storage and hook seams for the patch engine.
//!
//! The engine core is pure text-in/text-out; everything that touches the
//! outside world lives behind the traits in this crate:
//!
//! - [`TextStore`] — where file contents are read from and written to.
//!   [`FsTextStore`] is the real filesystem, confined to a root directory;
//!   [`MemoryTextStore`] backs tests and previews.
//! - [`SyntaxValidator`] — optional post-apply syntax checking.
//! - [`PostApplyNotifier`] — optional post-write notification (editors,
//!   watchers). Notifier failures are advisory and never fail an apply.

mod error;
mod fs;
mod hooks;
mod memory;

pub use error::StoreError;
pub use fs::FsTextStore;
pub use hooks::{PostApplyNotifier, SyntaxReport, SyntaxValidator};
pub use memory::MemoryTextStore;

use async_trait::async_trait;

/// Storage backend for text files, addressed by store-relative path.
#[async_trait]
pub trait TextStore: Send + Sync {
    /// Read the full contents of a file.
    async fn read(&self, path: &str) -> Result<String, StoreError>;

    /// Write `text` to a file, replacing any previous contents.
    async fn write(&self, path: &str, text: &str) -> Result<(), StoreError>;

    /// Remove a file. Removing a missing file is an error.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Whether a file exists.
    async fn exists(&self, path: &str) -> Result<bool, StoreError>;
}

/// Sibling path a backup is written to before a file is modified.
///
/// The original stays readable under its own name while the backup carries
/// the pre-apply contents and a millisecond timestamp.
pub fn backup_path(path: &str, timestamp_millis: i64) -> String {
    format!("{path}.backup.{timestamp_millis}")
}
