//! Patch transactions over a text store.
//!
//! [`PatchEngine`] applies one diff to one file, with backup, optional
//! syntax validation, and post-write notification. [`PatchCoordinator`]
//! runs multi-file batches on top of it: priority ordering, stop-on-failure
//! or continue-on-error policies, and atomic all-or-nothing batches with
//! backup-based rollback.

mod coordinator;
mod engine;
mod error;

pub use coordinator::{PatchCoordinator, PatchFile, PatchInput, PatchOptions, PatchResult};
pub use engine::PatchEngine;
pub use error::TransactionError;
