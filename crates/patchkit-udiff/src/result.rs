//! Structured per-hunk and per-file apply results.
//!
//! Hunk outcomes are data, not errors: a rejected hunk lands in
//! [`DiffResult::rejected`] and the call still returns normally.

use serde::{Deserialize, Serialize};

/// A hunk that was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedHunk {
    /// 0-based index of the hunk within its diff.
    pub hunk_index: usize,
    /// 1-based line in the original text where the hunk took effect.
    pub start_line: usize,
    /// Number of lines removed.
    pub lines_removed: usize,
    /// Number of lines added.
    pub lines_added: usize,
}

/// A hunk that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedHunk {
    /// 0-based index of the hunk within its diff.
    pub hunk_index: usize,
    /// Human-readable reason, e.g. `context mismatch at line 12`.
    pub reason: String,
    /// Window of context lines the diff expected around the failure.
    pub expected_context: Vec<String>,
    /// Window of lines actually present in the target around the failure.
    pub actual_context: Vec<String>,
    /// Actionable hint for the caller.
    pub suggestion: Option<String>,
}

/// Aggregate result of applying one diff to one text buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// True when every hunk applied, or when partial application was allowed
    /// and at least one hunk applied.
    pub success: bool,
    /// Target path, when known to the caller.
    pub path: Option<String>,
    pub hunks_total: usize,
    pub hunks_applied: usize,
    pub hunks_rejected: usize,
    pub applied: Vec<AppliedHunk>,
    pub rejected: Vec<RejectedHunk>,
    /// Non-fatal notes, e.g. fuzzy match acceptances.
    pub warnings: Vec<String>,
    /// Where the pre-apply content was backed up, if a backup was taken.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    /// The would-be new text, populated on dry runs instead of writing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Result of the optional post-apply syntax validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax_valid: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub syntax_errors: Vec<String>,
}

impl DiffResult {
    /// Build a result from per-hunk outcomes, computing the success flag.
    pub(crate) fn from_hunks(
        hunks_total: usize,
        applied: Vec<AppliedHunk>,
        rejected: Vec<RejectedHunk>,
        warnings: Vec<String>,
        allow_partial: bool,
    ) -> Self {
        let success = applied.len() == hunks_total || (allow_partial && !applied.is_empty());
        Self {
            success,
            path: None,
            hunks_total,
            hunks_applied: applied.len(),
            hunks_rejected: rejected.len(),
            applied,
            rejected,
            warnings,
            backup_path: None,
            preview: None,
            syntax_valid: None,
            syntax_errors: Vec::new(),
        }
    }
}
