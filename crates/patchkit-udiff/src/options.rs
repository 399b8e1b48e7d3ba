//! Per-call apply options.
//!
//! Every apply call takes an owned [`ApplyOptions`] value; there is no shared
//! engine configuration, so concurrent callers cannot leak settings into each
//! other.

use serde::{Deserialize, Serialize};

/// Which hunk application algorithm to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStrategy {
    /// Literal line-position walking with context validation. Deterministic
    /// and auditable; intended for diffs built against known-good content.
    #[default]
    Exact,
    /// Whole-text block diffing with bounded fuzzy search. Tolerates
    /// line-number drift from unrelated intervening edits.
    Block,
}

/// Options controlling a single diff application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyOptions {
    /// Algorithm selection.
    pub strategy: ApplyStrategy,
    /// Fuzzy tolerance 0-100. Zero requires exact context matches; a nonzero
    /// value accepts a mismatched line whose similarity percentage is at
    /// least this threshold.
    pub fuzz_factor: u8,
    /// Collapse whitespace runs and trim before comparing context lines.
    pub ignore_whitespace: bool,
    /// Lowercase both sides before comparing context lines.
    pub ignore_case: bool,
    /// Back up the current content through the text store before writing.
    pub create_backup: bool,
    /// Run the syntax validator after a successful, non-dry-run apply.
    pub validate_syntax: bool,
    /// Compute the result without writing; the new text is returned as a
    /// preview instead.
    pub dry_run: bool,
    /// Treat the apply as successful if at least one hunk applied.
    pub allow_partial: bool,
    /// Stop processing remaining hunks after the first rejection.
    pub stop_on_first_error: bool,
    /// Invoke the post-apply notifier after writes. Consumed by the
    /// transaction layer, not by the appliers themselves.
    pub notify_after_write: bool,
    /// Maximum line distance the block applier searches either side of a
    /// block's expected position.
    pub max_search_distance: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            strategy: ApplyStrategy::Exact,
            fuzz_factor: 0,
            ignore_whitespace: false,
            ignore_case: false,
            create_backup: false,
            validate_syntax: false,
            dry_run: false,
            allow_partial: false,
            stop_on_first_error: false,
            notify_after_write: false,
            max_search_distance: 200,
        }
    }
}

impl ApplyOptions {
    /// Normalize a line for context comparison under these options.
    pub(crate) fn normalize(&self, line: &str) -> String {
        let mut out = if self.ignore_whitespace {
            line.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            line.to_string()
        };
        if self.ignore_case {
            out = out.to_lowercase();
        }
        out
    }

    /// Minimum similarity (0.0-1.0) a fuzzy candidate must reach, or `None`
    /// when only perfect matches are acceptable.
    pub(crate) fn fuzzy_threshold(&self) -> Option<f32> {
        if self.fuzz_factor == 0 {
            None
        } else {
            Some(f32::from(self.fuzz_factor.min(100)) / 100.0)
        }
    }
}
