//! The applier seam: one contract, two algorithms.
//!
//! [`ExactApplier`] walks declared line positions and validates context;
//! [`BlockApplier`] re-derives block edits from the whole text and locates
//! them with a bounded fuzzy search. Callers pick one per call through
//! [`ApplyStrategy`] in the options.

use crate::approx::BlockApplier;
use crate::error::ParseError;
use crate::exact::ExactApplier;
use crate::options::{ApplyOptions, ApplyStrategy};
use crate::parser::{parse, ParsedDiff};
use crate::result::DiffResult;

/// UTF-8 byte-order mark. Stripped before any line arithmetic and restored
/// on output so it cannot corrupt positions or context comparisons.
pub(crate) const BOM: &str = "\u{feff}";

/// Split a leading BOM off the input, remembering whether it was present.
pub(crate) fn split_bom(text: &str) -> (bool, &str) {
    match text.strip_prefix(BOM) {
        Some(rest) => (true, rest),
        None => (false, text),
    }
}

/// Re-prepend the BOM only if the input carried one.
pub(crate) fn restore_bom(had_bom: bool, text: String) -> String {
    if had_bom {
        format!("{BOM}{text}")
    } else {
        text
    }
}

/// Outcome of applying one diff to one buffer: the new text plus the
/// structured per-hunk report. Appliers never touch storage.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub new_text: String,
    pub result: DiffResult,
}

/// A hunk application algorithm.
pub trait Applier: Send + Sync {
    /// Apply `diff` to `text`, returning the new text and per-hunk results.
    fn apply(&self, text: &str, diff: &ParsedDiff, options: &ApplyOptions) -> ApplyOutcome;
}

/// Select the applier implementation for a strategy.
pub fn applier_for(strategy: ApplyStrategy) -> &'static dyn Applier {
    match strategy {
        ApplyStrategy::Exact => &ExactApplier,
        ApplyStrategy::Block => &BlockApplier,
    }
}

/// Parse `diff_text` and apply its first file section to `text`.
///
/// Convenience entry point for callers holding raw diff text.
pub fn apply_diff(
    text: &str,
    diff_text: &str,
    options: &ApplyOptions,
) -> Result<ApplyOutcome, ParseError> {
    let diffs = parse(diff_text)?;
    let diff = diffs.first().ok_or(ParseError::NoDiffContent)?;
    Ok(applier_for(options.strategy).apply(text, diff, options))
}
