//! Approximate block-matching applier.
//!
//! Instead of validating declared line positions, this applier first replays
//! the hunks against a copy of the original to synthesize the *intended*
//! result (anchoring each hunk by seeking its old-side lines near the
//! declared position, never rejecting on mismatch), then re-derives the
//! change as context-anchored block edits from a whole-text diff, and
//! finally locates each block in the target with a bounded fuzzy search.
//! This tolerates line-number drift from unrelated intervening edits at the
//! cost of weaker auditability than [`crate::ExactApplier`].
//!
//! A leading byte-order mark is stripped before any line arithmetic and
//! restored on output.

use similar::{DiffTag, TextDiff};
use tracing::debug;

use crate::applier::{restore_bom, split_bom, Applier, ApplyOutcome};
use crate::options::ApplyOptions;
use crate::parser::{LineKind, ParsedDiff, ParsedHunk};
use crate::result::{AppliedHunk, DiffResult, RejectedHunk};

/// Context lines kept on each side of a block edit as its anchor.
const BLOCK_CONTEXT: usize = 2;

pub struct BlockApplier;

/// A block edit derived from the original-vs-intended diff. `pattern` and
/// `replacement` include the anchoring context lines.
#[derive(Debug, Clone)]
struct BlockPatch {
    /// Expected 0-based position of `pattern` in the original lines.
    approx_start: usize,
    pattern: Vec<String>,
    replacement: Vec<String>,
    /// Original-line range this block covers, for hunk attribution.
    old_range: (usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockOutcome {
    Applied { location: usize, score: f32 },
    Rejected,
    Skipped,
}

impl Applier for BlockApplier {
    fn apply(&self, text: &str, diff: &ParsedDiff, options: &ApplyOptions) -> ApplyOutcome {
        let (had_bom, text) = split_bom(text);
        let original: Vec<String> = text.split('\n').map(str::to_string).collect();

        let intended = replay(&original, &diff.hunks, options.max_search_distance);
        let blocks = block_patches(&original, &intended);

        let mut work = original.clone();
        let mut outcomes = vec![BlockOutcome::Skipped; blocks.len()];
        let mut warnings: Vec<String> = Vec::new();
        let mut halted = false;

        // Bottom-to-top so earlier block positions stay valid.
        let mut order: Vec<usize> = (0..blocks.len()).collect();
        order.sort_by(|&a, &b| blocks[b].approx_start.cmp(&blocks[a].approx_start));

        for block_idx in order {
            if halted {
                break;
            }
            let block = &blocks[block_idx];
            match seek_block(&work, block, options) {
                Some((location, score)) => {
                    let end = location + block.pattern.len();
                    work.splice(location..end, block.replacement.iter().cloned());
                    outcomes[block_idx] = BlockOutcome::Applied { location, score };
                    if score < 1.0 {
                        warnings.push(format!(
                            "fuzzy matched block near line {} at line {} ({:.0}% similarity)",
                            block.approx_start + 1,
                            location + 1,
                            score * 100.0
                        ));
                    } else if location != block.approx_start {
                        debug!(
                            expected = block.approx_start + 1,
                            found = location + 1,
                            "block drifted from its declared position"
                        );
                    }
                }
                None => {
                    outcomes[block_idx] = BlockOutcome::Rejected;
                    if options.stop_on_first_error {
                        halted = true;
                    }
                }
            }
        }

        let (applied, rejected) =
            per_hunk_results(&diff.hunks, &blocks, &outcomes, original.len(), options);

        let result = DiffResult::from_hunks(
            diff.hunks.len(),
            applied,
            rejected,
            warnings,
            options.allow_partial,
        );
        ApplyOutcome {
            new_text: restore_bom(had_bom, work.join("\n")),
            result,
        }
    }
}

/// Replay every hunk against a copy of the original, bottom-to-top, without
/// rejecting on mismatch. Each hunk is anchored by seeking its old-side line
/// sequence near the declared position; when the seek finds nothing, the
/// declared position is used as-is. The result is the text the diff
/// *intends* to produce.
fn replay(original: &[String], hunks: &[ParsedHunk], max_distance: usize) -> Vec<String> {
    let mut lines = original.to_vec();

    let mut order: Vec<usize> = (0..hunks.len()).collect();
    order.sort_by(|&a, &b| hunks[b].old_start.cmp(&hunks[a].old_start).then(b.cmp(&a)));

    for idx in order {
        let hunk = &hunks[idx];
        let old_side: Vec<&str> = hunk
            .lines
            .iter()
            .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Remove))
            .map(|l| l.content.as_str())
            .collect();
        let declared = hunk_anchor(hunk, lines.len());
        let start = seek_anchor(&lines, &old_side, declared, max_distance).unwrap_or(declared);

        let mut pos = start;
        let mut new_region: Vec<String> = Vec::new();
        for diff_line in &hunk.lines {
            match diff_line.kind {
                LineKind::Context => {
                    // Prefer the buffer's own line where one exists.
                    if pos < lines.len() {
                        new_region.push(lines[pos].clone());
                    } else {
                        new_region.push(diff_line.content.clone());
                    }
                    pos += 1;
                }
                LineKind::Remove => pos += 1,
                LineKind::Add => new_region.push(diff_line.content.clone()),
            }
        }
        let end = pos.min(lines.len());
        lines.splice(start..end, new_region);
    }
    lines
}

/// 0-based anchor index for a hunk (shared convention with the exact applier).
fn hunk_anchor(hunk: &ParsedHunk, line_count: usize) -> usize {
    let has_old_side = hunk
        .lines
        .iter()
        .any(|l| matches!(l.kind, LineKind::Context | LineKind::Remove));
    if has_old_side {
        hunk.old_start.saturating_sub(1).min(line_count)
    } else {
        hunk.old_start.min(line_count)
    }
}

/// Find `pattern` in `lines` near `around`, trying decreasing strictness:
/// exact equality, then trailing-whitespace-insensitive, then fully trimmed.
/// Within each pass, positions are tried nearest-first and the search stops
/// at `max_distance` lines from `around`.
fn seek_anchor(
    lines: &[String],
    pattern: &[&str],
    around: usize,
    max_distance: usize,
) -> Option<usize> {
    if pattern.is_empty() || pattern.len() > lines.len() {
        return None;
    }
    let last = lines.len() - pattern.len();
    let around = around.min(last);

    let passes: [fn(&str, &str) -> bool; 3] = [
        |a, b| a == b,
        |a, b| a.trim_end() == b.trim_end(),
        |a, b| a.trim() == b.trim(),
    ];
    for matches in passes {
        for candidate in candidates_by_distance(around, last, max_distance) {
            if pattern
                .iter()
                .enumerate()
                .all(|(i, pat)| matches(&lines[candidate + i], pat))
            {
                return Some(candidate);
            }
        }
    }
    None
}

/// Candidate start positions ordered by distance from `around`, capped at
/// `max_distance` and clamped to `0..=last`.
fn candidates_by_distance(
    around: usize,
    last: usize,
    max_distance: usize,
) -> impl Iterator<Item = usize> {
    (0..=max_distance).flat_map(move |distance| {
        let below = around.checked_sub(distance);
        let above = if distance == 0 {
            None
        } else {
            Some(around + distance).filter(|&c| c <= last)
        };
        below.into_iter().chain(above)
    })
}

/// Convert the original-vs-intended line diff into context-anchored blocks.
fn block_patches(original: &[String], intended: &[String]) -> Vec<BlockPatch> {
    let old_refs: Vec<&str> = original.iter().map(String::as_str).collect();
    let new_refs: Vec<&str> = intended.iter().map(String::as_str).collect();
    let diff = TextDiff::from_slices(&old_refs, &new_refs);
    let mut blocks = Vec::new();

    for group in diff.grouped_ops(BLOCK_CONTEXT) {
        let first = match group.first() {
            Some(op) => op,
            None => continue,
        };
        let last = group.last().unwrap();
        let old_start = first.old_range().start;
        let old_end = last.old_range().end;

        let mut pattern = Vec::new();
        let mut replacement = Vec::new();
        for op in &group {
            match op.tag() {
                DiffTag::Equal => {
                    pattern.extend(original[op.old_range()].iter().cloned());
                    replacement.extend(original[op.old_range()].iter().cloned());
                }
                DiffTag::Delete => {
                    pattern.extend(original[op.old_range()].iter().cloned());
                }
                DiffTag::Insert => {
                    replacement.extend(intended[op.new_range()].iter().cloned());
                }
                DiffTag::Replace => {
                    pattern.extend(original[op.old_range()].iter().cloned());
                    replacement.extend(intended[op.new_range()].iter().cloned());
                }
            }
        }

        blocks.push(BlockPatch {
            approx_start: old_start,
            pattern,
            replacement,
            old_range: (old_start, old_end),
        });
    }
    blocks
}

/// Search for the block's pattern near its expected position, widening the
/// distance one line at a time up to `max_search_distance`. Returns the
/// first location whose similarity clears the threshold: a perfect match in
/// exact mode, or the scaled fuzzy tolerance otherwise.
fn seek_block(work: &[String], block: &BlockPatch, options: &ApplyOptions) -> Option<(usize, f32)> {
    if block.pattern.is_empty() {
        return Some((block.approx_start.min(work.len()), 1.0));
    }
    if block.pattern.len() > work.len() {
        return None;
    }
    let last = work.len() - block.pattern.len();
    let around = block.approx_start.min(last);
    let pattern_norm: Vec<String> = block.pattern.iter().map(|l| options.normalize(l)).collect();
    let threshold = options.fuzzy_threshold();

    for candidate in candidates_by_distance(around, last, options.max_search_distance) {
        let window: Vec<String> = work[candidate..candidate + block.pattern.len()]
            .iter()
            .map(|l| options.normalize(l))
            .collect();
        if window == pattern_norm {
            return Some((candidate, 1.0));
        }
        if let Some(min_score) = threshold {
            // Character-level similarity: line-level is too coarse.
            let score = TextDiff::from_chars(
                pattern_norm.join("\n").as_str(),
                window.join("\n").as_str(),
            )
            .ratio();
            if score >= min_score {
                return Some((candidate, score));
            }
        }
    }
    None
}

/// Derive per-hunk outcomes by attributing each block to the hunk whose
/// original-line range overlaps it most. A hunk whose blocks all applied is
/// applied; a hunk owning a rejected block is rejected; a hunk with no
/// blocks changed nothing the final text disagrees with.
fn per_hunk_results(
    hunks: &[ParsedHunk],
    blocks: &[BlockPatch],
    outcomes: &[BlockOutcome],
    original_len: usize,
    options: &ApplyOptions,
) -> (Vec<AppliedHunk>, Vec<RejectedHunk>) {
    let ranges: Vec<(usize, usize)> = hunks
        .iter()
        .map(|h| {
            let start = hunk_anchor(h, original_len);
            (start, start + h.counted_old_lines())
        })
        .collect();

    // owner[block] = hunk index with the largest overlap; ties go to the
    // earlier hunk.
    let owner: Vec<Option<usize>> = blocks
        .iter()
        .map(|block| {
            let best = ranges
                .iter()
                .enumerate()
                .map(|(i, &(lo, hi))| (i, overlap((lo, hi), block.old_range)))
                .filter(|&(_, len)| len > 0)
                .max_by_key(|&(i, len)| (len, usize::MAX - i))
                .map(|(i, _)| i);
            // Zero-width hunk ranges (pure insertions) can miss their
            // block's context-widened range; fall back to the nearest hunk
            // so a rejected block is never silently unattributed.
            best.or_else(|| {
                ranges
                    .iter()
                    .enumerate()
                    .min_by_key(|&(_, &range)| gap(range, block.old_range))
                    .map(|(i, _)| i)
            })
        })
        .collect();

    let mut applied = Vec::new();
    let mut rejected = Vec::new();

    for (hunk_idx, hunk) in hunks.iter().enumerate() {
        let owned: Vec<usize> = (0..blocks.len())
            .filter(|&b| owner[b] == Some(hunk_idx))
            .collect();

        if let Some(&failed) = owned
            .iter()
            .find(|&&b| outcomes[b] == BlockOutcome::Rejected)
        {
            let block = &blocks[failed];
            rejected.push(RejectedHunk {
                hunk_index: hunk_idx,
                reason: format!(
                    "no block match within {} lines of line {}",
                    options.max_search_distance,
                    block.approx_start + 1
                ),
                expected_context: block.pattern.clone(),
                actual_context: Vec::new(),
                suggestion: Some(
                    "The target has drifted too far from the diff's context; regenerate \
                     the diff or raise the fuzz factor"
                        .to_string(),
                ),
            });
            continue;
        }
        if owned.iter().any(|&b| outcomes[b] == BlockOutcome::Skipped) {
            // Halted before this hunk's blocks were attempted.
            continue;
        }

        let start_line = owned
            .iter()
            .filter_map(|&b| match outcomes[b] {
                BlockOutcome::Applied { location, .. } => Some(location + 1),
                _ => None,
            })
            .min()
            .unwrap_or(hunk.old_start);
        applied.push(AppliedHunk {
            hunk_index: hunk_idx,
            start_line,
            lines_removed: hunk
                .lines
                .iter()
                .filter(|l| l.kind == LineKind::Remove)
                .count(),
            lines_added: hunk
                .lines
                .iter()
                .filter(|l| l.kind == LineKind::Add)
                .count(),
        });
    }

    (applied, rejected)
}

fn overlap(a: (usize, usize), b: (usize, usize)) -> usize {
    let lo = a.0.max(b.0);
    let hi = a.1.min(b.1);
    hi.saturating_sub(lo)
}

/// Lines separating two ranges; zero when they touch or overlap.
fn gap(a: (usize, usize), b: (usize, usize)) -> usize {
    if a.0 > b.1 {
        a.0 - b.1
    } else if b.0 > a.1 {
        b.0 - a.1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse;

    fn apply(text: &str, diff_text: &str, options: &ApplyOptions) -> ApplyOutcome {
        let diffs = parse(diff_text).unwrap();
        BlockApplier.apply(text, &diffs[0], options)
    }

    #[test]
    fn test_simple_replacement() {
        let text = "a\nb\nc\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+b2\n c\n";
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert!(outcome.result.success);
        assert_eq!(outcome.new_text, "a\nb2\nc\n");
        assert_eq!(outcome.result.hunks_applied, 1);
    }

    #[test]
    fn test_tolerates_line_number_drift() {
        // The diff was built before three unrelated lines were inserted
        // above; the declared positions are all off by three.
        let text = "x1\nx2\nx3\na\nb\nc\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+b2\n c\n";
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert!(
            outcome.result.success,
            "rejected: {:?}",
            outcome.result.rejected
        );
        assert_eq!(outcome.new_text, "x1\nx2\nx3\na\nb2\nc\n");
    }

    #[test]
    fn test_drift_rejected_by_exact_applier_for_contrast() {
        use crate::exact::ExactApplier;

        let text = "x1\nx2\nx3\na\nb\nc\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+b2\n c\n";
        let diffs = parse(diff).unwrap();
        let outcome = ExactApplier.apply(text, &diffs[0], &ApplyOptions::default());
        assert!(!outcome.result.success);
    }

    #[test]
    fn test_multiple_hunks_report_individually() {
        let text = "a\nb\nc\nd\ne\nf\ng\nh\ni\nj\n";
        let diff = concat!(
            "--- a/f\n+++ b/f\n",
            "@@ -1,3 +1,3 @@\n a\n-b\n+b2\n c\n",
            "@@ -8,3 +8,3 @@\n h\n-i\n+i2\n j\n",
        );
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert!(outcome.result.success);
        assert_eq!(outcome.result.hunks_applied, 2);
        assert_eq!(outcome.new_text, "a\nb2\nc\nd\ne\nf\ng\nh\ni2\nj\n");
        let indices: Vec<usize> = outcome
            .result
            .applied
            .iter()
            .map(|h| h.hunk_index)
            .collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_already_applied_diff_is_a_noop() {
        // Unlike the exact applier, re-running an applied diff converges:
        // the replayed intent equals the current text, so no blocks remain.
        let text = "a\nb2\nc\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+b2\n c\n";
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert!(outcome.result.success);
        assert_eq!(outcome.new_text, text);
    }

    #[test]
    fn test_bom_stripped_and_restored() {
        let with_bom = "\u{feff}a\nb\nc\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+b2\n c\n";
        let outcome = apply(with_bom, diff, &ApplyOptions::default());
        assert!(outcome.result.success);
        assert_eq!(outcome.new_text, "\u{feff}a\nb2\nc\n");

        // Same input without the BOM produces identical content.
        let outcome_plain = apply("a\nb\nc\n", diff, &ApplyOptions::default());
        assert_eq!(
            outcome.new_text.strip_prefix('\u{feff}').unwrap(),
            outcome_plain.new_text
        );
    }

    #[test]
    fn test_block_patches_carry_context_anchors() {
        let original: Vec<String> =
            ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        let intended: Vec<String> =
            ["a", "b", "C", "d", "e"].iter().map(|s| s.to_string()).collect();
        let blocks = block_patches(&original, &intended);
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.pattern, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(block.replacement, vec!["a", "b", "C", "d", "e"]);
        assert_eq!(block.approx_start, 0);
        assert_eq!(block.old_range, (0, 5));
    }

    #[test]
    fn test_seek_anchor_decreasing_strictness() {
        let lines: Vec<String> = vec!["foo   ".into(), "  bar".into(), "baz".into()];
        // Exact fails, rstrip matches "foo".
        assert_eq!(seek_anchor(&lines, &["foo"], 0, 10), Some(0));
        // Only a full trim matches "bar".
        assert_eq!(seek_anchor(&lines, &["bar", "baz"], 0, 10), Some(1));
        // Pattern longer than input cannot match.
        assert_eq!(seek_anchor(&lines, &["a", "b", "c", "d"], 0, 10), None);
        assert_eq!(seek_anchor(&lines, &["missing"], 0, 10), None);
    }

    #[test]
    fn test_seek_block_respects_distance_bound() {
        let work: Vec<String> = (0..50).map(|i| format!("line{i}")).collect();
        let block = BlockPatch {
            approx_start: 0,
            pattern: vec!["line40".into(), "line41".into()],
            replacement: vec!["changed".into()],
            old_range: (0, 2),
        };
        let near = ApplyOptions {
            max_search_distance: 10,
            ..Default::default()
        };
        assert_eq!(seek_block(&work, &block, &near), None);

        let far = ApplyOptions {
            max_search_distance: 45,
            ..Default::default()
        };
        assert_eq!(seek_block(&work, &block, &far), Some((40, 1.0)));
    }

    #[test]
    fn test_seek_block_fuzzy_threshold() {
        let work: Vec<String> = vec!["let y = 10;".into(), "keep".into()];
        let block = BlockPatch {
            approx_start: 0,
            pattern: vec!["let x = 10;".into(), "keep".into()],
            replacement: vec!["let x = 11;".into(), "keep".into()],
            old_range: (0, 2),
        };
        // Exact mode: no perfect match anywhere.
        assert_eq!(seek_block(&work, &block, &ApplyOptions::default()), None);

        let fuzzy = ApplyOptions {
            fuzz_factor: 80,
            ..Default::default()
        };
        let (location, score) = seek_block(&work, &block, &fuzzy).unwrap();
        assert_eq!(location, 0);
        assert!(score >= 0.8 && score < 1.0);
    }

    #[test]
    fn test_replay_is_forgiving() {
        let original: Vec<String> = vec!["a".into(), "b".into(), "c".into(), "".into()];
        let diffs = parse("--- a/f\n+++ b/f\n@@ -2,2 +2,2 @@\n-b\n+B\n c\n").unwrap();
        let intended = replay(&original, &diffs[0].hunks, 200);
        assert_eq!(intended, vec!["a", "B", "c", ""]);
    }

    #[test]
    fn test_hunk_beyond_end_is_replayed_at_end() {
        // Declared far past EOF; replay clamps and the adds land at the end.
        let text = "a\nb\n";
        let diff = "--- a/f\n+++ b/f\n@@ -40,0 +41,1 @@\n+tail\n";
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert!(outcome.result.success);
        assert_eq!(outcome.new_text, "a\nb\n\ntail");
    }
}
