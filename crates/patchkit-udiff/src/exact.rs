//! Exact/context-matching applier.
//!
//! Applies hunks at their declared positions, validating every context and
//! remove line against the target buffer. Hunks are processed bottom-to-top
//! (descending `old_start`) so an applied hunk never shifts the position of
//! one not yet processed. Deterministic and auditable: the only tolerated
//! drift is what the options explicitly allow (whitespace, case, fuzzy
//! similarity).

use tracing::debug;

use crate::applier::{restore_bom, split_bom, Applier, ApplyOutcome};
use crate::options::ApplyOptions;
use crate::parser::{DiffLine, LineKind, ParsedDiff, ParsedHunk};
use crate::result::{AppliedHunk, DiffResult, RejectedHunk};
use crate::similarity::similarity;

/// Lines of surrounding context included in rejection reports.
const REJECT_WINDOW: usize = 2;

pub struct ExactApplier;

impl Applier for ExactApplier {
    fn apply(&self, text: &str, diff: &ParsedDiff, options: &ApplyOptions) -> ApplyOutcome {
        let (had_bom, text) = split_bom(text);
        let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();

        let mut applied: Vec<AppliedHunk> = Vec::new();
        let mut rejected: Vec<RejectedHunk> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        // Bottom-to-top: descending old_start, later hunks first on ties.
        let mut order: Vec<usize> = (0..diff.hunks.len()).collect();
        order.sort_by(|&a, &b| {
            diff.hunks[b]
                .old_start
                .cmp(&diff.hunks[a].old_start)
                .then(b.cmp(&a))
        });

        for idx in order {
            let hunk = &diff.hunks[idx];
            match apply_hunk(&mut lines, hunk, idx, options, &mut warnings) {
                Ok(hunk_result) => applied.push(hunk_result),
                Err(rejection) => {
                    rejected.push(rejection);
                    if options.stop_on_first_error {
                        break;
                    }
                }
            }
        }

        applied.sort_by_key(|h| h.hunk_index);
        rejected.sort_by_key(|h| h.hunk_index);

        let result = DiffResult::from_hunks(
            diff.hunks.len(),
            applied,
            rejected,
            warnings,
            options.allow_partial,
        );
        ApplyOutcome {
            new_text: restore_bom(had_bom, lines.join("\n")),
            result,
        }
    }
}

/// Apply one hunk in place, or explain why it cannot be applied.
fn apply_hunk(
    lines: &mut Vec<String>,
    hunk: &ParsedHunk,
    hunk_index: usize,
    options: &ApplyOptions,
    warnings: &mut Vec<String>,
) -> Result<AppliedHunk, RejectedHunk> {
    let start = hunk_anchor(hunk, lines.len());
    let mut pos = start;
    let mut new_region: Vec<String> = Vec::new();
    let mut lines_removed = 0usize;
    let mut lines_added = 0usize;

    for (body_idx, diff_line) in hunk.lines.iter().enumerate() {
        match diff_line.kind {
            LineKind::Context | LineKind::Remove => {
                if pos >= lines.len() {
                    return Err(reject(
                        hunk,
                        hunk_index,
                        body_idx,
                        lines,
                        pos,
                        "hunk extends beyond end of file".to_string(),
                    ));
                }
                let expected = options.normalize(&diff_line.content);
                let actual = options.normalize(&lines[pos]);
                if expected != actual {
                    match options.fuzzy_threshold() {
                        Some(threshold) => {
                            let score = similarity(&expected, &actual);
                            if score >= threshold {
                                debug!(
                                    hunk = hunk_index,
                                    line = pos + 1,
                                    score,
                                    "accepting fuzzy context match"
                                );
                                warnings.push(format!(
                                    "hunk {} fuzzy matched line {} ({:.0}% similarity)",
                                    hunk_index,
                                    pos + 1,
                                    score * 100.0
                                ));
                            } else {
                                return Err(reject(
                                    hunk,
                                    hunk_index,
                                    body_idx,
                                    lines,
                                    pos,
                                    format!(
                                        "context mismatch at line {} ({:.0}% similarity, below {}%)",
                                        pos + 1,
                                        score * 100.0,
                                        options.fuzz_factor
                                    ),
                                ));
                            }
                        }
                        None => {
                            return Err(reject(
                                hunk,
                                hunk_index,
                                body_idx,
                                lines,
                                pos,
                                format!("context mismatch at line {}", pos + 1),
                            ));
                        }
                    }
                }
                if diff_line.kind == LineKind::Context {
                    // Keep the buffer's own line: under fuzzy or normalized
                    // matching it may differ from the diff's stale context.
                    new_region.push(lines[pos].clone());
                } else {
                    lines_removed += 1;
                }
                pos += 1;
            }
            LineKind::Add => {
                new_region.push(diff_line.content.clone());
                lines_added += 1;
            }
        }
    }

    lines.splice(start..pos, new_region);
    Ok(AppliedHunk {
        hunk_index,
        start_line: hunk.old_start,
        lines_removed,
        lines_added,
    })
}

/// 0-based index where a hunk anchors in the buffer.
///
/// A hunk with no old-side lines (`@@ -N,0 ... @@`) inserts *after* old line
/// N per unified-diff convention, which is index N.
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

/// Build a rejection with expected/actual context windows around the failure.
fn reject(
    hunk: &ParsedHunk,
    hunk_index: usize,
    body_idx: usize,
    lines: &[String],
    pos: usize,
    reason: String,
) -> RejectedHunk {
    let old_side: Vec<&DiffLine> = hunk
        .lines
        .iter()
        .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Remove))
        .collect();
    // Position of the failing line within the old side.
    let old_idx = hunk.lines[..body_idx]
        .iter()
        .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Remove))
        .count();

    let expected_context = window(&old_side, old_idx)
        .iter()
        .map(|l| l.content.clone())
        .collect();
    let actual_context = window(lines, pos).to_vec();

    RejectedHunk {
        hunk_index,
        reason,
        expected_context,
        actual_context,
        suggestion: Some(
            "Regenerate the diff against the current content, or raise the fuzz factor \
             if the drift is cosmetic"
                .to_string(),
        ),
    }
}

fn window<T>(items: &[T], center: usize) -> &[T] {
    let lo = center.saturating_sub(REJECT_WINDOW);
    let hi = (center + REJECT_WINDOW + 1).min(items.len());
    &items[lo.min(hi)..hi]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse;

    fn apply(text: &str, diff_text: &str, options: &ApplyOptions) -> ApplyOutcome {
        let diffs = parse(diff_text).unwrap();
        ExactApplier.apply(text, &diffs[0], options)
    }

    #[test]
    fn test_single_line_replacement() {
        let text = "a\nb\nc\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+b2\n c\n";
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert_eq!(outcome.new_text, "a\nb2\nc\n");
        assert!(outcome.result.success);
        assert_eq!(outcome.result.hunks_applied, 1);
        assert_eq!(outcome.result.hunks_rejected, 0);
        assert_eq!(outcome.result.applied[0].lines_removed, 1);
        assert_eq!(outcome.result.applied[0].lines_added, 1);
    }

    #[test]
    fn test_context_mismatch_rejects() {
        let text = "Y\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,1 +1,1 @@\n-X\n+Z\n";
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert!(!outcome.result.success);
        assert_eq!(outcome.new_text, "Y\n");
        let rejection = &outcome.result.rejected[0];
        assert!(rejection.reason.contains("mismatch"));
        assert_eq!(rejection.expected_context, vec!["X"]);
        assert_eq!(rejection.actual_context[0], "Y");
    }

    #[test]
    fn test_fuzzy_accepts_near_match_with_warning() {
        // One edit over 11 chars is ~91% similar.
        let text = "let y = 10;\nkeep\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n-let x = 10;\n+let x = 11;\n keep\n";
        let options = ApplyOptions {
            fuzz_factor: 90,
            ..Default::default()
        };
        let outcome = apply(text, diff, &options);
        assert!(outcome.result.success);
        assert_eq!(outcome.new_text, "let x = 11;\nkeep\n");
        assert!(outcome.result.warnings[0].contains("fuzzy"));
    }

    #[test]
    fn test_fuzzy_threshold_boundary() {
        let text = "let y = 10;\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,1 +1,1 @@\n-let x = 10;\n+let x = 11;\n";
        // 91% similar: rejected at fuzz 0 and at fuzz 95, accepted at 90.
        for (fuzz, expect_ok) in [(0u8, false), (95, false), (90, true)] {
            let options = ApplyOptions {
                fuzz_factor: fuzz,
                ..Default::default()
            };
            let outcome = apply(text, diff, &options);
            assert_eq!(outcome.result.success, expect_ok, "fuzz {fuzz}");
        }
        // The fuzzy rejection names the similarity it computed.
        let options = ApplyOptions {
            fuzz_factor: 95,
            ..Default::default()
        };
        let outcome = apply(text, diff, &options);
        assert!(outcome.result.rejected[0].reason.contains('%'));
    }

    #[test]
    fn test_hunk_beyond_end_of_file() {
        let text = "only\n";
        let diff = "--- a/f\n+++ b/f\n@@ -10,2 +10,2 @@\n ctx\n-gone\n+here\n";
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert!(!outcome.result.success);
        assert!(outcome.result.rejected[0]
            .reason
            .contains("beyond end of file"));
    }

    #[test]
    fn test_bottom_to_top_shifts_are_correct() {
        // Hunk 1 grows the file by two lines, hunk 2 sits right below it.
        let text = "a\nb\nc\nd\ne\n";
        let diff = concat!(
            "--- a/f\n+++ b/f\n",
            "@@ -1,2 +1,4 @@\n a\n-b\n+b1\n+b2\n+b3\n",
            "@@ -3,2 +5,2 @@\n-c\n+c2\n d\n",
        );
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert!(outcome.result.success);
        assert_eq!(outcome.new_text, "a\nb1\nb2\nb3\nc2\nd\ne\n");
    }

    #[test]
    fn test_reapplying_applied_diff_rejects_every_hunk() {
        let text = "a\nb\nc\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+b2\n c\n";
        let first = apply(text, diff, &ApplyOptions::default());
        assert!(first.result.success);
        let second = apply(&first.new_text, diff, &ApplyOptions::default());
        assert!(!second.result.success);
        assert_eq!(second.result.hunks_rejected, second.result.hunks_total);
        assert_eq!(second.new_text, first.new_text);
    }

    #[test]
    fn test_ignore_whitespace_and_case() {
        let text = "  LET  X = 1;\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,1 +1,1 @@\n-let x = 1;\n+let x = 2;\n";
        let options = ApplyOptions {
            ignore_whitespace: true,
            ignore_case: true,
            ..Default::default()
        };
        let outcome = apply(text, diff, &options);
        assert!(outcome.result.success);
        assert_eq!(outcome.new_text, "let x = 2;\n");
    }

    #[test]
    fn test_partial_allowed() {
        let text = "a\nb\nc\nd\n";
        let diff = concat!(
            "--- a/f\n+++ b/f\n",
            "@@ -1,1 +1,1 @@\n-a\n+a2\n",
            "@@ -3,1 +3,1 @@\n-WRONG\n+c2\n",
        );
        let strict = apply(text, diff, &ApplyOptions::default());
        assert!(!strict.result.success);

        let options = ApplyOptions {
            allow_partial: true,
            ..Default::default()
        };
        let partial = apply(text, diff, &options);
        assert!(partial.result.success);
        assert_eq!(partial.result.hunks_applied, 1);
        assert_eq!(partial.result.hunks_rejected, 1);
        assert_eq!(partial.new_text, "a2\nb\nc\nd\n");
    }

    #[test]
    fn test_stop_on_first_error_halts_processing() {
        // Bottom-to-top order processes hunk 2 (line 5) first; it fails, so
        // hunks 0 and 1 are never attempted.
        let text = "a\nb\nc\nd\ne\n";
        let diff = concat!(
            "--- a/f\n+++ b/f\n",
            "@@ -1,1 +1,1 @@\n-a\n+a2\n",
            "@@ -3,1 +3,1 @@\n-c\n+c2\n",
            "@@ -5,1 +5,1 @@\n-WRONG\n+e2\n",
        );
        let options = ApplyOptions {
            stop_on_first_error: true,
            ..Default::default()
        };
        let outcome = apply(text, diff, &options);
        assert!(!outcome.result.success);
        assert_eq!(outcome.result.hunks_applied, 0);
        assert_eq!(outcome.result.hunks_rejected, 1);
        assert_eq!(outcome.new_text, text);
    }

    #[test]
    fn test_pure_insertion_hunk() {
        let text = "a\nb\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,0 +2,1 @@\n+inserted\n";
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert!(outcome.result.success);
        assert_eq!(outcome.new_text, "a\ninserted\nb\n");
    }

    #[test]
    fn test_declared_counts_not_enforced() {
        // Header claims one old line but the body lists two; the literal
        // line list wins.
        let text = "a\nb\nc\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,1 +1,1 @@\n a\n-b\n+b2\n";
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert!(outcome.result.success);
        assert_eq!(outcome.new_text, "a\nb2\nc\n");
    }

    #[test]
    fn test_bom_preserved() {
        let text = "\u{feff}a\nb\n";
        let diff = "--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\n-b\n+b2\n";
        let outcome = apply(text, diff, &ApplyOptions::default());
        assert!(outcome.result.success);
        assert_eq!(outcome.new_text, "\u{feff}a\nb2\n");
    }
}
