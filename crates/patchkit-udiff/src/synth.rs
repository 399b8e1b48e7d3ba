//! Unified diff synthesis: the inverse of application.
//!
//! Computes a line diff between two buffers and renders it as standard
//! `--- / +++ / @@` unified diff text. Equal runs shorter than twice the
//! context width are merged into the surrounding hunk rather than splitting
//! it.

use similar::{ChangeTag, TextDiff};

use crate::applier::split_bom;

/// Render a unified diff turning `old_text` into `new_text`.
///
/// `context_lines` is the number of unchanged lines kept around each change.
/// Paths are emitted verbatim in the `---`/`+++` headers. A leading BOM on
/// either input is stripped so it never leaks into hunk lines; the appliers
/// restore the target's BOM on output.
pub fn create_diff(
    old_text: &str,
    new_text: &str,
    old_path: &str,
    new_path: &str,
    context_lines: usize,
) -> String {
    let (_, old_text) = split_bom(old_text);
    let (_, new_text) = split_bom(new_text);
    let diff = TextDiff::from_lines(old_text, new_text);
    let mut out = String::new();
    out.push_str(&format!("--- {old_path}\n+++ {new_path}\n"));

    for group in diff.grouped_ops(context_lines) {
        let (first, last) = match (group.first(), group.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => continue,
        };
        let old_range = first.old_range().start..last.old_range().end;
        let new_range = first.new_range().start..last.new_range().end;

        let mut body = String::new();
        let mut old_count = 0usize;
        let mut new_count = 0usize;
        for op in &group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Equal => {
                        old_count += 1;
                        new_count += 1;
                        ' '
                    }
                    ChangeTag::Delete => {
                        old_count += 1;
                        '-'
                    }
                    ChangeTag::Insert => {
                        new_count += 1;
                        '+'
                    }
                };
                let value = change.value();
                body.push(sign);
                body.push_str(value.strip_suffix('\n').unwrap_or(value));
                body.push('\n');
                if !value.ends_with('\n') {
                    body.push_str("\\ No newline at end of file\n");
                }
            }
        }

        // Unified diff convention: a zero-count side anchors after the line
        // numbered by its 0-based start.
        let old_start = if old_count == 0 {
            old_range.start
        } else {
            old_range.start + 1
        };
        let new_start = if new_count == 0 {
            new_range.start
        } else {
            new_range.start + 1
        };
        out.push_str(&format!(
            "@@ -{old_start},{old_count} +{new_start},{new_count} @@\n"
        ));
        out.push_str(&body);
    }
    out
}
