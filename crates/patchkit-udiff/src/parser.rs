//! Parser for unified diff format.
//!
//! Accepts standard `diff -u` / `git diff` output, possibly covering several
//! files in one blob. Lines the format does not classify (e.g. `diff --git`
//! and `index` headers between files) are skipped.

use crate::error::{CountSide, ParseError, ValidationIssue};

/// Classification of a single hunk body line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Unchanged line present on both sides (` ` prefix).
    Context,
    /// Line added by the diff (`+` prefix).
    Add,
    /// Line removed by the diff (`-` prefix).
    Remove,
}

/// One body line of a hunk with its positions in the old and new file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    /// Line content without the prefix character.
    pub content: String,
    /// 1-based line number in the old file (context and remove lines).
    pub old_line: Option<usize>,
    /// 1-based line number in the new file (context and add lines).
    pub new_line: Option<usize>,
}

/// A parsed hunk: declared header positions plus the literal line list.
///
/// The declared counts are what the `@@` header claims; [`validate`] checks
/// them against the body, but application always walks `lines` directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHunk {
    /// Declared 1-based start line in the old file.
    pub old_start: usize,
    /// Declared count of context + remove lines.
    pub old_lines: usize,
    /// Declared 1-based start line in the new file.
    pub new_start: usize,
    /// Declared count of context + add lines.
    pub new_lines: usize,
    /// Optional section label after the closing `@@`.
    pub heading: Option<String>,
    /// Body lines in order.
    pub lines: Vec<DiffLine>,
}

impl ParsedHunk {
    /// Count of literal old-side lines (context + remove).
    pub fn counted_old_lines(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Remove))
            .count()
    }

    /// Count of literal new-side lines (context + add).
    pub fn counted_new_lines(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l.kind, LineKind::Context | LineKind::Add))
            .count()
    }
}

/// A parsed diff for a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDiff {
    /// Path from the `--- ` header, with any `a/` prefix stripped.
    pub old_path: String,
    /// Path from the `+++ ` header, with any `b/` prefix stripped.
    pub new_path: String,
    /// Hunks in file order.
    pub hunks: Vec<ParsedHunk>,
}

/// Parse unified diff text into one [`ParsedDiff`] per file.
///
/// A `--- ` line immediately followed by a `+++ ` line opens a new file
/// section. A malformed `@@` header is fatal and names the offending line.
/// Input with neither file headers nor hunk headers fails with
/// [`ParseError::NoDiffContent`].
pub fn parse(text: &str) -> Result<Vec<ParsedDiff>, ParseError> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut diffs: Vec<ParsedDiff> = Vec::new();
    let mut in_hunk = false;
    // Running 1-based line counters for the open hunk.
    let mut old_no = 0usize;
    let mut new_no = 0usize;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if let Some(old_part) = line.strip_prefix("--- ") {
            if let Some(new_part) = lines.get(i + 1).and_then(|l| l.strip_prefix("+++ ")) {
                diffs.push(ParsedDiff {
                    old_path: strip_git_prefix(old_part.trim()).to_string(),
                    new_path: strip_git_prefix(new_part.trim()).to_string(),
                    hunks: Vec::new(),
                });
                in_hunk = false;
                i += 2;
                continue;
            }
        }

        if line.starts_with("@@") {
            let (old_start, old_count, new_start, new_count, heading) = parse_hunk_header(line)
                .ok_or_else(|| ParseError::MalformedHunkHeader {
                    line: i + 1,
                    text: line.to_string(),
                })?;
            if diffs.is_empty() {
                // Headerless diff fragment: accept the hunks under empty paths.
                diffs.push(ParsedDiff {
                    old_path: String::new(),
                    new_path: String::new(),
                    hunks: Vec::new(),
                });
            }
            let file = diffs.last_mut().unwrap();
            file.hunks.push(ParsedHunk {
                old_start,
                old_lines: old_count,
                new_start,
                new_lines: new_count,
                heading,
                lines: Vec::new(),
            });
            old_no = old_start;
            new_no = new_start;
            in_hunk = true;
            i += 1;
            continue;
        }

        if in_hunk {
            let hunk = diffs
                .last_mut()
                .and_then(|d| d.hunks.last_mut())
                .expect("in_hunk implies an open hunk");
            if let Some(content) = line.strip_prefix(' ') {
                hunk.lines.push(DiffLine {
                    kind: LineKind::Context,
                    content: content.to_string(),
                    old_line: Some(old_no),
                    new_line: Some(new_no),
                });
                old_no += 1;
                new_no += 1;
            } else if let Some(content) = line.strip_prefix('-') {
                hunk.lines.push(DiffLine {
                    kind: LineKind::Remove,
                    content: content.to_string(),
                    old_line: Some(old_no),
                    new_line: None,
                });
                old_no += 1;
            } else if let Some(content) = line.strip_prefix('+') {
                hunk.lines.push(DiffLine {
                    kind: LineKind::Add,
                    content: content.to_string(),
                    old_line: None,
                    new_line: Some(new_no),
                });
                new_no += 1;
            } else if line.starts_with('\\') {
                // "\ No newline at end of file" marker: positional no-op.
            } else {
                // Unclassified line ends the hunk body.
                in_hunk = false;
            }
            i += 1;
            continue;
        }

        i += 1;
    }

    if diffs.is_empty() {
        return Err(ParseError::NoDiffContent);
    }
    Ok(diffs)
}

/// Re-parse the diff and check every hunk's declared counts against its
/// literal body, collecting all mismatches instead of failing fast.
///
/// Mismatches never block a later apply call.
pub fn validate(text: &str) -> Result<Vec<ValidationIssue>, ParseError> {
    let diffs = parse(text)?;
    let mut issues = Vec::new();
    for diff in &diffs {
        for (idx, hunk) in diff.hunks.iter().enumerate() {
            let counted_old = hunk.counted_old_lines();
            if counted_old != hunk.old_lines {
                issues.push(ValidationIssue {
                    path: diff.new_path.clone(),
                    hunk_index: idx,
                    side: CountSide::Old,
                    declared: hunk.old_lines,
                    counted: counted_old,
                });
            }
            let counted_new = hunk.counted_new_lines();
            if counted_new != hunk.new_lines {
                issues.push(ValidationIssue {
                    path: diff.new_path.clone(),
                    hunk_index: idx,
                    side: CountSide::New,
                    declared: hunk.new_lines,
                    counted: counted_new,
                });
            }
        }
    }
    Ok(issues)
}

/// Strip the `a/` / `b/` prefixes git puts on header paths.
fn strip_git_prefix(path: &str) -> &str {
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
}

/// Parse `@@ -os[,ol] +ns[,nl] @@ [heading]`. Omitted counts default to 1.
fn parse_hunk_header(line: &str) -> Option<(usize, usize, usize, usize, Option<String>)> {
    let rest = line.strip_prefix("@@ -")?;
    let (old_part, rest) = rest.split_once(" +")?;
    let (new_part, rest) = rest.split_once(" @@")?;
    let (old_start, old_count) = parse_range(old_part)?;
    let (new_start, new_count) = parse_range(new_part)?;
    let heading = {
        let h = rest.trim();
        if h.is_empty() {
            None
        } else {
            Some(h.to_string())
        }
    };
    Some((old_start, old_count, new_start, new_count, heading))
}

/// Parse `start[,count]` where a missing count means 1.
fn parse_range(s: &str) -> Option<(usize, usize)> {
    match s.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}
