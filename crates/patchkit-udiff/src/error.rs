//! Error and validation types for unified diff parsing.

use std::fmt;

use thiserror::Error;

/// Structural parse failure. These abort parsing; everything softer is
/// reported through [`ValidationIssue`] or as per-hunk data in `DiffResult`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A `@@` line that does not parse as `@@ -os[,ol] +ns[,nl] @@`.
    #[error("malformed hunk header at line {line}: {text:?}")]
    MalformedHunkHeader {
        /// 1-based line number within the diff text.
        line: usize,
        /// The offending line, verbatim.
        text: String,
    },
    /// The input contained no file headers and no hunk headers.
    #[error("no valid diff content")]
    NoDiffContent,
}

/// Which declared count of a hunk header a mismatch refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountSide {
    /// `oldLines`: declared count of context + remove lines.
    Old,
    /// `newLines`: declared count of context + add lines.
    New,
}

impl fmt::Display for CountSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountSide::Old => write!(f, "old"),
            CountSide::New => write!(f, "new"),
        }
    }
}

/// A declared-vs-counted line count mismatch found by [`crate::validate`].
///
/// These are collected exhaustively and never block a later apply, which
/// works from the literal line list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Path of the file the hunk belongs to (the diff's new path).
    pub path: String,
    /// 0-based hunk index within its file.
    pub hunk_index: usize,
    /// Which side of the header disagrees.
    pub side: CountSide,
    /// Count declared in the `@@` header.
    pub declared: usize,
    /// Count derived from the literal body lines.
    pub counted: usize,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: hunk {} declares {} {} lines but contains {}",
            self.path, self.hunk_index, self.declared, self.side, self.counted
        )
    }
}
