//! Unified diff parsing, application, and synthesis.
//!
//! This crate is the computational core of patchkit. It parses standard
//! `diff -u` / `git diff` text into structured hunks, applies those hunks to
//! an in-memory buffer with either exact positional matching or approximate
//! block matching, and synthesizes unified diffs from two buffers.
//!
//! # Architecture
//!
//! This is a **Layer 2 (Infrastructure)** crate:
//! - Depends on: nothing internal (pure text computation)
//! - Used by: patchkit-transaction (file transactions), patchkit (CLI)
//!
//! Everything here is synchronous and side-effect free. Per-hunk failures are
//! reported as data inside [`DiffResult`]; only malformed diff text raises a
//! [`ParseError`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use patchkit_udiff::{parse, ApplyOptions, ExactApplier, Applier};
//!
//! let diffs = parse(diff_text)?;
//! let outcome = ExactApplier.apply(&file_content, &diffs[0], &ApplyOptions::default());
//! if outcome.result.success {
//!     // persist outcome.new_text
//! }
//! ```

mod applier;
mod approx;
mod error;
mod exact;
mod options;
mod parser;
mod result;
mod similarity;
mod synth;

pub use applier::{applier_for, apply_diff, ApplyOutcome, Applier};
pub use approx::BlockApplier;
pub use error::{CountSide, ParseError, ValidationIssue};
pub use exact::ExactApplier;
pub use options::{ApplyOptions, ApplyStrategy};
pub use parser::{parse, validate, DiffLine, LineKind, ParsedDiff, ParsedHunk};
pub use result::{AppliedHunk, DiffResult, RejectedHunk};
pub use similarity::{levenshtein, similarity};
pub use synth::create_diff;
