//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use patchkit_udiff::{ApplyOptions, ApplyStrategy};

#[derive(Parser)]
#[command(
    name = "patchkit",
    version,
    about = "Apply, synthesize, and validate unified diffs"
)]
pub struct Args {
    /// Root directory file paths are resolved against.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Emit machine-readable JSON instead of a text summary.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log filter, e.g. `patchkit=debug`.
    #[arg(long, env = "PATCHKIT_LOG", default_value = "warn")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a diff to a single file.
    Apply(ApplyArgs),
    /// Apply a multi-file patch batch.
    Patch(PatchArgs),
    /// Create a unified diff between two files.
    Diff(DiffArgs),
    /// Parse a diff and report structural problems.
    Validate(ValidateArgs),
}

#[derive(clap::Args)]
pub struct ApplyArgs {
    /// Target file, relative to --root.
    pub file: String,

    /// Diff file to read, or `-` for stdin.
    #[arg(long, default_value = "-")]
    pub diff: String,

    #[command(flatten)]
    pub flags: ApplyFlags,
}

#[derive(clap::Args)]
pub struct PatchArgs {
    /// Patch input file, or `-` for stdin.
    #[arg(default_value = "-")]
    pub input: String,

    /// How the input is structured.
    #[arg(long, value_enum, default_value_t = InputFormat::Blob)]
    pub format: InputFormat,

    /// All files apply or none do; failures roll back prior writes.
    #[arg(long)]
    pub atomic: bool,

    /// Keep processing after a file fails.
    #[arg(long, conflicts_with = "atomic")]
    pub continue_on_error: bool,

    #[command(flatten)]
    pub flags: ApplyFlags,
}

#[derive(clap::Args)]
pub struct DiffArgs {
    /// Original file.
    pub old: String,
    /// Modified file.
    pub new: String,

    /// Context lines around each change.
    #[arg(long, default_value_t = 3)]
    pub context: usize,
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Diff file to check, or `-` for stdin.
    #[arg(default_value = "-")]
    pub diff: String,
}

/// Apply options shared by `apply` and `patch`.
#[derive(clap::Args)]
pub struct ApplyFlags {
    #[arg(long, value_enum, default_value_t = StrategyArg::Exact)]
    pub strategy: StrategyArg,

    /// Fuzzy tolerance 0-100; 0 requires exact context matches.
    #[arg(long, default_value_t = 0)]
    pub fuzz: u8,

    #[arg(long)]
    pub ignore_whitespace: bool,

    #[arg(long)]
    pub ignore_case: bool,

    /// Back up each file before modifying it.
    #[arg(long)]
    pub backup: bool,

    /// Report what would change without writing.
    #[arg(long)]
    pub dry_run: bool,

    /// Count the apply as successful if at least one hunk lands.
    #[arg(long)]
    pub allow_partial: bool,

    /// Stop processing hunks after the first rejection.
    #[arg(long)]
    pub stop_on_first_error: bool,
}

impl ApplyFlags {
    pub fn to_options(&self) -> ApplyOptions {
        ApplyOptions {
            strategy: self.strategy.into(),
            fuzz_factor: self.fuzz,
            ignore_whitespace: self.ignore_whitespace,
            ignore_case: self.ignore_case,
            create_backup: self.backup,
            dry_run: self.dry_run,
            allow_partial: self.allow_partial,
            stop_on_first_error: self.stop_on_first_error,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// Literal line positions with context validation.
    Exact,
    /// Block matching that tolerates line-number drift.
    Block,
}

impl From<StrategyArg> for ApplyStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Exact => ApplyStrategy::Exact,
            StrategyArg::Block => ApplyStrategy::Block,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum InputFormat {
    /// Multi-file unified diff text, split on `diff --git` lines.
    Blob,
    /// JSON array of `{path, diff, priority}` objects.
    Json,
}
