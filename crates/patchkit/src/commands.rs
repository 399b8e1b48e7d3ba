//! Subcommand handlers.
//!
//! Each handler prints its report and returns whether the operation
//! succeeded; `main` turns a `false` into exit code 1.

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use patchkit_store::{FsTextStore, TextStore};
use patchkit_transaction::{
    PatchCoordinator, PatchEngine, PatchInput, PatchOptions, TransactionError,
};
use patchkit_udiff::{create_diff, validate, DiffResult};

use crate::cli::{ApplyArgs, Args, Command, DiffArgs, InputFormat, PatchArgs, ValidateArgs};

pub async fn run(args: Args) -> anyhow::Result<bool> {
    let store = Arc::new(FsTextStore::new(args.root.clone()));
    tracing::debug!(root = %args.root.display(), "store root resolved");
    match &args.command {
        Command::Apply(apply) => run_apply(store, args.json, apply).await,
        Command::Patch(patch) => run_patch(store, args.json, patch).await,
        Command::Diff(diff) => run_diff(store, diff).await,
        Command::Validate(check) => run_validate(args.json, check),
    }
}

async fn run_apply(
    store: Arc<FsTextStore>,
    json: bool,
    args: &ApplyArgs,
) -> anyhow::Result<bool> {
    let diff_text = read_input(&args.diff)?;
    let options = args.flags.to_options();
    let engine = PatchEngine::new(store);
    let result = engine
        .apply_to_file(&args.file, &diff_text, &options)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_diff_result(&result);
        if let Some(preview) = &result.preview {
            print!("{preview}");
        }
    }
    Ok(result.success)
}

async fn run_patch(
    store: Arc<FsTextStore>,
    json: bool,
    args: &PatchArgs,
) -> anyhow::Result<bool> {
    let input_text = read_input(&args.input)?;
    let input = match args.format {
        InputFormat::Blob => PatchInput::Blob(input_text),
        InputFormat::Json => PatchInput::Json(input_text),
    };
    let options = PatchOptions {
        apply: args.flags.to_options(),
        atomic: args.atomic,
        continue_on_error: args.continue_on_error,
    };
    let coordinator = PatchCoordinator::new(PatchEngine::new(store));

    match coordinator.apply(input, &options).await {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "{}/{} files patched ({} failed)",
                    result.files_succeeded, result.files_total, result.files_failed
                );
                for file_result in result.results.values() {
                    print_diff_result(file_result);
                }
            }
            Ok(result.success)
        }
        // An aborted atomic batch is an expected outcome, not a crash.
        Err(err @ TransactionError::Atomic { .. }) => {
            eprintln!("error: {err}");
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

async fn run_diff(store: Arc<FsTextStore>, diff: &DiffArgs) -> anyhow::Result<bool> {
    // Read through the store so root confinement applies here too.
    let old = store.read(&diff.old).await?;
    let new = store.read(&diff.new).await?;
    let text = create_diff(
        &old,
        &new,
        &format!("a/{}", diff.old),
        &format!("b/{}", diff.new),
        diff.context,
    );
    print!("{text}");
    Ok(true)
}

fn run_validate(json: bool, args: &ValidateArgs) -> anyhow::Result<bool> {
    let diff_text = read_input(&args.diff)?;
    let issues = match validate(&diff_text) {
        Ok(issues) => issues,
        Err(err) => {
            eprintln!("parse error: {err}");
            return Ok(false);
        }
    };

    if json {
        let messages: Vec<String> = issues.iter().map(ToString::to_string).collect();
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else if issues.is_empty() {
        println!("ok");
    } else {
        for issue in &issues {
            println!("{issue}");
        }
    }
    Ok(issues.is_empty())
}

fn print_diff_result(result: &DiffResult) {
    let path = result.path.as_deref().unwrap_or("<buffer>");
    let status = if result.success { "ok" } else { "FAILED" };
    println!(
        "{path}: {status}, {}/{} hunks applied",
        result.hunks_applied, result.hunks_total
    );
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    for hunk in &result.rejected {
        println!("  hunk {} rejected: {}", hunk.hunk_index, hunk.reason);
        if let Some(suggestion) = &hunk.suggestion {
            println!("    hint: {suggestion}");
        }
    }
    if let Some(backup) = &result.backup_path {
        println!("  backup: {backup}");
    }
    for error in &result.syntax_errors {
        println!("  syntax: {error}");
    }
}

fn read_input(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("cannot read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("cannot read {source}"))
    }
}
