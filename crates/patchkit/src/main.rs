//! patchkit - unified diff toolbox
//!
//! ```bash
//! # Apply a diff to one file
//! patchkit apply src/main.rs --diff fix.patch
//!
//! # Fuzzy apply with a backup
//! patchkit apply src/main.rs --diff fix.patch --fuzz 85 --backup
//!
//! # Apply a multi-file batch atomically
//! patchkit patch changes.patch --atomic
//!
//! # Synthesize a diff
//! patchkit diff old.txt new.txt --context 3
//!
//! # Check a diff's declared counts
//! patchkit validate fix.patch
//! ```

use clap::Parser;

mod cli;
mod commands;

fn main() {
    let args = cli::Args::parse();
    init_tracing(&args.log);

    let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    match runtime.block_on(commands::run(args)) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
