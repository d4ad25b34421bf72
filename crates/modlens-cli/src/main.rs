//! modlens binary entry point.
//!
//! A thin wrapper around the modlens-scan library that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Runs the scan
//! 4. Prints a summary or the JSON report
//!
//! For library usage, see the modlens-scan crate documentation.

mod args;
mod output;

use anyhow::Result;
use args::Args;
use clap::Parser;
use modlens_scan::Scanner;
use std::io::Write;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so `--json` output stays machine-readable
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.to_scan_config()?;
    if let Some(dir) = &config.cache_dir {
        tracing::debug!("Using cache directory {}", dir.display());
    }

    let report = Scanner::new(config)?
        .with_progress(|progress| {
            tracing::debug!(
                phase = %progress.phase,
                current = ?progress.current,
                total = ?progress.total,
                "{}",
                progress.message
            );
        })
        .run()?;

    let mut out = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        output::write_summary(&mut out, &report)?;
    }
    Ok(())
}
