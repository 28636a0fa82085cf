//! s3-meta-sync: manifest-driven sync between a local directory and an S3
//! folder or a plain HTTP mirror.
//!
//! # Usage
//!
//! ```text
//! s3-meta-sync <local-dir> <bucket>:<prefix>       # upload
//! s3-meta-sync <bucket>:<prefix> <local-dir>       # download
//! s3-meta-sync https://mirror/prefix <local-dir>   # download over HTTP
//! ```

mod args;

use anyhow::{Context, Result};
use clap::Parser;

use args::Cli;
use metasync_sync::SyncEngine;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = cli.options()?;
    let engine = SyncEngine::new(options);
    let report = engine
        .sync(&cli.source, &cli.destination)
        .with_context(|| format!("sync {} -> {} failed", cli.source, cli.destination))?;

    println!("{report}");
    if cli.verbose {
        for path in &report.transferred {
            println!("  + {path}");
        }
        for path in &report.deleted {
            println!("  - {path}");
        }
    }
    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
