//! ctxchunk - Pack a directory tree into size-bounded chunks
//!
//! ctxchunk provides:
//! - Directory scanning with glob ignore/unignore rules and .gitignore merging
//! - Binary detection by extension and null-byte sniffing
//! - Concurrent file reading on a fixed worker pool
//! - Priority-ordered greedy packing by bytes or tokens, with file splitting
//! - Output to numbered chunk files, stdout, or one aggregate file

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backends;
mod cli;
mod core;
mod flows;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    setup_logging(cli.verbose, cli.quiet);
    cli::run(cli)
}

/// Install the stderr subscriber; `RUST_LOG` wins over the flags
fn setup_logging(verbose: bool, quiet: bool) {
    let default = if quiet {
        "warn"
    } else if verbose {
        "ctxchunk=debug,warn"
    } else {
        "ctxchunk=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
