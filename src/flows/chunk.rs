//! End-to-end chunking flow
//!
//! Starts the worker pool, scans every root through it with a quiescence
//! barrier after each, shuts the pool down and packs the collected entries
//! (or prints the packing plan on a dry run).

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backends::pool::WorkerPool;
use crate::backends::scan::Scanner;
use crate::core::config::{Config, OutputMode};
use crate::core::file_reader::{ContentReader, FsReader};
use crate::core::model::{ChunkError, RunStats};
use crate::core::render::{RenderConfig, Renderer};
use crate::flows::pack::{pack_entries, plan_entries};
use crate::flows::sink::{sink_for, ChunkSink};

/// Options for the chunk command that are not part of `Config`
#[derive(Debug, Clone, Default)]
pub struct ChunkOptions {
    /// Roots to scan, in order
    pub roots: Vec<PathBuf>,
    /// Print the packing plan instead of writing chunks
    pub dry_run: bool,
    /// Print run statistics to stderr
    pub show_stats: bool,
    pub render: RenderConfig,
}

/// Scan, read and collect entries, then pack them into `sink`
///
/// On a dry run the plan is printed instead and `sink` is not touched.
pub fn chunk_into(
    config: Config,
    reader: Arc<dyn ContentReader>,
    opts: &ChunkOptions,
    sink: Option<&mut dyn ChunkSink>,
) -> Result<RunStats> {
    let config = Arc::new(config);
    let pool = WorkerPool::new(Arc::clone(&config), reader)
        .context("Failed to start worker pool")?;
    debug!(workers = pool.num_workers(), "Pool ready");

    let mut stats = RunStats::default();
    {
        let mut scanner =
            Scanner::new(&config, pool.queue()).skip_output_in(&config.output_dir_or_cwd());

        for root in &opts.roots {
            let scan = scanner
                .scan(root)
                .with_context(|| format!("Failed to scan {}", root.display()))?;
            pool.wait_until_done()
                .with_context(|| format!("Failed to collect files under {}", root.display()))?;
            debug!(
                root = %root.display(),
                collected = pool.results_len(),
                pending = pool.queue().len(),
                in_flight = pool.queue().in_flight(),
                "Root drained"
            );
            stats.files_discovered += scan.files_queued;
        }
    }

    let queue = pool.queue();
    debug!(
        pushed = queue.stats().pushed.load(Ordering::Relaxed),
        popped = queue.stats().popped.load(Ordering::Relaxed),
        growths = queue.stats().growths.load(Ordering::Relaxed),
        capacity = queue.capacity(),
        "Work queue drained"
    );

    stats.files_read = pool.files_read();
    stats.files_dropped = pool.files_dropped();
    let mut entries = pool.shutdown();

    if opts.dry_run {
        let plan = plan_entries(&mut entries, &config);
        Renderer::with_config(opts.render)
            .render_to(&plan, io::stdout().lock())
            .context("Failed to write plan")?;
        return Ok(stats);
    }

    if let Some(sink) = sink {
        let packed = pack_entries(&mut entries, &config, sink);
        stats.chunks_written = packed.chunks_written;
        stats.sink_failures = packed.sink_failures;
        info!(
            chunks = packed.chunks_written,
            split = packed.entries_split,
            "Packing complete"
        );
    }

    Ok(stats)
}

/// Run the chunk command
pub fn run_chunk(config: Config, opts: ChunkOptions) -> Result<()> {
    if config.output_mode != OutputMode::Stream && !opts.dry_run {
        let dir = config.output_dir_or_cwd();
        fs::create_dir_all(&dir).map_err(|source| ChunkError::Io {
            path: dir.clone(),
            source,
        })?;
    }

    let mut sink = sink_for(&config);
    let sink: Option<&mut dyn ChunkSink> = if opts.dry_run {
        None
    } else {
        Some(sink.as_mut())
    };
    let stats = chunk_into(config, Arc::new(FsReader), &opts, sink)?;

    if opts.show_stats {
        eprintln!("Chunk Statistics:");
        eprintln!("   Files discovered: {}", stats.files_discovered);
        eprintln!("   Files read: {}", stats.files_read);
        eprintln!("   Files dropped: {}", stats.files_dropped);
        eprintln!("   Chunks written: {}", stats.chunks_written);
        if stats.sink_failures > 0 {
            eprintln!("   Sink failures: {}", stats.sink_failures);
        }
    }

    Ok(())
}
