//! CLI module - Command-line interface definition and handler

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::core::config::{
    Config, ConfigOptions, DEFAULT_BINARY_EXTENSIONS, DEFAULT_MAX_SIZE, DEFAULT_NUM_THREADS,
};
use crate::core::render::{OutputFormat, RenderConfig};
use crate::core::tokenizer::TokenModel;
use crate::flows::chunk::{run_chunk, ChunkOptions};

/// ctxchunk - pack a source tree into size-bounded chunks for LLM context.
#[derive(Parser, Debug)]
#[command(name = "ctxchunk")]
#[command(
    author,
    version,
    about,
    long_about = r#"ctxchunk scans one or more directories, keeps the text files that pass the
ignore/unignore/binary filters, reads them concurrently and packs them, highest
priority first, into chunks that never exceed --max-size.

Each file is rendered as:

    chunk <n>
    >>>> <path>
    <content>

A file too large for a chunk of its own is split into parts rendered as
`>>>> <path>:part <k>`.

Output modes:
- default: one chunk-<n>.txt per chunk in --output-dir
- --stream: every chunk to stdout, in order
- --whole-chunk-mode: every chunk appended to whole_chunk_mode-output.txt

Examples:
    ctxchunk src --ignore '*.lock' --max-size 65536
    ctxchunk . --token-mode --max-size 8000 --priority-rule '*.rs,10' --stream
    ctxchunk . --dry-run --format md
"#
)]
pub struct Cli {
    /// Directories to scan.
    #[arg(value_name = "DIRS", default_value = ".")]
    pub dirs: Vec<PathBuf>,

    /// Glob patterns of files to skip.
    #[arg(
        long,
        value_name = "PATTERN",
        num_args = 1..,
        long_help = "Glob patterns of files to skip. Matching is case-insensitive and '*' never\n\
crosses '/'. A pattern without '/' also matches the file name; a pattern\n\
starting with '/' matches the absolute path.\n\n\
Patterns from .gitignore files found during the scan are added to this list."
    )]
    pub ignore: Vec<String>,

    /// Glob patterns that override --ignore.
    #[arg(long, value_name = "PATTERN", num_args = 1..)]
    pub unignore: Vec<String>,

    /// File extensions always treated as binary.
    #[arg(
        long,
        value_name = "EXT",
        num_args = 1..,
        default_values_t = DEFAULT_BINARY_EXTENSIONS.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        long_help = "File extensions always treated as binary (case-insensitive, without the dot).\n\n\
Other files are treated as binary if their first 8192 bytes contain a null byte."
    )]
    pub binary_extensions: Vec<String>,

    /// Priority rule as PATTERN,SCORE (repeatable).
    #[arg(
        long = "priority-rule",
        value_name = "PATTERN,SCORE",
        long_help = "Rank files matching PATTERN with integer SCORE. A file takes the highest\n\
score among matching rules (0 if none); higher scores are packed first and\n\
ties keep discovery order. Repeat the flag for several rules."
    )]
    pub priority_rules: Vec<String>,

    /// Chunk capacity in bytes (or tokens with --token-mode).
    #[arg(long, value_name = "N", env = "CTXCHUNK_MAX_SIZE", default_value_t = DEFAULT_MAX_SIZE)]
    pub max_size: usize,

    /// Measure sizes in tokens instead of bytes.
    #[arg(long)]
    pub token_mode: bool,

    /// Token model used with --token-mode.
    #[arg(
        long,
        value_name = "MODEL",
        default_value = "whitespace",
        long_help = "Token model used with --token-mode.\n\n\
Supported values:\n\
- whitespace (default): runs of non-whitespace are tokens\n\
- cl100k: GPT-4 / GPT-3.5 BPE\n\
- o200k: GPT-4o BPE\n\
- heuristic: fast estimate without BPE"
    )]
    pub token_model: String,

    /// Directory for chunk files (defaults to the current directory).
    #[arg(long, value_name = "DIR", env = "CTXCHUNK_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write chunks to stdout instead of files.
    #[arg(long, conflicts_with = "whole_chunk_mode")]
    pub stream: bool,

    /// Append every chunk to a single aggregate file.
    #[arg(long)]
    pub whole_chunk_mode: bool,

    /// Number of worker threads reading files.
    #[arg(long, value_name = "N", env = "CTXCHUNK_NUM_THREADS", default_value_t = DEFAULT_NUM_THREADS)]
    pub num_threads: usize,

    /// Print the packing plan instead of writing chunks.
    #[arg(long)]
    pub dry_run: bool,

    /// Dry-run plan format (jsonl/json/md).
    #[arg(long, default_value = "jsonl", value_name = "FORMAT")]
    pub format: String,

    /// Pretty-print JSON/JSONL plans.
    #[arg(long)]
    pub pretty: bool,

    /// Replace lines that look like they hold API keys.
    #[arg(long)]
    pub redact_secrets: bool,

    /// Print run statistics to stderr.
    #[arg(long)]
    pub stats: bool,

    /// Quiet mode (warnings and errors only).
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug diagnostics).
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the CLI command
pub fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.format.parse().map_err(|e: String| anyhow!(e))?;
    let token_model: TokenModel = cli.token_model.parse().map_err(|e: String| anyhow!(e))?;

    let config = Config::from_options(ConfigOptions {
        max_size: cli.max_size,
        token_mode: cli.token_mode,
        token_model,
        stream: cli.stream,
        whole_chunk_mode: cli.whole_chunk_mode,
        output_dir: cli.output_dir,
        ignore: cli.ignore,
        unignore: cli.unignore,
        priority_rules: cli.priority_rules,
        binary_extensions: cli.binary_extensions,
        num_threads: cli.num_threads,
        redact_secrets: cli.redact_secrets,
    })?;

    run_chunk(
        config,
        ChunkOptions {
            roots: cli.dirs,
            dry_run: cli.dry_run,
            show_stats: cli.stats,
            render: RenderConfig::with_pretty(format, cli.pretty),
        },
    )
}
