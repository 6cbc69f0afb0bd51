//! Run configuration
//!
//! `ConfigOptions` holds the raw values gathered by the CLI; `Config` is the
//! validated form shared by the scanner, the workers and the packer. The
//! ignore list is the only part that grows after construction.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::filter::Pattern;
use crate::core::model::ChunkError;
use crate::core::tokenizer::TokenModel;

/// Default chunk capacity (10 MiB, or 10Mi tokens in token mode)
pub const DEFAULT_MAX_SIZE: usize = 10 * 1024 * 1024;

/// Default number of worker threads
pub const DEFAULT_NUM_THREADS: usize = 4;

/// Extensions treated as binary when none are configured
pub const DEFAULT_BINARY_EXTENSIONS: &[&str] = &["exe", "dll", "so"];

/// Unit in which chunk capacity and entry sizes are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeMode {
    /// Raw byte length
    #[default]
    Bytes,
    /// Token count under the given model
    Tokens(TokenModel),
}

/// Where finished chunks go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Write every chunk to stdout in order
    Stream,
    /// One `chunk-<n>.txt` per chunk
    #[default]
    Files,
    /// Every chunk appended to a single aggregate file
    Aggregate,
}

/// A (pattern, score) pair used to rank files
#[derive(Debug, Clone)]
pub struct PriorityRule {
    pub pattern: Pattern,
    pub score: i32,
}

impl std::str::FromStr for PriorityRule {
    type Err = ChunkError;

    /// Parse `pattern,score`; the split is on the last comma so patterns may contain commas
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (pattern, score) = s
            .rsplit_once(',')
            .ok_or_else(|| ChunkError::InvalidPriorityRule(s.to_string()))?;
        let score: i32 = score
            .trim()
            .parse()
            .map_err(|_| ChunkError::InvalidPriorityRule(s.to_string()))?;
        Ok(Self {
            pattern: Pattern::new(pattern.trim())?,
            score,
        })
    }
}

/// Append-only ignore list, copied on growth
///
/// Readers take an `Arc` snapshot and never hold the lock while matching.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: RwLock<Arc<Vec<Pattern>>>,
}

impl RuleSet {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self {
            rules: RwLock::new(Arc::new(patterns)),
        }
    }

    /// Current rules
    pub fn snapshot(&self) -> Arc<Vec<Pattern>> {
        let guard = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Publish a new list holding the current rules followed by `more`
    pub fn extend(&self, more: Vec<Pattern>) {
        if more.is_empty() {
            return;
        }
        let mut guard = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let mut grown = Vec::with_capacity(guard.len() + more.len());
        grown.extend(guard.iter().cloned());
        grown.extend(more);
        *guard = Arc::new(grown);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raw configuration values, as collected from the command line
#[derive(Debug, Clone)]
pub struct ConfigOptions {
    pub max_size: usize,
    pub token_mode: bool,
    pub token_model: TokenModel,
    pub stream: bool,
    pub whole_chunk_mode: bool,
    pub output_dir: Option<PathBuf>,
    pub ignore: Vec<String>,
    pub unignore: Vec<String>,
    /// `pattern,score` strings
    pub priority_rules: Vec<String>,
    pub binary_extensions: Vec<String>,
    pub num_threads: usize,
    pub redact_secrets: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            token_mode: false,
            token_model: TokenModel::default(),
            stream: false,
            whole_chunk_mode: false,
            output_dir: None,
            ignore: Vec::new(),
            unignore: Vec::new(),
            priority_rules: Vec::new(),
            binary_extensions: DEFAULT_BINARY_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            num_threads: DEFAULT_NUM_THREADS,
            redact_secrets: false,
        }
    }
}

/// Validated configuration
#[derive(Debug)]
pub struct Config {
    /// Chunk capacity, in the unit of `size_mode`
    pub max_size: usize,
    pub size_mode: SizeMode,
    pub output_mode: OutputMode,
    /// Output directory; the current directory when unset
    pub output_dir: Option<PathBuf>,
    pub ignore: RuleSet,
    pub unignore: Vec<Pattern>,
    pub priority_rules: Vec<PriorityRule>,
    /// Lowercased, without leading dots
    pub binary_exts: HashSet<String>,
    pub num_threads: usize,
    pub redact_secrets: bool,
}

impl Config {
    /// Validate raw options into a configuration
    pub fn from_options(opts: ConfigOptions) -> Result<Self, ChunkError> {
        if opts.max_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "max size must be a positive integer".to_string(),
            ));
        }
        if opts.num_threads == 0 {
            return Err(ChunkError::InvalidConfig(
                "number of threads must be at least 1".to_string(),
            ));
        }

        let output_mode = match (opts.stream, opts.whole_chunk_mode) {
            (true, true) => {
                return Err(ChunkError::InvalidConfig(
                    "stream and whole-chunk mode are mutually exclusive".to_string(),
                ))
            }
            (true, false) => OutputMode::Stream,
            (false, true) => OutputMode::Aggregate,
            (false, false) => OutputMode::Files,
        };

        let size_mode = if opts.token_mode {
            SizeMode::Tokens(opts.token_model)
        } else {
            SizeMode::Bytes
        };

        let priority_rules = opts
            .priority_rules
            .iter()
            .map(|r| r.parse::<PriorityRule>())
            .collect::<Result<Vec<_>, _>>()?;

        let binary_exts = opts
            .binary_extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Ok(Self {
            max_size: opts.max_size,
            size_mode,
            output_mode,
            output_dir: opts.output_dir,
            ignore: RuleSet::new(Pattern::compile_all(&opts.ignore)?),
            unignore: Pattern::compile_all(&opts.unignore)?,
            priority_rules,
            binary_exts,
            num_threads: opts.num_threads,
            redact_secrets: opts.redact_secrets,
        })
    }

    /// Directory chunk files are written to
    pub fn output_dir_or_cwd(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
