//! Data model shared by the scanner, the worker pool and the chunk packer
//!
//! A `FileEntry` is created by the scanner, filled in exactly once by a
//! worker, and read by the packer after the pool is quiescent.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the caller of a pipeline operation
#[derive(Error, Debug)]
pub enum ChunkError {
    /// Configuration rejected during validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A glob pattern failed to compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A priority rule was not in `pattern,score` form
    #[error("Priority rule must be 'pattern,score' with an integer score: '{0}'")]
    InvalidPriorityRule(String),

    /// Growing the queue or the results list failed
    #[error("Failed to reserve space for {requested} more entries in the {what}")]
    Allocation { what: &'static str, requested: usize },

    /// A worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    PoolSpawn(#[source] std::io::Error),

    /// I/O failure that the caller asked to see
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One discovered file
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path as rendered in chunk headers (the scan root joined with the relative path)
    pub path: PathBuf,

    /// Path relative to the scan root, using '/' as separator
    pub rel_path: String,

    /// Absolute path, using '/' as separator
    pub abs_path: String,

    /// File content, `None` until a worker has read it
    pub content: Option<Vec<u8>>,

    /// Size in bytes (from metadata at discovery, from content once read)
    pub size: u64,

    /// Priority score, 0 until computed by a worker
    pub priority: i32,

    /// Discovery order, used to break priority ties
    pub seq: u64,
}

impl FileEntry {
    /// Create an unread entry as the scanner discovers it
    pub fn discovered(
        path: PathBuf,
        rel_path: impl Into<String>,
        abs_path: impl Into<String>,
        size: u64,
        seq: u64,
    ) -> Self {
        Self {
            path,
            rel_path: rel_path.into(),
            abs_path: abs_path.into(),
            content: None,
            size,
            priority: 0,
            seq,
        }
    }

    /// Header path, normalized to '/' separators
    pub fn display_path(&self) -> String {
        crate::core::paths::normalize_path(&self.path)
    }

    /// Whether a worker has filled in the content
    pub fn is_loaded(&self) -> bool {
        self.content.is_some()
    }

    /// The views of this path that filter patterns match against
    pub fn candidate(&self) -> crate::core::filter::Candidate<'_> {
        crate::core::filter::Candidate::new(&self.abs_path, &self.rel_path)
    }
}

/// One entry of a dry-run plan, in packing order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanItem {
    pub path: String,
    pub priority: i32,
    /// Size in the configured unit
    pub size: usize,
    /// "bytes" or "tokens"
    pub unit: &'static str,
}

/// Counters reported after a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Files accepted by the scanner and pushed onto the queue
    pub files_discovered: usize,
    /// Files read successfully by workers
    pub files_read: usize,
    /// Files whose content could not be read
    pub files_dropped: usize,
    /// Output units handed to the sink
    pub chunks_written: usize,
    /// Output units the sink failed to persist
    pub sink_failures: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovered_entry_is_unloaded() {
        let entry =
            FileEntry::discovered(PathBuf::from("root/a.txt"), "a.txt", "/root/a.txt", 12, 3);
        assert!(!entry.is_loaded());
        assert_eq!(entry.priority, 0);
        assert_eq!(entry.size, 12);
        assert_eq!(entry.seq, 3);
        assert_eq!(entry.rel_path, "a.txt");
    }

    #[test]
    fn test_display_path_uses_forward_slashes() {
        let entry = FileEntry::discovered(
            PathBuf::from("root/sub/b.txt"),
            "sub/b.txt",
            "/root/sub/b.txt",
            0,
            0,
        );
        assert_eq!(entry.display_path(), "root/sub/b.txt");
    }

    #[test]
    fn test_error_messages() {
        let err = ChunkError::InvalidPriorityRule("foo".to_string());
        assert!(err.to_string().contains("pattern,score"));

        let err = ChunkError::Allocation {
            what: "work queue",
            requested: 1,
        };
        assert!(err.to_string().contains("work queue"));
    }
}
