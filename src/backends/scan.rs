//! Directory scanner - the single producer feeding the worker pool
//!
//! Walks a root with walkdir, one directory at a time, in file-name order:
//! - hidden entries (leading '.') are skipped, except the root itself
//! - symbolic links are never followed or reported
//! - overlong paths are skipped, along with their subtree
//! - chunk files and the aggregate left in the output directory are skipped
//! - on entering a directory its `.gitignore` is merged into the ignore list
//! - regular files that are neither ignored nor binary are pushed to the queue

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::backends::queue::WorkQueue;
use crate::core::config::Config;
use crate::core::filter::{self, Candidate, Pattern};
use crate::core::model::{ChunkError, FileEntry};
use crate::core::paths::{
    absolutize, exceeds_max_len, is_hidden, is_output_artifact, make_relative, normalize_path,
    MAX_PATH_LEN,
};

/// Name of the directory-local ignore file
pub const LOCAL_IGNORE_FILE: &str = ".gitignore";

/// Counters for one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub dirs_visited: usize,
    pub files_queued: usize,
    pub files_ignored: usize,
    pub files_binary: usize,
    pub entries_skipped: usize,
    pub errors: usize,
}

/// Walks directory trees and feeds accepted files into a `WorkQueue`
///
/// Discovery sequence numbers continue across `scan` calls, so entries from
/// several roots keep a single total order.
pub struct Scanner<'a> {
    config: &'a Config,
    queue: &'a WorkQueue,
    output_dir: Option<PathBuf>,
    max_path_len: usize,
    next_seq: u64,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a Config, queue: &'a WorkQueue) -> Self {
        Self {
            config,
            queue,
            output_dir: None,
            max_path_len: MAX_PATH_LEN,
            next_seq: 0,
        }
    }

    /// Skip the chunk files and aggregate output found directly in `dir`
    ///
    /// Everything else under `dir` is scanned as usual.
    pub fn skip_output_in(mut self, dir: &Path) -> Self {
        self.output_dir = Some(absolutize(dir));
        self
    }

    #[cfg(test)]
    fn with_max_path_len(mut self, max_path_len: usize) -> Self {
        self.max_path_len = max_path_len;
        self
    }

    /// Whether `path` is an artifact a previous run wrote to the output directory
    fn is_previous_output(&self, path: &Path) -> bool {
        let Some(output_dir) = &self.output_dir else {
            return false;
        };
        let named_like_output = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_output_artifact);
        if !named_like_output {
            return false;
        }
        match path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => absolutize(Path::new(".")) == *output_dir,
            Some(parent) => absolutize(parent) == *output_dir,
            None => false,
        }
    }

    /// Walk `root` to completion, pushing accepted files
    ///
    /// Only a refused queue allocation aborts the walk; every other problem
    /// skips the offending entry or subtree.
    pub fn scan(&mut self, root: &Path) -> Result<ScanStats, ChunkError> {
        let abs_root = absolutize(root);
        let mut stats = ScanStats::default();
        info!(root = %root.display(), "Scanning directory");

        let mut walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() > 0 && is_hidden(e.path()) {
                    debug!(path = %e.path().display(), "Skipping hidden entry");
                    return false;
                }
                true
            });

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Failed to read directory entry, skipping");
                    stats.errors += 1;
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                debug!(path = %entry.path().display(), "Skipping symbolic link");
                stats.entries_skipped += 1;
                continue;
            }

            if entry.depth() > 0 && exceeds_max_len(entry.path(), self.max_path_len) {
                debug!(path = %entry.path().display(), "Path too long, skipping");
                stats.entries_skipped += 1;
                if file_type.is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            if file_type.is_dir() {
                stats.dirs_visited += 1;
                self.merge_local_ignore(entry.path());
                continue;
            }

            if !file_type.is_file() {
                stats.entries_skipped += 1;
                continue;
            }

            if self.is_previous_output(entry.path()) {
                debug!(path = %entry.path().display(), "Skipping previous output");
                stats.entries_skipped += 1;
                continue;
            }

            let Some(rel_path) = make_relative(entry.path(), root) else {
                stats.entries_skipped += 1;
                continue;
            };
            let abs_path = normalize_path(&abs_root.join(&rel_path));
            let candidate = Candidate::new(&abs_path, &rel_path);

            if filter::should_ignore(&candidate, self.config) {
                debug!(path = %rel_path, "Ignoring file");
                stats.files_ignored += 1;
                continue;
            }
            if filter::is_binary(entry.path(), self.config) {
                debug!(path = %rel_path, "Skipping binary file");
                stats.files_binary += 1;
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let file_entry = FileEntry::discovered(
                entry.path().to_path_buf(),
                rel_path,
                abs_path,
                size,
                self.next_seq,
            );
            self.next_seq += 1;
            self.queue.push(file_entry)?;
            stats.files_queued += 1;
        }

        info!(
            root = %root.display(),
            dirs = stats.dirs_visited,
            queued = stats.files_queued,
            ignored = stats.files_ignored,
            binary = stats.files_binary,
            skipped = stats.entries_skipped,
            pending = self.queue.len(),
            "Scan complete"
        );
        Ok(stats)
    }

    /// Append the patterns of `dir/.gitignore` to the shared ignore list
    fn merge_local_ignore(&self, dir: &Path) {
        let path = dir.join(LOCAL_IGNORE_FILE);
        let Ok(text) = fs::read_to_string(&path) else {
            return;
        };

        let patterns = parse_ignore_file(&text);
        if !patterns.is_empty() {
            let added: Vec<&str> = patterns.iter().map(Pattern::as_str).collect();
            debug!(file = %path.display(), patterns = ?added, "Merging local ignore rules");
            self.config.ignore.extend(patterns);
            debug!(total = self.config.ignore.len(), "Ignore list grew");
        }
    }
}

/// Parse one pattern per line, skipping blanks, `#` comments and invalid globs
///
/// A line ending in `/` names a directory: `build/` becomes `**/build/**`
/// and `src/gen/` becomes `src/gen/**`.
pub fn parse_ignore_file(text: &str) -> Vec<Pattern> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let raw = match line.strip_suffix('/') {
                Some(dir) if dir.contains('/') => format!("{}/**", dir),
                Some(dir) => format!("**/{}/**", dir),
                None => line.to_string(),
            };
            match Pattern::new(&raw) {
                Ok(p) => Some(p),
                Err(e) => {
                    debug!(error = %e, "Skipping invalid ignore line");
                    None
                }
            }
        })
        .collect()
}
