//! Path normalization utilities
//!
//! Paths are rendered and matched with '/' as separator and relative to the scan root.

use std::path::Path;

/// Longest path the scanner will construct; longer entries are skipped
pub const MAX_PATH_LEN: usize = 4096;

/// Normalize a path to use '/' as separator (for cross-platform consistency)
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Make a path relative to the root directory
pub fn make_relative(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(normalize_path)
}

/// Check if a path is hidden (starts with '.')
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Whether a constructed path is longer than `max_len` bytes
pub fn exceeds_max_len(path: &Path, max_len: usize) -> bool {
    path.as_os_str().len() > max_len
}

/// File name of the aggregate output
pub const AGGREGATE_FILE_NAME: &str = "whole_chunk_mode-output.txt";

/// File name of numbered chunk `index`
pub fn chunk_file_name(index: usize) -> String {
    format!("chunk-{}.txt", index)
}

/// Whether `name` is one of the files a run writes: `chunk-<n>.txt` or the aggregate
pub fn is_output_artifact(name: &str) -> bool {
    if name == AGGREGATE_FILE_NAME {
        return true;
    }
    name.strip_prefix("chunk-")
        .and_then(|rest| rest.strip_suffix(".txt"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Absolute form of a path without requiring it to exist
pub fn absolutize(path: &Path) -> std::path::PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}
