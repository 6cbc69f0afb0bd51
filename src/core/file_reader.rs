//! File reading strategies
//!
//! Provides:
//! - Whole-file reads for workers (no partial results)
//! - Null-byte sniffing for binary detection
//! - Optional redaction of key-like secrets before content is chunked

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Number of leading bytes inspected when sniffing for binary content
pub const BINARY_SNIFF_LEN: usize = 8192;

/// Replacement line emitted for redacted secrets
pub const REDACTED_LINE: &[u8] = b"[API_KEY_REDACTED]";

/// Reads file content for the worker pool
pub trait ContentReader: Send + Sync {
    /// Return the full content of `path`, or an error if it cannot be read
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads straight from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl ContentReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        read_file_bytes(path)
    }
}

/// Read an entire file into memory
pub fn read_file_bytes(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Whether the first `BINARY_SNIFF_LEN` bytes of a file contain a null byte
///
/// A file that cannot be opened or read is reported as binary so it stays
/// out of text processing.
pub fn sniff_binary(path: &Path) -> bool {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return true,
    };

    let mut head = Vec::with_capacity(BINARY_SNIFF_LEN);
    match file.take(BINARY_SNIFF_LEN as u64).read_to_end(&mut head) {
        Ok(_) => head.contains(&0),
        Err(_) => true,
    }
}

// A quoted string holding a 20+ character run of key-like characters
static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"['"].*[a-zA-Z0-9_-]{20,}.*['"]"#).expect("secret pattern is valid")
});

/// Replace every line that looks like it carries an API key
///
/// Line terminators are preserved as written; a redacted line keeps its
/// trailing `\n` (and `\r`, if present).
pub fn redact_secrets(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    for line in content.split_inclusive(|&b| b == b'\n') {
        let (body, ending) = split_line_ending(line);
        if SECRET_PATTERN.is_match(body) {
            out.extend_from_slice(REDACTED_LINE);
        } else {
            out.extend_from_slice(body);
        }
        out.extend_from_slice(ending);
    }
    out
}

fn split_line_ending(line: &[u8]) -> (&[u8], &[u8]) {
    let mut end = line.len();
    if end > 0 && line[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && line[end - 1] == b'\r' {
            end -= 1;
        }
    }
    line.split_at(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_file_bytes() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, b"hello\nworld\n").unwrap();
        assert_eq!(read_file_bytes(&path).unwrap(), b"hello\nworld\n");
    }

    #[test]
    fn test_read_missing_file_fails() {
        let temp = tempdir().unwrap();
        assert!(FsReader.read(&temp.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_sniff_binary_null_byte() {
        let temp = tempdir().unwrap();
        let bin = temp.path().join("blob.dat");
        fs::write(&bin, b"ABC\0DEF").unwrap();
        assert!(sniff_binary(&bin));

        let text = temp.path().join("plain.txt");
        fs::write(&text, b"just text").unwrap();
        assert!(!sniff_binary(&text));
    }

    #[test]
    fn test_sniff_binary_only_checks_head() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("late_null.txt");
        let mut data = vec![b'a'; BINARY_SNIFF_LEN];
        data.push(0);
        fs::write(&path, data).unwrap();
        assert!(!sniff_binary(&path));
    }

    #[test]
    fn test_sniff_binary_unreadable_is_binary() {
        let temp = tempdir().unwrap();
        assert!(sniff_binary(&temp.path().join("missing")));
    }

    #[test]
    fn test_redact_secrets() {
        let input = b"let a = 1;\r\nkey = \"sk_live_ABCDEFGHIJKLMNOPQRSTUV\"\nlast";
        let out = redact_secrets(input);
        assert_eq!(out, b"let a = 1;\r\n[API_KEY_REDACTED]\nlast".to_vec());
    }

    #[test]
    fn test_redact_secrets_keeps_short_strings() {
        let input = b"name = \"short\"\n";
        assert_eq!(redact_secrets(input), input.to_vec());
    }
}
