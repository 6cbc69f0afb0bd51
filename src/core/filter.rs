//! Filter engine - ignore, unignore, binary and priority decisions for a path
//!
//! Patterns are glob-style and path-aware: `*` and `?` never cross a `/`,
//! `**` spans directories, and matching is case-insensitive. A pattern
//! without a `/` also matches against the bare file name, so `*.me` hits
//! `a/b/ignore.me`. A pattern starting with `/` is matched against the
//! absolute path.

use globset::{GlobBuilder, GlobMatcher};
use std::path::Path;

use crate::core::config::Config;
use crate::core::file_reader::sniff_binary;
use crate::core::model::ChunkError;

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    matcher: GlobMatcher,
    absolute: bool,
    name_only: bool,
}

impl Pattern {
    /// Compile a raw glob pattern
    pub fn new(raw: &str) -> Result<Self, ChunkError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ChunkError::InvalidPattern {
                pattern: raw.to_string(),
                reason: "empty pattern".to_string(),
            });
        }

        let matcher = GlobBuilder::new(trimmed)
            .literal_separator(true)
            .case_insensitive(true)
            .backslash_escape(false)
            .build()
            .map(|g| g.compile_matcher())
            .map_err(|e| ChunkError::InvalidPattern {
                pattern: raw.to_string(),
                reason: e.kind().to_string(),
            })?;

        Ok(Self {
            raw: trimmed.to_string(),
            matcher,
            absolute: trimmed.starts_with('/'),
            name_only: !trimmed.contains('/'),
        })
    }

    /// Compile a list of raw patterns, failing on the first invalid one
    pub fn compile_all<S: AsRef<str>>(raws: &[S]) -> Result<Vec<Self>, ChunkError> {
        raws.iter().map(|r| Self::new(r.as_ref())).collect()
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this pattern matches the candidate path
    pub fn matches(&self, candidate: &Candidate<'_>) -> bool {
        if self.absolute {
            return self.matcher.is_match(candidate.absolute);
        }
        if self.matcher.is_match(candidate.relative) {
            return true;
        }
        self.name_only && self.matcher.is_match(candidate.name)
    }
}

/// The three views of a path that patterns are matched against
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Absolute path, '/'-separated
    pub absolute: &'a str,
    /// Path relative to the scan root, '/'-separated
    pub relative: &'a str,
    /// Final path component
    pub name: &'a str,
}

impl<'a> Candidate<'a> {
    pub fn new(absolute: &'a str, relative: &'a str) -> Self {
        let name = relative.rsplit('/').next().unwrap_or(relative);
        Self {
            absolute,
            relative,
            name,
        }
    }
}

/// Whether a path is excluded: it matches no unignore pattern and at least one ignore pattern
///
/// The ignore list is read from a snapshot, so growth published by the
/// scanner while this runs is seen on the next call.
pub fn should_ignore(candidate: &Candidate<'_>, config: &Config) -> bool {
    if config.unignore.iter().any(|p| p.matches(candidate)) {
        return false;
    }
    config.ignore.snapshot().iter().any(|p| p.matches(candidate))
}

/// Highest score among matching priority rules, floored at 0
pub fn priority(candidate: &Candidate<'_>, config: &Config) -> i32 {
    config
        .priority_rules
        .iter()
        .filter(|rule| rule.pattern.matches(candidate))
        .map(|rule| rule.score)
        .fold(0, i32::max)
}

/// Whether a file is binary, by extension first and then by content sniffing
pub fn is_binary(path: &Path, config: &Config) -> bool {
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| config.binary_exts.contains(&ext.to_lowercase()))
        .unwrap_or(false);

    by_extension || sniff_binary(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigOptions;
    use std::fs;
    use tempfile::tempdir;

    fn config_with(ignore: &[&str], unignore: &[&str], rules: &[&str]) -> Config {
        let opts = ConfigOptions {
            ignore: ignore.iter().map(|s| s.to_string()).collect(),
            unignore: unignore.iter().map(|s| s.to_string()).collect(),
            priority_rules: rules.iter().map(|s| s.to_string()).collect(),
            binary_extensions: vec!["bin".to_string(), "EXE".to_string()],
            ..Default::default()
        };
        Config::from_options(opts).unwrap()
    }

    fn cand<'a>(rel: &'a str) -> Candidate<'a> {
        Candidate::new(rel, rel)
    }

    #[test]
    fn test_pattern_matches_file_name() {
        let p = Pattern::new("*.me").unwrap();
        assert!(p.matches(&cand("ignore.me")));
        assert!(p.matches(&cand("deep/dir/ignore.me")));
        assert!(!p.matches(&cand("ignore.md")));
    }

    #[test]
    fn test_pattern_is_case_insensitive() {
        let p = Pattern::new("*.TXT").unwrap();
        assert!(p.matches(&cand("notes.txt")));
    }

    #[test]
    fn test_pattern_star_does_not_cross_separator() {
        let p = Pattern::new("src/*.rs").unwrap();
        assert!(p.matches(&cand("src/main.rs")));
        assert!(!p.matches(&cand("src/core/model.rs")));

        let deep = Pattern::new("src/**/*.rs").unwrap();
        assert!(deep.matches(&cand("src/core/model.rs")));
    }

    #[test]
    fn test_absolute_pattern_uses_absolute_path() {
        let p = Pattern::new("/tmp/**/secret.txt").unwrap();
        let c = Candidate::new("/tmp/x/secret.txt", "secret.txt");
        assert!(p.matches(&c));
        let other = Candidate::new("/home/x/secret.txt", "secret.txt");
        assert!(!p.matches(&other));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(Pattern::new("  ").is_err());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(Pattern::new("[unclosed").is_err());
    }

    #[test]
    fn test_should_ignore() {
        let config = config_with(&["*.me"], &[], &[]);
        assert!(should_ignore(&cand("ignore.me"), &config));
        assert!(!should_ignore(&cand("keep.txt"), &config));
    }

    #[test]
    fn test_unignore_overrides_ignore() {
        let config = config_with(&["*.txt"], &["keep.txt"], &[]);
        assert!(!should_ignore(&cand("keep.txt"), &config));
        assert!(should_ignore(&cand("other.txt"), &config));
    }

    #[test]
    fn test_should_ignore_sees_grown_rules() {
        let config = config_with(&[], &[], &[]);
        assert!(!should_ignore(&cand("build.log"), &config));
        config.ignore.extend(vec![Pattern::new("*.log").unwrap()]);
        assert!(should_ignore(&cand("build.log"), &config));
    }

    #[test]
    fn test_priority_takes_maximum() {
        let config = config_with(&[], &[], &["*.txt,5", "*another.txt,10", "*.md,1"]);
        assert_eq!(priority(&cand("another.txt"), &config), 10);
        assert_eq!(priority(&cand("keep.txt"), &config), 5);
        assert_eq!(priority(&cand("main.rs"), &config), 0);
    }

    #[test]
    fn test_negative_priority_floors_at_zero() {
        let config = config_with(&[], &[], &["*.log,-3"]);
        assert_eq!(priority(&cand("a.log"), &config), 0);
    }

    #[test]
    fn test_is_binary_by_extension_case_insensitive() {
        let temp = tempdir().unwrap();
        let config = config_with(&[], &[], &[]);
        let path = temp.path().join("tool.Exe");
        fs::write(&path, b"plain text").unwrap();
        assert!(is_binary(&path, &config));
    }

    #[test]
    fn test_is_binary_by_content() {
        let temp = tempdir().unwrap();
        let config = config_with(&[], &[], &[]);
        let bin = temp.path().join("data.dat");
        fs::write(&bin, b"ABC\0DEF").unwrap();
        assert!(is_binary(&bin, &config));

        let text = temp.path().join("notes.txt");
        fs::write(&text, b"hello").unwrap();
        assert!(!is_binary(&text, &config));
    }
}
