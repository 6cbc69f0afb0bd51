//! Chunk packing flow - Greedy, priority-ordered packing into bounded chunks
//!
//! Entries are sorted by priority (highest first, discovery order on ties)
//! and appended to the current chunk as `header + content + terminator`.
//! A chunk is flushed to the sink as soon as the next entry would not fit.
//! An entry too large for an empty chunk is split into parts, each flushed as
//! its own chunk.
//!
//! Capacity, entry sizes and header sizes share one unit: bytes, or tokens
//! under the configured model. The chunk buffer itself is always a growable
//! byte vector, so token accounting never constrains the physical buffer.

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::config::{Config, SizeMode};
use crate::core::model::{FileEntry, PlanItem};
use crate::core::tokenizer::{count_tokens, floor_char_boundary, prefix_within_tokens};
use crate::flows::sink::ChunkSink;

/// Appended after every entry rendering
pub const TERMINATOR: &[u8] = b"\n";

/// Counters for one packing pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackStats {
    /// Chunks accepted by the sink
    pub chunks_written: usize,
    /// Chunks the sink failed to persist
    pub sink_failures: usize,
    /// Entries rendered whole into a chunk
    pub entries_packed: usize,
    /// Entries split into parts
    pub entries_split: usize,
    /// Entries without content
    pub entries_skipped: usize,
}

/// Sort by priority descending, then by discovery order
pub fn sort_for_packing(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
}

/// Header opening a whole entry
pub fn entry_header(chunk: usize, path: &str) -> Vec<u8> {
    format!("chunk {}\n>>>> {}\n", chunk, path).into_bytes()
}

/// Header opening one part of a split entry
pub fn part_header(chunk: usize, path: &str, part: usize) -> Vec<u8> {
    format!("chunk {}\n>>>> {}:part {}\n", chunk, path, part).into_bytes()
}

/// Measures content in the configured unit
#[derive(Debug, Clone, Copy)]
struct Measure(SizeMode);

impl Measure {
    fn size(&self, bytes: &[u8]) -> usize {
        match self.0 {
            SizeMode::Bytes => bytes.len(),
            SizeMode::Tokens(model) => count_tokens(bytes, model),
        }
    }

    fn unit(&self) -> &'static str {
        match self.0 {
            SizeMode::Bytes => "bytes",
            SizeMode::Tokens(_) => "tokens",
        }
    }

    /// Byte length of the longest prefix of `bytes` within `budget`
    ///
    /// Cuts only at character boundaries. Always makes progress on
    /// non-empty input: if nothing fits, one whole character (or one token)
    /// is taken anyway.
    fn fitting_prefix(&self, bytes: &[u8], budget: usize) -> usize {
        let take = match self.0 {
            SizeMode::Bytes => floor_char_boundary(bytes, budget),
            SizeMode::Tokens(model) => prefix_within_tokens(bytes, budget, model),
        };
        if take > 0 || bytes.is_empty() {
            return take;
        }
        match self.0 {
            SizeMode::Tokens(model) if prefix_within_tokens(bytes, 1, model) > 0 => {
                prefix_within_tokens(bytes, 1, model)
            }
            _ => first_char_len(bytes),
        }
    }
}

fn first_char_len(bytes: &[u8]) -> usize {
    let mut n = 1;
    while n < bytes.len() && (bytes[n] & 0b1100_0000) == 0b1000_0000 {
        n += 1;
    }
    n.min(bytes.len())
}

struct Packer<'a> {
    capacity: usize,
    measure: Measure,
    sink: &'a mut dyn ChunkSink,
    buf: Vec<u8>,
    used: usize,
    chunk: usize,
    stats: PackStats,
}

impl<'a> Packer<'a> {
    fn new(config: &Config, sink: &'a mut dyn ChunkSink) -> Self {
        Self {
            capacity: config.max_size,
            measure: Measure(config.size_mode),
            sink,
            buf: Vec::new(),
            used: 0,
            chunk: 0,
            stats: PackStats::default(),
        }
    }

    /// Hand the current chunk to the sink and start the next one
    fn flush(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        match self.sink.write_chunk(self.chunk, &self.buf) {
            Ok(()) => {
                debug!(chunk = self.chunk, bytes = self.buf.len(), used = self.used, "Chunk written");
                self.stats.chunks_written += 1;
            }
            Err(e) => {
                warn!(chunk = self.chunk, error = %e, "Failed to write chunk");
                self.stats.sink_failures += 1;
            }
        }
        self.chunk += 1;
        self.buf.clear();
        self.used = 0;
    }

    fn push_entry(&mut self, entry: &FileEntry) {
        let Some(content) = entry.content.as_deref() else {
            self.stats.entries_skipped += 1;
            return;
        };
        let path = entry.display_path();
        let size = self.measure.size(content);
        let terminator = self.measure.size(TERMINATOR);

        let mut header = entry_header(self.chunk, &path);
        let mut needed = self.measure.size(&header) + size + terminator;

        if !self.buf.is_empty() && self.used + needed > self.capacity {
            self.flush();
            // The chunk number is part of the header
            header = entry_header(self.chunk, &path);
            needed = self.measure.size(&header) + size + terminator;
        }

        if needed > self.capacity {
            self.flush();
            self.push_parts(&path, content);
            self.stats.entries_split += 1;
            return;
        }

        self.buf.extend_from_slice(&header);
        self.buf.extend_from_slice(content);
        self.buf.extend_from_slice(TERMINATOR);
        self.used += needed;
        self.stats.entries_packed += 1;
    }

    /// Emit `content` as consecutive parts, one chunk each
    fn push_parts(&mut self, path: &str, content: &[u8]) {
        let terminator = self.measure.size(TERMINATOR);
        let mut rest = content;
        let mut part = 0;

        loop {
            let header = part_header(self.chunk, path, part);
            let overhead = self.measure.size(&header) + terminator;
            let budget = self.capacity.saturating_sub(overhead);
            let take = self.measure.fitting_prefix(rest, budget);
            let (piece, tail) = rest.split_at(take);

            self.buf.extend_from_slice(&header);
            self.buf.extend_from_slice(piece);
            self.buf.extend_from_slice(TERMINATOR);
            self.used = overhead + self.measure.size(piece);
            self.flush();

            rest = tail;
            part += 1;
            if rest.is_empty() {
                break;
            }
        }

        debug!(path, parts = part, "Split oversized entry");
    }

    fn finish(mut self) -> PackStats {
        self.flush();
        if let Err(e) = self.sink.finish() {
            warn!(error = %e, "Failed to finalize output");
            self.stats.sink_failures += 1;
        }
        self.stats
    }
}

/// Sort `entries` and pack them into chunks handed to `sink`
///
/// Sink failures are logged and counted; packing always runs to the end.
pub fn pack_entries(
    entries: &mut [FileEntry],
    config: &Config,
    sink: &mut dyn ChunkSink,
) -> PackStats {
    sort_for_packing(entries);

    let mut packer = Packer::new(config, sink);
    for entry in entries.iter() {
        packer.push_entry(entry);
    }
    packer.finish()
}

/// Sort `entries` and describe them in packing order without writing anything
pub fn plan_entries(entries: &mut [FileEntry], config: &Config) -> Vec<PlanItem> {
    sort_for_packing(entries);

    let measure = Measure(config.size_mode);
    entries
        .iter()
        .filter_map(|e| {
            let content = e.content.as_deref()?;
            Some(PlanItem {
                path: e.display_path(),
                priority: e.priority,
                size: measure.size(content),
                unit: measure.unit(),
            })
        })
        .collect()
}
