//! Chunk sinks - where packed chunks are written
//!
//! - `StreamSink`: every chunk to a writer (stdout) in chunk order
//! - `FileSink`: one `chunk-<n>.txt` per chunk in the output directory
//! - `AggregateSink`: every chunk appended to one aggregate file

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::config::{Config, OutputMode};
use crate::core::paths::{chunk_file_name, AGGREGATE_FILE_NAME};

/// Receives each finished chunk
pub trait ChunkSink {
    /// Persist one chunk; `index` is the chunk number
    fn write_chunk(&mut self, index: usize, bytes: &[u8]) -> io::Result<()>;

    /// Flush anything buffered once the last chunk has been written
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes chunks back to back into a stream
pub struct StreamSink<W: Write> {
    out: W,
}

impl<W: Write> StreamSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ChunkSink for StreamSink<W> {
    fn write_chunk(&mut self, _index: usize, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)?;
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Writes `chunk-<n>.txt` files
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file holding chunk `index`
    pub fn chunk_path(&self, index: usize) -> PathBuf {
        self.dir.join(chunk_file_name(index))
    }
}

impl ChunkSink for FileSink {
    fn write_chunk(&mut self, index: usize, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.chunk_path(index), bytes)
    }
}

/// Appends every chunk to a single file, created on the first chunk
pub struct AggregateSink {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl AggregateSink {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(AGGREGATE_FILE_NAME),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChunkSink for AggregateSink {
    fn write_chunk(&mut self, _index: usize, bytes: &[u8]) -> io::Result<()> {
        let writer = match self.file.as_mut() {
            Some(w) => w,
            None => self.file.insert(BufWriter::new(File::create(&self.path)?)),
        };
        writer.write_all(bytes)
    }

    fn finish(&mut self) -> io::Result<()> {
        let Some(writer) = self.file.as_mut() else {
            return Ok(());
        };
        writer.flush()?;
        debug!(path = %self.path().display(), "Aggregate output written");
        Ok(())
    }
}

/// Build the sink matching the configured output mode
pub fn sink_for(config: &Config) -> Box<dyn ChunkSink> {
    match config.output_mode {
        OutputMode::Stream => Box::new(StreamSink::new(io::stdout().lock())),
        OutputMode::Files => Box::new(FileSink::new(config.output_dir_or_cwd())),
        OutputMode::Aggregate => Box::new(AggregateSink::new(&config.output_dir_or_cwd())),
    }
}

/// Keeps chunks in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub chunks: Vec<(usize, Vec<u8>)>,
    /// Fail every write whose index is listed
    pub fail_on: Vec<usize>,
}

#[cfg(test)]
impl MemorySink {
    /// All chunks concatenated, lossily decoded
    pub fn text(&self) -> String {
        self.chunks
            .iter()
            .map(|(_, b)| String::from_utf8_lossy(b).into_owned())
            .collect()
    }
}

#[cfg(test)]
impl ChunkSink for MemorySink {
    fn write_chunk(&mut self, index: usize, bytes: &[u8]) -> io::Result<()> {
        if self.fail_on.contains(&index) {
            return Err(io::Error::other("refused"));
        }
        self.chunks.push((index, bytes.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_sink_names_chunks() {
        let temp = tempdir().unwrap();
        let mut sink = FileSink::new(temp.path());
        sink.write_chunk(0, b"zero").unwrap();
        sink.write_chunk(1, b"one").unwrap();
        assert_eq!(fs::read(temp.path().join("chunk-0.txt")).unwrap(), b"zero");
        assert_eq!(fs::read(temp.path().join("chunk-1.txt")).unwrap(), b"one");
    }

    #[test]
    fn test_file_sink_missing_dir_fails() {
        let temp = tempdir().unwrap();
        let mut sink = FileSink::new(temp.path().join("nope"));
        assert!(sink.write_chunk(0, b"x").is_err());
    }

    #[test]
    fn test_aggregate_sink_concatenates() {
        let temp = tempdir().unwrap();
        let mut sink = AggregateSink::new(temp.path());
        sink.write_chunk(0, b"a\n").unwrap();
        sink.write_chunk(1, b"b\n").unwrap();
        sink.finish().unwrap();
        assert_eq!(fs::read(sink.path()).unwrap(), b"a\nb\n");
    }

    #[test]
    fn test_aggregate_sink_without_chunks_creates_nothing() {
        let temp = tempdir().unwrap();
        let mut sink = AggregateSink::new(temp.path());
        sink.finish().unwrap();
        assert!(!sink.path().exists());
    }

    #[test]
    fn test_stream_sink_writes_in_order() {
        let mut buf = Vec::new();
        {
            let mut sink = StreamSink::new(&mut buf);
            sink.write_chunk(0, b"first ").unwrap();
            sink.write_chunk(1, b"second").unwrap();
        }
        assert_eq!(buf, b"first second");
    }
}
