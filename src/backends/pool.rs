//! Worker pool - reads queued files concurrently and collects the results
//!
//! Workers are started when the pool is created and run until shutdown.
//! Each worker pops a file, reads it through the `ContentReader`, computes
//! its priority and appends it to the shared results. Unreadable files are
//! dropped and counted.
//!
//! `wait_until_done` is the quiescence barrier: it returns once the queue is
//! empty and no worker holds an entry. The pool stays usable afterwards, so
//! several roots can be scanned through the same workers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

use crate::backends::queue::{WorkGuard, WorkQueue};
use crate::core::config::Config;
use crate::core::file_reader::{redact_secrets, ContentReader};
use crate::core::filter;
use crate::core::model::{ChunkError, FileEntry};

/// Initial reservation for the results list
pub const INITIAL_RESULTS_CAPACITY: usize = 1024;

struct Shared {
    queue: WorkQueue,
    results: Mutex<Vec<FileEntry>>,
    config: Arc<Config>,
    reader: Arc<dyn ContentReader>,
    files_read: AtomicUsize,
    files_dropped: AtomicUsize,
    /// First results-growth failure, reported by the next barrier
    failure: Mutex<Option<ChunkError>>,
}

impl Shared {
    fn results(&self) -> MutexGuard<'_, Vec<FileEntry>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_failure(&self, err: ChunkError) {
        let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}

/// Fixed-size pool of file-reading workers
pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Allocate the queue and results list, then start `config.num_threads` workers
    pub fn new(config: Arc<Config>, reader: Arc<dyn ContentReader>) -> Result<Self, ChunkError> {
        let queue = WorkQueue::new()?;

        let mut results = Vec::new();
        results
            .try_reserve_exact(INITIAL_RESULTS_CAPACITY)
            .map_err(|_| ChunkError::Allocation {
                what: "results list",
                requested: INITIAL_RESULTS_CAPACITY,
            })?;

        let num_threads = config.num_threads;
        let shared = Arc::new(Shared {
            queue,
            results: Mutex::new(results),
            config,
            reader,
            files_read: AtomicUsize::new(0),
            files_dropped: AtomicUsize::new(0),
            failure: Mutex::new(None),
        });

        let mut pool = Self {
            shared,
            handles: Vec::with_capacity(num_threads),
        };

        for id in 0..num_threads {
            let shared = Arc::clone(&pool.shared);
            // On failure, dropping `pool` stops and joins the workers already started
            let handle = thread::Builder::new()
                .name(format!("ctxchunk-worker-{}", id))
                .spawn(move || worker_loop(id, &shared))
                .map_err(ChunkError::PoolSpawn)?;
            pool.handles.push(handle);
        }

        debug!(workers = num_threads, "Worker pool started");
        Ok(pool)
    }

    /// The queue the scanner pushes into
    pub fn queue(&self) -> &WorkQueue {
        &self.shared.queue
    }

    /// Number of worker threads
    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    /// Block until the queue is empty and no worker is mid-task
    ///
    /// Returns the first results-growth failure seen since the last call.
    pub fn wait_until_done(&self) -> Result<(), ChunkError> {
        self.shared.queue.wait_until_idle();
        debug_assert!(self.shared.queue.is_empty());
        let failure = self
            .shared
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Number of collected results
    pub fn results_len(&self) -> usize {
        self.shared.results().len()
    }

    /// Files read successfully so far
    pub fn files_read(&self) -> usize {
        self.shared.files_read.load(Ordering::Relaxed)
    }

    /// Files dropped because their content could not be read
    pub fn files_dropped(&self) -> usize {
        self.shared.files_dropped.load(Ordering::Relaxed)
    }

    /// Stop the workers after they drain the queue, and hand back the results
    pub fn shutdown(mut self) -> Vec<FileEntry> {
        self.stop_and_join();
        std::mem::take(&mut *self.shared.results())
    }

    fn stop_and_join(&mut self) {
        self.shared.queue.shutdown();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn worker_loop(id: usize, shared: &Shared) {
    debug!(worker = id, "Worker started");

    while let Some(entry) = shared.queue.pop_or_wait() {
        let _guard = WorkGuard::new(&shared.queue);
        if let Some(loaded) = process_entry(entry, shared) {
            let mut results = shared.results();
            if results.len() == results.capacity() {
                let additional = results.len().max(1);
                if results.try_reserve_exact(additional).is_err() {
                    drop(results);
                    shared.files_dropped.fetch_add(1, Ordering::Relaxed);
                    shared.record_failure(ChunkError::Allocation {
                        what: "results list",
                        requested: additional,
                    });
                    continue;
                }
            }
            results.push(loaded);
        }
    }

    debug!(worker = id, "Worker exiting");
}

/// Read content and compute priority; `None` if the file cannot be read
fn process_entry(mut entry: FileEntry, shared: &Shared) -> Option<FileEntry> {
    debug_assert!(!entry.is_loaded(), "entry read twice: {}", entry.rel_path);
    let content = match shared.reader.read(&entry.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %entry.path.display(), error = %e, "Dropping unreadable file");
            shared.files_dropped.fetch_add(1, Ordering::Relaxed);
            return None;
        }
    };

    let content = if shared.config.redact_secrets {
        redact_secrets(&content)
    } else {
        content
    };

    entry.size = content.len() as u64;
    entry.content = Some(content);
    entry.priority = filter::priority(&entry.candidate(), &shared.config);
    shared.files_read.fetch_add(1, Ordering::Relaxed);
    Some(entry)
}
