//! Work queue shared by the scanner and the worker pool
//!
//! A LIFO stack of discovered files guarded by one mutex. The same mutex
//! guards the in-flight counter and the shutdown flag, so a single condition
//! variable can wake idle workers and the quiescence barrier alike.
//!
//! Storage grows by doubling and never shrinks. Growth goes through
//! `try_reserve`, so running out of memory surfaces as an error to the
//! pusher rather than an abort.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::core::model::{ChunkError, FileEntry};

/// Entries reserved up front
pub const INITIAL_QUEUE_CAPACITY: usize = 1024;

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total entries pushed
    pub pushed: AtomicUsize,

    /// Total entries popped by workers
    pub popped: AtomicUsize,

    /// Number of times the backing storage grew
    pub growths: AtomicUsize,
}

#[derive(Debug)]
struct QueueState {
    entries: Vec<FileEntry>,
    in_flight: usize,
    shutdown: bool,
}

/// Thread-safe growable stack of pending files
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    signal: Condvar,
    stats: QueueStats,
}

impl WorkQueue {
    /// Create a queue with `INITIAL_QUEUE_CAPACITY` slots reserved
    pub fn new() -> Result<Self, ChunkError> {
        Self::with_capacity(INITIAL_QUEUE_CAPACITY)
    }

    /// Create a queue with `capacity` slots reserved
    pub fn with_capacity(capacity: usize) -> Result<Self, ChunkError> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| ChunkError::Allocation {
                what: "work queue",
                requested: capacity,
            })?;

        Ok(Self {
            state: Mutex::new(QueueState {
                entries,
                in_flight: 0,
                shutdown: false,
            }),
            signal: Condvar::new(),
            stats: QueueStats::default(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push an entry and wake one waiting worker
    ///
    /// Fails only if the storage had to grow and the allocation was refused;
    /// the queue is left unchanged in that case.
    pub fn push(&self, entry: FileEntry) -> Result<(), ChunkError> {
        {
            let mut state = self.lock();
            let len = state.entries.len();
            if len == state.entries.capacity() {
                let additional = len.max(1);
                state
                    .entries
                    .try_reserve_exact(additional)
                    .map_err(|_| ChunkError::Allocation {
                        what: "work queue",
                        requested: additional,
                    })?;
                self.stats.growths.fetch_add(1, Ordering::Relaxed);
                debug!(capacity = state.entries.capacity(), "Work queue grew");
            }
            state.entries.push(entry);
        }
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        self.signal.notify_one();
        Ok(())
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserved slots in the backing storage
    pub fn capacity(&self) -> usize {
        self.lock().entries.capacity()
    }

    /// Number of entries popped but not yet finished
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Get queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Block until an entry is available, or return `None` once shut down and drained
    ///
    /// A returned entry is counted as in flight until `finish` is called,
    /// normally through a `WorkGuard`.
    pub(crate) fn pop_or_wait(&self) -> Option<FileEntry> {
        let mut state = self.lock();
        loop {
            if let Some(entry) = state.entries.pop() {
                state.in_flight += 1;
                self.stats.popped.fetch_add(1, Ordering::Relaxed);
                return Some(entry);
            }
            if state.shutdown {
                return None;
            }
            state = self
                .signal
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Mark one in-flight entry as done and wake every waiter
    pub(crate) fn finish(&self) {
        {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.signal.notify_all();
    }

    /// Block until the queue is empty and nothing is in flight
    pub fn wait_until_idle(&self) {
        let mut state = self.lock();
        while !(state.entries.is_empty() && state.in_flight == 0) {
            state = self
                .signal
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Ask workers to exit once the queue is drained
    pub(crate) fn shutdown(&self) {
        self.lock().shutdown = true;
        self.signal.notify_all();
    }
}

/// RAII guard for an in-flight entry
pub struct WorkGuard<'a> {
    queue: &'a WorkQueue,
}

impl<'a> WorkGuard<'a> {
    pub fn new(queue: &'a WorkQueue) -> Self {
        Self { queue }
    }
}

impl Drop for WorkGuard<'_> {
    fn drop(&mut self) {
        self.queue.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn entry(name: &str, seq: u64) -> FileEntry {
        FileEntry::discovered(PathBuf::from(name), name, format!("/{}", name), 0, seq)
    }

    #[test]
    fn test_push_and_len() {
        let queue = WorkQueue::new().unwrap();
        assert!(queue.is_empty());
        queue.push(entry("a", 0)).unwrap();
        queue.push(entry("b", 1)).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().pushed.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_pop_is_lifo() {
        let queue = WorkQueue::new().unwrap();
        queue.push(entry("first", 0)).unwrap();
        queue.push(entry("second", 1)).unwrap();
        let popped = queue.pop_or_wait().unwrap();
        assert_eq!(popped.rel_path, "second");
        assert_eq!(queue.in_flight(), 1);
        queue.finish();
        assert_eq!(queue.in_flight(), 0);
    }

    #[test]
    fn test_capacity_doubles_and_never_shrinks() {
        let queue = WorkQueue::with_capacity(2).unwrap();
        assert_eq!(queue.capacity(), 2);
        for i in 0..3 {
            queue.push(entry("f", i)).unwrap();
        }
        let grown = queue.capacity();
        assert!(grown >= 4);
        assert_eq!(queue.stats().growths.load(Ordering::Relaxed), 1);

        queue.shutdown();
        while queue.pop_or_wait().is_some() {
            queue.finish();
        }
        assert_eq!(queue.capacity(), grown);
    }

    #[test]
    fn test_zero_capacity_grows_on_first_push() {
        let queue = WorkQueue::with_capacity(0).unwrap();
        queue.push(entry("a", 0)).unwrap();
        assert_eq!(queue.len(), 1);
        assert!(queue.capacity() >= 1);
    }

    #[test]
    fn test_shutdown_on_empty_queue_returns_none() {
        let queue = WorkQueue::new().unwrap();
        queue.shutdown();
        assert!(queue.pop_or_wait().is_none());
    }

    #[test]
    fn test_shutdown_still_drains_pending() {
        let queue = WorkQueue::new().unwrap();
        queue.push(entry("a", 0)).unwrap();
        queue.shutdown();
        assert!(queue.pop_or_wait().is_some());
        queue.finish();
        assert!(queue.pop_or_wait().is_none());
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(WorkQueue::new().unwrap());
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_or_wait().map(|e| e.rel_path))
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(entry("late", 0)).unwrap();
        assert_eq!(waiter.join().unwrap(), Some("late".to_string()));
    }

    #[test]
    fn test_wait_until_idle_waits_for_in_flight() {
        let queue = Arc::new(WorkQueue::new().unwrap());
        queue.push(entry("a", 0)).unwrap();
        let popped = queue.pop_or_wait();
        assert!(popped.is_some());

        let finisher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                let _guard = WorkGuard::new(&queue);
            })
        };

        queue.wait_until_idle();
        assert_eq!(queue.in_flight(), 0);
        finisher.join().unwrap();
    }
}
