//! Backends module - The concurrent scanning pipeline
//!
//! Provides:
//! - queue: Growable LIFO work queue with in-flight tracking
//! - pool: Fixed worker pool and quiescence barrier
//! - scan: Directory scanner with walkdir

pub mod pool;
pub mod queue;
pub mod scan;
