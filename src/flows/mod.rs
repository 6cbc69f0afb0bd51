//! Flows module - Operations combining the pipeline stages
//!
//! Provides:
//! - chunk: Scan, read and pack a set of directories end to end
//! - pack: Priority-ordered greedy packing into bounded chunks
//! - sink: Destinations for finished chunks

pub mod chunk;
pub mod pack;
pub mod sink;
