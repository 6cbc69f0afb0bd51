//! Core module - Contains the fundamental data structures and utilities
//!
//! This module provides:
//! - Data model (FileEntry) and error type
//! - Validated run configuration
//! - Filter engine: ignore/unignore, priority and binary decisions
//! - File reading and secret redaction
//! - Path normalization utilities
//! - Token counting for token-mode chunking
//! - Rendering of dry-run plans

pub mod config;
pub mod file_reader;
pub mod filter;
pub mod model;
pub mod paths;
pub mod render;
pub mod tokenizer;
