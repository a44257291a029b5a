//! Foundational utilities shared across huddle crates.
//!
//! Provides the atomic file-write helper used by the tracked-item state file
//! and action log, plus unix-time helpers for timestamps on log entries.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms};
