//! Utility functions module
//!
//! Helpers for human-readable counts and durations.

pub mod units;

// Re-export commonly used functions
pub use units::{format_count, format_millis, parse_count};
