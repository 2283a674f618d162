//! Data models module
//!
//! Contains the persisted result rows, round aggregation and run summaries.

pub mod result;

// Re-export commonly used types
pub use result::{aggregate, ResultRow, RowMetrics, RunReport};
