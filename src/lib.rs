//! scalebench - master/worker scalability benchmark
//!
//! Partitions a declared workload across a pool of heterogeneous workers,
//! dispatches the partitions over rank-addressed channels, waits for every
//! partial result and records aggregate timing and accuracy per test case.

use std::fmt;
use std::time::Duration;

pub mod bench;
pub mod config;
pub mod models;
pub mod simple;
pub mod util;

/// Integer identity of a participant; 0 is the master, workers start at 1.
pub type Rank = usize;

// Common error types
#[derive(Debug)]
pub enum ScaleBenchError {
    /// I/O operation failed
    IoError(std::io::Error),
    /// Configuration validation or parsing error
    ConfigError(String),
    /// Result row could not be persisted
    PersistenceError(String),
    /// Transport closed or protocol violated
    ChannelError(String),
    /// A work kernel rejected or failed on its partition
    KernelFault { rank: Rank, message: String },
    /// Not every dispatched rank reported before the round deadline
    RoundTimedOut {
        round: u64,
        timeout: Duration,
        missing: Vec<Rank>,
    },
    /// Worker management error
    WorkerError(String),
}

impl fmt::Display for ScaleBenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleBenchError::IoError(err) => write!(f, "I/O error: {}", err),
            ScaleBenchError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ScaleBenchError::PersistenceError(msg) => {
                write!(f, "Results persistence error: {}", msg)
            }
            ScaleBenchError::ChannelError(msg) => write!(f, "Channel error: {}", msg),
            ScaleBenchError::KernelFault { rank, message } => {
                write!(f, "Kernel fault on worker {}: {}", rank, message)
            }
            ScaleBenchError::RoundTimedOut {
                round,
                timeout,
                missing,
            } => write!(
                f,
                "Round {} timed out after {}; no result from ranks {:?}",
                round,
                humantime::format_duration(*timeout),
                missing
            ),
            ScaleBenchError::WorkerError(msg) => write!(f, "Worker error: {}", msg),
        }
    }
}

impl std::error::Error for ScaleBenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleBenchError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ScaleBenchError {
    fn from(err: std::io::Error) -> Self {
        ScaleBenchError::IoError(err)
    }
}

impl From<serde_json::Error> for ScaleBenchError {
    fn from(err: serde_json::Error) -> Self {
        ScaleBenchError::PersistenceError(format!("JSON serialization error: {}", err))
    }
}

impl From<toml::de::Error> for ScaleBenchError {
    fn from(err: toml::de::Error) -> Self {
        ScaleBenchError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for ScaleBenchError {
    fn from(err: toml::ser::Error) -> Self {
        ScaleBenchError::ConfigError(format!("TOML serialization error: {}", err))
    }
}

/// Result type alias for scalebench operations
pub type Result<T> = std::result::Result<T, ScaleBenchError>;

/// Error classification helpers
///
/// Nothing in the harness is retried: an error either aborts the run or is
/// logged and the affected row dropped.
pub mod error {
    use super::ScaleBenchError;

    /// Whether the error must abort the whole run.
    ///
    /// Persistence failures are the only recoverable class; the orchestrator
    /// drops the row and moves on to the next test case.
    pub fn is_fatal(error: &ScaleBenchError) -> bool {
        !matches!(error, ScaleBenchError::PersistenceError(_))
    }

    /// Convert error to user-friendly message with suggestions
    pub fn user_friendly_message(error: &ScaleBenchError) -> String {
        match error {
            ScaleBenchError::ConfigError(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            ScaleBenchError::PersistenceError(_) => {
                "Failed to save results. Check disk space and permissions of the output directory."
                    .to_string()
            }
            ScaleBenchError::RoundTimedOut { missing, .. } => format!(
                "Workers {:?} did not report in time. Raise --round-timeout or reduce the workload.",
                missing
            ),
            ScaleBenchError::KernelFault { rank, .. } => format!(
                "Worker {} crashed while computing its partition; the run cannot continue.",
                rank
            ),
            _ => error.to_string(),
        }
    }
}

// Common types and constants
pub const APP_NAME: &str = "scalebench";
pub const CONFIG_FILE: &str = "scalebench.toml";
pub const MASTER_RANK: Rank = 0;
/// Reference value the Monte-Carlo estimate is compared against.
pub const REFERENCE_PI: f64 = std::f64::consts::PI;
