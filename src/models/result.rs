//! Round result data models
//!
//! Contains the row persisted for every completed round, the aggregation
//! of partial worker results, and the per-suite run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{TestCase, Workload};
use crate::REFERENCE_PI;

/// Workload-specific metrics of one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RowMetrics {
    /// Monte-Carlo estimate and its deviation from the reference value
    MonteCarlo {
        /// `4 * hits / total_work`
        estimate: f64,
        /// Signed `estimate - pi`
        difference: f64,
        /// Absolute `|estimate - pi|`
        error: f64,
    },
    /// Number of primes found over the whole range
    PrimeCount { total_primes: u64 },
}

/// One persisted row per completed round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub metrics: RowMetrics,
    pub total_work: u64,
    pub worker_count: usize,
    /// Dispatch-to-last-result wall clock time
    pub elapsed_millis: f64,
}

impl ResultRow {
    /// Build a row from aggregated metrics and the case that produced them
    pub fn new(metrics: RowMetrics, case: &TestCase, elapsed_millis: f64) -> Self {
        Self {
            metrics,
            total_work: case.total_work,
            worker_count: case.worker_count,
            elapsed_millis,
        }
    }

    /// Column names of the CSV file for `workload`
    pub fn csv_header(workload: Workload) -> &'static [&'static str] {
        match workload {
            Workload::MonteCarlo => &[
                "PI",
                "Difference",
                "Error",
                "Ntot",
                "AvailableProcessors",
                "TimeDuration(ms)",
            ],
            Workload::PrimeCount => &[
                "TotalPrimes",
                "Ntot",
                "AvailableProcessors",
                "TimeDuration(ms)",
            ],
        }
    }

    /// Field values in header order
    pub fn csv_fields(&self) -> Vec<String> {
        let mut fields = match &self.metrics {
            RowMetrics::MonteCarlo {
                estimate,
                difference,
                error,
            } => vec![estimate.to_string(), difference.to_string(), error.to_string()],
            RowMetrics::PrimeCount { total_primes } => vec![total_primes.to_string()],
        };
        fields.push(self.total_work.to_string());
        fields.push(self.worker_count.to_string());
        fields.push(self.elapsed_millis.to_string());
        fields
    }

    /// Workload the row belongs to
    pub fn workload(&self) -> Workload {
        match self.metrics {
            RowMetrics::MonteCarlo { .. } => Workload::MonteCarlo,
            RowMetrics::PrimeCount { .. } => Workload::PrimeCount,
        }
    }

    /// Get a human-readable summary of the row
    pub fn summary(&self) -> String {
        match &self.metrics {
            RowMetrics::MonteCarlo { estimate, error, .. } => format!(
                "pi ~ {:.6} (error {:.6}) - {} samples on {} workers in {:.2} ms",
                estimate, error, self.total_work, self.worker_count, self.elapsed_millis
            ),
            RowMetrics::PrimeCount { total_primes } => format!(
                "{} primes below {} on {} workers in {:.2} ms",
                total_primes, self.total_work, self.worker_count, self.elapsed_millis
            ),
        }
    }
}

/// Combine the partial results of one round
///
/// The sum does not depend on the order the reports arrived in.
pub fn aggregate(workload: Workload, total_work: u64, values: &[u64]) -> RowMetrics {
    let total: u64 = values.iter().sum();
    match workload {
        Workload::MonteCarlo => {
            let estimate = if total_work == 0 {
                0.0
            } else {
                4.0 * total as f64 / total_work as f64
            };
            let difference = estimate - REFERENCE_PI;
            RowMetrics::MonteCarlo {
                estimate,
                difference,
                error: difference.abs(),
            }
        }
        Workload::PrimeCount => RowMetrics::PrimeCount {
            total_primes: total,
        },
    }
}

/// Summary of one suite execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub suite: String,
    pub workload: Workload,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Rounds for which every worker reported
    pub rounds_completed: usize,
    /// Rows the sink accepted
    pub rows_recorded: usize,
    /// Rows lost to persistence failures
    pub rows_dropped: usize,
    pub output: PathBuf,
}

impl RunReport {
    /// Start a report for a suite
    pub fn begin(suite: impl Into<String>, workload: Workload, output: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            suite: suite.into(),
            workload,
            started_at: now,
            finished_at: now,
            rounds_completed: 0,
            rows_recorded: 0,
            rows_dropped: 0,
            output,
        }
    }

    /// Stamp the finish time
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Get a human-readable summary of the report
    pub fn summary(&self) -> String {
        format!(
            "{} ({}) - {} rounds, {} rows written, {} dropped - {}",
            self.suite,
            self.workload.description(),
            self.rounds_completed,
            self.rows_recorded,
            self.rows_dropped,
            self.output.display()
        )
    }
}
