//! Benchmark engine module
//!
//! Contains the partition planner, the rank-addressed channel, the work
//! kernels, the worker loop and pool, and the master orchestrator, plus the
//! glue that runs a configured suite end to end.

pub mod channel;
pub mod kernel;
pub mod master;
pub mod planner;
pub mod worker;

// Re-export commonly used types
pub use channel::{world, Envelope, MasterEndpoint, Message, Tag, WorkerEndpoint};
pub use kernel::{is_prime, kernel_for, MonteCarloPi, PrimeCount, WorkKernel};
pub use master::{Master, MasterState, ProgressUpdate, RoundOutcome};
pub use planner::{
    classify, plan, share_fraction, total_share, Partition, PartitionDescriptor, PartitionPlan,
    WorkerClass,
};
pub use worker::{WorkerExit, WorkerLoop, WorkerPool, WorkerState, WorkerStatus};

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::persistence::CsvResultSink;
use crate::config::{RunConfig, SuiteConfig};
use crate::models::RunReport;
use crate::Result;

/// Run one suite on a fresh pool of `workers` ranks
///
/// The pool is always shut down: on success every rank receives a terminate
/// message, on error the pool is cancelled.
pub async fn run_suite(
    suite: &SuiteConfig,
    workers: usize,
    round_timeout: Option<Duration>,
    progress_tx: Option<mpsc::UnboundedSender<ProgressUpdate>>,
) -> Result<RunReport> {
    suite.validate(workers)?;

    let workload = suite.workload;
    let (pool, endpoint) = WorkerPool::spawn(workers, |rank| kernel_for(workload, rank));
    let sink = CsvResultSink::new(&suite.output, workload);

    let mut master = Master::new(endpoint, workload, sink).with_round_timeout(round_timeout);
    if let Some(tx) = progress_tx {
        master = master.with_progress(tx);
    }

    let outcome = master
        .run(&suite.name, &suite.cases, suite.output.clone())
        .await;

    let (endpoint, _sink) = master.into_parts();
    match &outcome {
        Ok(_) => {
            let statuses = pool.shutdown(&endpoint).await;
            let failed = statuses
                .iter()
                .filter(|(_, s)| matches!(s, WorkerStatus::Failed(_)))
                .count();
            if failed > 0 {
                warn!(suite = %suite.name, failed, "some workers exited with an error");
            }
        }
        Err(e) => {
            warn!(suite = %suite.name, error = %e, "suite aborted, cancelling workers");
            pool.cancel_all();
        }
    }

    outcome
}

/// Run every configured suite in order
pub async fn run_all(config: &RunConfig) -> Result<Vec<RunReport>> {
    config.validate()?;

    let mut reports = Vec::with_capacity(config.suites.len());
    for suite in &config.suites {
        let report = run_suite(suite, config.workers, config.round_timeout(), None).await?;
        info!("{}", report.summary());
        reports.push(report);
    }
    Ok(reports)
}
