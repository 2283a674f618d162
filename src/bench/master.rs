//! Master orchestration
//!
//! Drives one suite: for every test case plan the partitions, dispatch one
//! work order per rank, wait for all reports, aggregate and record a row.
//! Rounds are strictly sequential and the elapsed time covers only the
//! dispatch-to-last-result span.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bench::channel::{Envelope, MasterEndpoint, Message};
use crate::bench::planner::{self, PartitionPlan};
use crate::config::persistence::ResultSink;
use crate::config::{TestCase, Workload};
use crate::models::{aggregate, ResultRow, RowMetrics, RunReport};
use crate::{Rank, Result, ScaleBenchError};

/// Phase of the master state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterState {
    Idle,
    PlanRound,
    Dispatch,
    AwaitResults,
    Aggregate,
    Record,
    Done,
}

/// Progress update sent after every round
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// 1-based position of the case in the suite
    pub case_index: usize,
    pub total_cases: usize,
    pub case: TestCase,
    pub elapsed_millis: f64,
    /// Whether the row reached the sink
    pub recorded: bool,
}

impl ProgressUpdate {
    /// Calculate completion percentage (0.0 to 1.0)
    pub fn completion_percentage(&self) -> f64 {
        if self.total_cases == 0 {
            0.0
        } else {
            self.case_index as f64 / self.total_cases as f64
        }
    }
}

/// Result of one completed round, before recording
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub round: u64,
    pub metrics: RowMetrics,
    /// Reported values in rank order
    pub reports: Vec<(Rank, u64)>,
    pub elapsed: Duration,
}

/// Drives the master side of a run
pub struct Master<S: ResultSink> {
    endpoint: MasterEndpoint,
    workload: Workload,
    sink: S,
    round_timeout: Option<Duration>,
    progress_tx: Option<mpsc::UnboundedSender<ProgressUpdate>>,
    state: MasterState,
    next_round: u64,
}

impl<S: ResultSink> Master<S> {
    /// Create a master over `endpoint` recording into `sink`
    pub fn new(endpoint: MasterEndpoint, workload: Workload, sink: S) -> Self {
        Self {
            endpoint,
            workload,
            sink,
            round_timeout: None,
            progress_tx: None,
            state: MasterState::Idle,
            next_round: 1,
        }
    }

    /// Bound every result wait; `None` waits forever
    pub fn with_round_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.round_timeout = timeout;
        self
    }

    /// Stream a progress update after every round
    pub fn with_progress(mut self, progress_tx: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    pub fn state(&self) -> MasterState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Give back the endpoint and the sink
    pub fn into_parts(self) -> (MasterEndpoint, S) {
        (self.endpoint, self.sink)
    }

    /// Run every case in order and record one row per completed round
    ///
    /// Every case is checked first, so a malformed or oversized case aborts
    /// before anything is dispatched. A failed write drops that row and the
    /// run continues; any other error aborts the run.
    pub async fn run(&mut self, suite: &str, cases: &[TestCase], output: std::path::PathBuf) -> Result<RunReport> {
        let available = self.endpoint.worker_count();
        for (index, case) in cases.iter().enumerate() {
            check_case(index, case, available)?;
        }

        let mut report = RunReport::begin(suite, self.workload, output);
        info!(suite, cases = cases.len(), workers = available, "starting suite");

        for (index, case) in cases.iter().enumerate() {
            let outcome = self.run_round(case).await?;
            report.rounds_completed += 1;

            let row = ResultRow::new(outcome.metrics, case, outcome.elapsed.as_secs_f64() * 1000.0);
            let recorded = self.record(&row);
            if recorded {
                report.rows_recorded += 1;
            } else {
                report.rows_dropped += 1;
            }

            if let Some(tx) = &self.progress_tx {
                let _ = tx.send(ProgressUpdate {
                    case_index: index + 1,
                    total_cases: cases.len(),
                    case: *case,
                    elapsed_millis: row.elapsed_millis,
                    recorded,
                });
            }
            self.state = MasterState::Idle;
        }

        self.state = MasterState::Done;
        Ok(report.finish())
    }

    /// Plan, dispatch, collect and aggregate one test case
    pub async fn run_round(&mut self, case: &TestCase) -> Result<RoundOutcome> {
        self.state = MasterState::PlanRound;
        let plan = planner::plan(self.workload, case)?;

        let round = self.next_round;
        self.next_round += 1;

        self.state = MasterState::Dispatch;
        let started = Instant::now();
        let expected = self.dispatch(round, &plan)?;

        self.state = MasterState::AwaitResults;
        let reports = self.await_results(round, expected).await?;
        let elapsed = started.elapsed();

        self.state = MasterState::Aggregate;
        let values: Vec<u64> = reports.iter().map(|&(_, value)| value).collect();
        let metrics = aggregate(self.workload, case.total_work, &values);

        Ok(RoundOutcome {
            round,
            metrics,
            reports,
            elapsed,
        })
    }

    fn dispatch(&self, round: u64, plan: &PartitionPlan) -> Result<BTreeSet<Rank>> {
        let mut expected = BTreeSet::new();
        for descriptor in &plan.descriptors {
            debug!(round, rank = descriptor.rank, partition = %descriptor.partition, "dispatching");
            self.endpoint.send(
                descriptor.rank,
                Message::WorkOrder {
                    round,
                    partition: descriptor.partition,
                },
            )?;
            expected.insert(descriptor.rank);
        }
        Ok(expected)
    }

    async fn await_results(
        &mut self,
        round: u64,
        mut pending: BTreeSet<Rank>,
    ) -> Result<Vec<(Rank, u64)>> {
        let deadline = self.round_timeout.map(|t| (tokio::time::Instant::now() + t, t));
        let mut reports = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let envelope = match deadline {
                Some((at, timeout)) => {
                    match tokio::time::timeout_at(at, self.endpoint.recv()).await {
                        Ok(envelope) => envelope,
                        Err(_) => {
                            return Err(ScaleBenchError::RoundTimedOut {
                                round,
                                timeout,
                                missing: pending.into_iter().collect(),
                            })
                        }
                    }
                }
                None => self.endpoint.recv().await,
            };

            let Some(Envelope { source, message }) = envelope else {
                return Err(ScaleBenchError::ChannelError(format!(
                    "All workers are gone; ranks {:?} never reported for round {}",
                    pending, round
                )));
            };

            match message {
                Message::ResultReport { round: r, value } if r == round => {
                    if !pending.remove(&source) {
                        return Err(ScaleBenchError::ChannelError(format!(
                            "Unexpected report from rank {} in round {}",
                            source, round
                        )));
                    }
                    reports.push((source, value));
                }
                Message::ResultReport { round: r, .. } => {
                    warn!(rank = source, stale_round = r, round, "discarding stale report");
                }
                other => {
                    return Err(ScaleBenchError::ChannelError(format!(
                        "Rank {} sent {:?} to the master",
                        source,
                        other.tag()
                    )));
                }
            }
        }

        reports.sort_by_key(|&(rank, _)| rank);
        Ok(reports)
    }

    fn record(&mut self, row: &ResultRow) -> bool {
        self.state = MasterState::Record;
        match self.sink.record(row) {
            Ok(()) => {
                info!(
                    workers = row.worker_count,
                    total_work = row.total_work,
                    elapsed_ms = row.elapsed_millis,
                    "{}",
                    row.summary()
                );
                true
            }
            Err(e) => {
                error!(error = %e, "failed to record round; row dropped");
                false
            }
        }
    }
}

fn check_case(index: usize, case: &TestCase, available: usize) -> Result<()> {
    if case.total_work == 0 {
        return Err(ScaleBenchError::ConfigError(format!(
            "Test case {} has no work",
            index
        )));
    }
    if case.worker_count == 0 {
        return Err(ScaleBenchError::ConfigError(format!(
            "Test case {} asks for 0 workers",
            index
        )));
    }
    if case.worker_count > available {
        return Err(ScaleBenchError::ConfigError(format!(
            "Test case {} needs {} workers but only {} are running",
            index, case.worker_count, available
        )));
    }
    Ok(())
}
