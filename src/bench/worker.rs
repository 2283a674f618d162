//! Worker loop and worker pool management
//!
//! Each worker rank runs [`WorkerLoop`] as its own tokio task: wait for a
//! work order, run the kernel on the blocking pool, report the result,
//! repeat. The [`WorkerPool`] spawns the ranks, tracks their status and
//! joins them once the master has sent every rank a terminate message.

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::bench::channel::{world, Envelope, MasterEndpoint, Message, WorkerEndpoint};
use crate::bench::kernel::WorkKernel;
use crate::bench::planner::Partition;
use crate::{Rank, Result, ScaleBenchError};

/// Phase of a worker loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    AwaitOrder,
    Compute,
    Report,
}

/// Why a worker loop ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Master sent a terminate message
    Terminated,
    /// Pool cancellation token fired
    Cancelled,
    /// Master endpoint dropped
    Disconnected,
}

/// The receive/compute/report cycle of one worker rank
pub struct WorkerLoop {
    endpoint: WorkerEndpoint,
    kernel: Option<Box<dyn WorkKernel>>,
    token: CancellationToken,
    rounds_completed: u64,
}

impl WorkerLoop {
    pub fn new(
        endpoint: WorkerEndpoint,
        kernel: Box<dyn WorkKernel>,
        token: CancellationToken,
    ) -> Self {
        Self {
            endpoint,
            kernel: Some(kernel),
            token,
            rounds_completed: 0,
        }
    }

    pub fn rank(&self) -> Rank {
        self.endpoint.rank()
    }

    fn enter(&self, state: WorkerState) {
        trace!(rank = self.rank(), ?state, "worker state");
    }

    /// Run until terminated, cancelled or disconnected
    ///
    /// The token is honoured while computing too; a cancelled kernel is
    /// abandoned on the blocking pool. A kernel fault is returned as an
    /// error and ends the worker; the master is not told.
    pub async fn run(mut self) -> Result<WorkerExit> {
        let rank = self.rank();
        debug!(rank, "worker waiting for orders");

        loop {
            self.enter(WorkerState::AwaitOrder);
            let envelope = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!(rank, "worker cancelled");
                    return Ok(WorkerExit::Cancelled);
                }
                envelope = self.endpoint.recv() => envelope,
            };

            let Some(Envelope { message, .. }) = envelope else {
                debug!(rank, "master endpoint closed");
                return Ok(WorkerExit::Disconnected);
            };

            let (round, partition) = match message {
                Message::WorkOrder { round, partition } => (round, partition),
                Message::Terminate => {
                    debug!(rank, rounds = self.rounds_completed, "worker terminated");
                    return Ok(WorkerExit::Terminated);
                }
                Message::ResultReport { .. } => {
                    warn!(rank, "ignoring result report sent to a worker");
                    continue;
                }
            };

            self.enter(WorkerState::Compute);
            let Some(value) = self.compute(partition).await? else {
                debug!(rank, round, "worker cancelled while computing");
                return Ok(WorkerExit::Cancelled);
            };

            self.enter(WorkerState::Report);
            self.endpoint
                .send(Message::ResultReport { round, value })?;
            self.rounds_completed += 1;
        }
    }

    /// Run the kernel on the blocking pool; `None` if the token fired first
    async fn compute(&mut self, partition: Partition) -> Result<Option<u64>> {
        let rank = self.rank();
        let mut kernel = self.kernel.take().ok_or_else(|| {
            ScaleBenchError::WorkerError(format!("Worker {} lost its kernel", rank))
        })?;

        let handle = tokio::task::spawn_blocking(move || {
            let value = kernel.compute(&partition);
            (kernel, value)
        });

        let joined = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Ok(None),
            joined = handle => joined,
        };

        match joined {
            Ok((kernel, Ok(value))) => {
                self.kernel = Some(kernel);
                Ok(Some(value))
            }
            Ok((_, Err(e))) => {
                error!(rank, error = %e, "kernel fault, worker exiting");
                Err(e)
            }
            Err(join_error) => {
                error!(rank, error = %join_error, "kernel panicked, worker exiting");
                Err(ScaleBenchError::KernelFault {
                    rank,
                    message: format!("kernel panicked: {}", join_error),
                })
            }
        }
    }
}

/// Worker status for tracking individual worker states
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerStatus {
    /// Worker is not spawned yet
    Idle,
    /// Worker task is alive
    Running,
    /// Worker left its loop after a terminate message or disconnect
    Terminated,
    /// Worker failed with an error
    Failed(String),
    /// Worker was cancelled
    Cancelled,
}

/// Individual worker information
#[derive(Debug)]
pub struct WorkerInfo {
    pub rank: Rank,
    pub status: WorkerStatus,
    pub handle: Option<JoinHandle<Result<WorkerExit>>>,
}

impl WorkerInfo {
    pub fn new(rank: Rank) -> Self {
        Self {
            rank,
            status: WorkerStatus::Idle,
            handle: None,
        }
    }

    /// Check if the worker is active (running)
    pub fn is_active(&self) -> bool {
        matches!(self.status, WorkerStatus::Running)
    }

    /// Check if the worker has finished, successfully or not
    pub fn is_completed(&self) -> bool {
        matches!(
            self.status,
            WorkerStatus::Terminated | WorkerStatus::Failed(_) | WorkerStatus::Cancelled
        )
    }
}

/// Spawns and supervises the worker ranks of one run
pub struct WorkerPool {
    workers: Mutex<Vec<WorkerInfo>>,
    token: CancellationToken,
}

impl WorkerPool {
    /// Spawn `workers` ranks, building each rank's kernel with `kernels`
    ///
    /// Returns the pool and the master side of the channel.
    pub fn spawn<F>(workers: usize, kernels: F) -> (Self, MasterEndpoint)
    where
        F: Fn(Rank) -> Box<dyn WorkKernel>,
    {
        let token = CancellationToken::new();
        let (master, endpoints) = world(workers);
        let mut infos = Vec::with_capacity(workers);

        for endpoint in endpoints {
            let rank = endpoint.rank();
            let worker = WorkerLoop::new(endpoint, kernels(rank), token.child_token());
            let mut info = WorkerInfo::new(rank);
            info.handle = Some(tokio::spawn(worker.run()));
            info.status = WorkerStatus::Running;
            infos.push(info);
        }

        info!(workers, "worker pool started");

        (
            Self {
                workers: Mutex::new(infos),
                token,
            },
            master,
        )
    }

    /// Cancel all running workers
    pub fn cancel_all(&self) {
        self.token.cancel();
    }

    /// Send terminate to every rank, then wait for all of them
    ///
    /// Ranks that already died are skipped; their failure shows up in the
    /// joined statuses.
    pub async fn shutdown(&self, master: &MasterEndpoint) -> Vec<(Rank, WorkerStatus)> {
        for rank in 1..=master.worker_count() {
            if let Err(e) = master.send(rank, Message::Terminate) {
                debug!(rank, error = %e, "terminate not delivered");
            }
        }
        self.join_all().await
    }

    /// Wait for every worker task and record how it ended
    pub async fn join_all(&self) -> Vec<(Rank, WorkerStatus)> {
        let mut workers = self.workers.lock().await;

        for worker in workers.iter_mut() {
            if let Some(handle) = worker.handle.take() {
                worker.status = exit_status(handle.await);
            }
        }

        workers.iter().map(|w| (w.rank, w.status.clone())).collect()
    }

    /// Get current worker statuses
    ///
    /// Tasks that have already finished are joined on the spot, so their
    /// real outcome is reported.
    pub async fn get_worker_statuses(&self) -> Vec<(Rank, WorkerStatus)> {
        let mut workers = self.workers.lock().await;

        for worker in workers.iter_mut() {
            if worker.handle.as_ref().is_some_and(|h| h.is_finished()) {
                if let Some(handle) = worker.handle.take() {
                    worker.status = exit_status(handle.await);
                }
            }
        }

        workers.iter().map(|w| (w.rank, w.status.clone())).collect()
    }

    /// Get the number of active workers
    pub async fn active_worker_count(&self) -> usize {
        let workers = self.workers.lock().await;
        workers
            .iter()
            .filter(|w| w.is_active() && !w.handle.as_ref().is_some_and(|h| h.is_finished()))
            .count()
    }

    /// Check if all workers are completed
    pub async fn all_workers_completed(&self) -> bool {
        let workers = self.workers.lock().await;
        workers.iter().all(|w| w.is_completed())
    }
}

fn exit_status(
    joined: std::result::Result<Result<WorkerExit>, tokio::task::JoinError>,
) -> WorkerStatus {
    match joined {
        Ok(Ok(WorkerExit::Cancelled)) => WorkerStatus::Cancelled,
        Ok(Ok(_)) => WorkerStatus::Terminated,
        Ok(Err(e)) => WorkerStatus::Failed(e.to_string()),
        Err(e) => WorkerStatus::Failed(format!("Join error: {}", e)),
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
