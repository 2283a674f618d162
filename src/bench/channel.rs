//! Rank-addressed message transport
//!
//! One master and N workers. The master owns one outbox per worker and a
//! single inbox all workers report into; every message travels inside an
//! [`Envelope`] stamped with its source rank. Sends never block, receives
//! wait until a message arrives or every peer has gone away.

use tokio::sync::mpsc;

use crate::bench::planner::Partition;
use crate::{Rank, Result, ScaleBenchError, MASTER_RANK};

/// Message kind with its numeric wire tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    WorkOrder = 0,
    ResultReport = 1,
    Terminate = 2,
}

/// Protocol messages
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Master to worker: compute this partition for `round`
    WorkOrder { round: u64, partition: Partition },
    /// Worker to master: scalar result of `round`
    ResultReport { round: u64, value: u64 },
    /// Master to worker: leave the work loop
    Terminate,
}

impl Message {
    pub fn tag(&self) -> Tag {
        match self {
            Message::WorkOrder { .. } => Tag::WorkOrder,
            Message::ResultReport { .. } => Tag::ResultReport,
            Message::Terminate => Tag::Terminate,
        }
    }
}

/// A message together with the rank that sent it
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub source: Rank,
    pub message: Message,
}

/// Master side of the world
#[derive(Debug)]
pub struct MasterEndpoint {
    outboxes: Vec<mpsc::UnboundedSender<Envelope>>,
    inbox: mpsc::UnboundedReceiver<Envelope>,
}

impl MasterEndpoint {
    /// Number of worker ranks addressable from the master
    pub fn worker_count(&self) -> usize {
        self.outboxes.len()
    }

    /// Master plus workers
    pub fn world_size(&self) -> usize {
        self.outboxes.len() + 1
    }

    /// Queue `message` for worker `dest`
    ///
    /// Addressing a rank outside `1..=worker_count` is a configuration error.
    pub fn send(&self, dest: Rank, message: Message) -> Result<()> {
        if dest == MASTER_RANK || dest > self.outboxes.len() {
            return Err(ScaleBenchError::ConfigError(format!(
                "Rank {} is not a worker (world has workers 1..={})",
                dest,
                self.outboxes.len()
            )));
        }

        let tag = message.tag();
        self.outboxes[dest - 1]
            .send(Envelope {
                source: MASTER_RANK,
                message,
            })
            .map_err(|_| {
                ScaleBenchError::ChannelError(format!(
                    "Worker {} is gone; {:?} could not be delivered",
                    dest, tag
                ))
            })
    }

    /// Wait for the next report from any worker
    ///
    /// Returns `None` once every worker endpoint has been dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.inbox.recv().await
    }
}

/// Worker side of the world
#[derive(Debug)]
pub struct WorkerEndpoint {
    rank: Rank,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    to_master: mpsc::UnboundedSender<Envelope>,
}

impl WorkerEndpoint {
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Send `message` to the master
    pub fn send(&self, message: Message) -> Result<()> {
        self.to_master
            .send(Envelope {
                source: self.rank,
                message,
            })
            .map_err(|_| {
                ScaleBenchError::ChannelError(format!(
                    "Master is gone; worker {} cannot report",
                    self.rank
                ))
            })
    }

    /// Wait for the next message from the master
    ///
    /// Returns `None` once the master endpoint has been dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.inbox.recv().await
    }
}

/// Wire up a master and `workers` worker endpoints (ranks `1..=workers`)
pub fn world(workers: usize) -> (MasterEndpoint, Vec<WorkerEndpoint>) {
    let (to_master, inbox) = mpsc::unbounded_channel();
    let mut outboxes = Vec::with_capacity(workers);
    let mut endpoints = Vec::with_capacity(workers);

    for rank in 1..=workers {
        let (tx, rx) = mpsc::unbounded_channel();
        outboxes.push(tx);
        endpoints.push(WorkerEndpoint {
            rank,
            inbox: rx,
            to_master: to_master.clone(),
        });
    }

    // Only workers hold report senders; the master inbox closes when they are all gone.
    drop(to_master);

    (MasterEndpoint { outboxes, inbox }, endpoints)
}
