//! Static load partitioning
//!
//! Maps a test case onto per-rank partitions. Pools of 8 and 16 workers mix
//! fast and slow nodes and get weighted shares from a fixed rank table;
//! every other pool size is split uniformly. The plan depends only on the
//! worker count, never on measurements.

use serde::{Deserialize, Serialize};

use crate::config::{TestCase, Workload};
use crate::{Rank, Result, ScaleBenchError};

/// Relative throughput label of a worker rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerClass {
    Fast,
    Slow,
}

/// Work assigned to one rank for one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Partition {
    /// Number of Monte-Carlo samples to draw
    Samples(u64),
    /// Half-open integer range `[start, end)`
    Range { start: u64, end: u64 },
}

impl Partition {
    /// Amount of work in the partition
    pub fn size(&self) -> u64 {
        match *self {
            Partition::Samples(n) => n,
            Partition::Range { start, end } => end.saturating_sub(start),
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Partition::Samples(n) => write!(f, "{} samples", n),
            Partition::Range { start, end } => write!(f, "[{}, {})", start, end),
        }
    }
}

/// A partition addressed to a rank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionDescriptor {
    pub rank: Rank,
    pub class: WorkerClass,
    pub partition: Partition,
}

/// Contiguous ranks sharing a class and a per-rank share.
///
/// Shares and range offsets are in thousandths of the total work so the
/// table sums can be checked exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankGroup {
    pub first: Rank,
    pub last: Rank,
    pub class: WorkerClass,
    pub share_permille: u32,
    /// Start of the group's first range, as a fraction of the total
    pub base_permille: u32,
}

impl RankGroup {
    const fn new(
        first: Rank,
        last: Rank,
        class: WorkerClass,
        share_permille: u32,
        base_permille: u32,
    ) -> Self {
        Self {
            first,
            last,
            class,
            share_permille,
            base_permille,
        }
    }

    fn contains(&self, rank: Rank) -> bool {
        (self.first..=self.last).contains(&rank)
    }

    fn share(&self) -> f64 {
        self.share_permille as f64 / 1000.0
    }

    fn base(&self) -> f64 {
        self.base_permille as f64 / 1000.0
    }
}

/// Four fast nodes followed by four slow nodes.
pub const EIGHT_WORKER_TABLE: [RankGroup; 2] = [
    RankGroup::new(1, 4, WorkerClass::Fast, 200, 0),
    RankGroup::new(5, 8, WorkerClass::Slow, 50, 800),
];

/// Fast nodes at ranks 1-4 and 7-11, slow nodes at 5-6 and 12-16.
///
/// The shares add up to 9 x 0.100 + 7 x 0.025 = 1.075 of the workload, and
/// the 5-6 ranges overlap the 7-11 ranges. Kept as measured on the
/// reference cluster.
pub const SIXTEEN_WORKER_TABLE: [RankGroup; 4] = [
    RankGroup::new(1, 4, WorkerClass::Fast, 100, 0),
    RankGroup::new(5, 6, WorkerClass::Slow, 25, 400),
    RankGroup::new(7, 11, WorkerClass::Fast, 100, 400),
    RankGroup::new(12, 16, WorkerClass::Slow, 25, 800),
];

/// Rank table for heterogeneous pool sizes, `None` for uniform splits
pub fn rank_table(worker_count: usize) -> Option<&'static [RankGroup]> {
    match worker_count {
        8 => Some(&EIGHT_WORKER_TABLE),
        16 => Some(&SIXTEEN_WORKER_TABLE),
        _ => None,
    }
}

fn group_of(rank: Rank, worker_count: usize) -> Option<&'static RankGroup> {
    rank_table(worker_count)?.iter().find(|g| g.contains(rank))
}

/// Class of `rank` in a pool of `worker_count`
///
/// Uniformly split pools are homogeneous and report every rank as fast.
pub fn classify(rank: Rank, worker_count: usize) -> WorkerClass {
    group_of(rank, worker_count)
        .map(|g| g.class)
        .unwrap_or(WorkerClass::Fast)
}

/// Fraction of the total work `rank` receives
pub fn share_fraction(rank: Rank, worker_count: usize) -> f64 {
    match rank_table(worker_count) {
        Some(_) => group_of(rank, worker_count).map(RankGroup::share).unwrap_or(0.0),
        None if worker_count > 0 => 1.0 / worker_count as f64,
        None => 0.0,
    }
}

/// Sum of the table shares in thousandths, `None` for uniform splits
pub fn total_share_permille(worker_count: usize) -> Option<u32> {
    rank_table(worker_count).map(|table| {
        table
            .iter()
            .map(|g| g.share_permille * (g.last - g.first + 1) as u32)
            .sum()
    })
}

/// Sum of all per-rank shares; 1.0 for uniform splits
pub fn total_share(worker_count: usize) -> f64 {
    match total_share_permille(worker_count) {
        Some(permille) => permille as f64 / 1000.0,
        None => 1.0,
    }
}

/// Ordered per-rank partitions for one round
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionPlan {
    pub workload: Workload,
    pub case: TestCase,
    pub descriptors: Vec<PartitionDescriptor>,
}

impl PartitionPlan {
    /// Total work handed out, counting overlaps twice
    pub fn total_assigned(&self) -> u64 {
        self.descriptors.iter().map(|d| d.partition.size()).sum()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Build the partition plan for `case`
pub fn plan(workload: Workload, case: &TestCase) -> Result<PartitionPlan> {
    if case.worker_count == 0 {
        return Err(ScaleBenchError::ConfigError(
            "Cannot partition work across 0 workers".to_string(),
        ));
    }

    let descriptors = match rank_table(case.worker_count) {
        Some(table) => weighted(workload, case, table),
        None => uniform(workload, case),
    };

    Ok(PartitionPlan {
        workload,
        case: *case,
        descriptors,
    })
}

fn weighted(workload: Workload, case: &TestCase, table: &[RankGroup]) -> Vec<PartitionDescriptor> {
    let total = case.total_work as f64;
    let mut descriptors = Vec::with_capacity(case.worker_count);

    for group in table {
        for rank in group.first..=group.last {
            let amount = total * group.share();
            let partition = if workload.uses_ranges() {
                let slot = (rank - group.first) as f64;
                let start = (slot * amount + total * group.base()) as u64;
                let end = (start as f64 + amount) as u64;
                Partition::Range { start, end }
            } else {
                Partition::Samples(amount as u64)
            };
            descriptors.push(PartitionDescriptor {
                rank,
                class: group.class,
                partition,
            });
        }
    }

    descriptors.sort_by_key(|d| d.rank);
    descriptors
}

fn uniform(workload: Workload, case: &TestCase) -> Vec<PartitionDescriptor> {
    let workers = case.worker_count as u64;
    let per_worker = case.total_work / workers;

    (1..=case.worker_count)
        .map(|rank| {
            let start = (rank as u64 - 1) * per_worker;
            // The last rank absorbs the remainder so the plan covers the total.
            let end = if rank == case.worker_count {
                case.total_work
            } else {
                start + per_worker
            };
            let partition = if workload.uses_ranges() {
                Partition::Range { start, end }
            } else {
                Partition::Samples(end - start)
            };
            PartitionDescriptor {
                rank,
                class: WorkerClass::Fast,
                partition,
            }
        })
        .collect()
}
