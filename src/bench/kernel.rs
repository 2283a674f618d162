//! Work kernels
//!
//! Leaf computations executed by workers: Monte-Carlo hit counting and
//! trial-division prime counting. Both map a partition to one integer.

use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::bench::planner::Partition;
use crate::config::Workload;
use crate::{Rank, Result, ScaleBenchError};

/// A computation a worker runs on every partition it receives
pub trait WorkKernel: Send {
    fn name(&self) -> &'static str;

    /// Compute the scalar result of one partition
    ///
    /// A partition the kernel cannot handle is a fault for the worker.
    fn compute(&mut self, partition: &Partition) -> Result<u64>;
}

/// Counts uniform samples of the unit square that land in the unit circle
pub struct MonteCarloPi {
    rank: Rank,
    rng: SmallRng,
}

impl MonteCarloPi {
    /// Seed from the rank and the wall clock; runs are not reproducible
    pub fn for_rank(rank: Rank) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::with_seed(rank, (rank as u64).wrapping_add(millis))
    }

    /// Fixed seed, for reproducible tests
    pub fn with_seed(rank: Rank, seed: u64) -> Self {
        Self {
            rank,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl WorkKernel for MonteCarloPi {
    fn name(&self) -> &'static str {
        "monte-carlo-pi"
    }

    fn compute(&mut self, partition: &Partition) -> Result<u64> {
        let samples = match *partition {
            Partition::Samples(n) => n,
            other => {
                return Err(ScaleBenchError::KernelFault {
                    rank: self.rank,
                    message: format!("Monte-Carlo kernel expects a sample count, got {}", other),
                })
            }
        };

        let mut inside = 0u64;
        for _ in 0..samples {
            let x: f64 = self.rng.gen();
            let y: f64 = self.rng.gen();
            if x * x + y * y <= 1.0 {
                inside += 1;
            }
        }
        Ok(inside)
    }
}

/// Counts primes in a half-open range by trial division
pub struct PrimeCount {
    rank: Rank,
}

impl PrimeCount {
    pub fn for_rank(rank: Rank) -> Self {
        Self { rank }
    }
}

impl WorkKernel for PrimeCount {
    fn name(&self) -> &'static str {
        "prime-count"
    }

    fn compute(&mut self, partition: &Partition) -> Result<u64> {
        let (start, end) = match *partition {
            Partition::Range { start, end } if start <= end => (start, end),
            other => {
                return Err(ScaleBenchError::KernelFault {
                    rank: self.rank,
                    message: format!("Prime kernel expects an ordered range, got {}", other),
                })
            }
        };

        Ok((start..end).filter(|&n| is_prime(n)).count() as u64)
    }
}

/// Trial division up to `floor(sqrt(n))`; 0 and 1 are not prime
pub fn is_prime(n: u64) -> bool {
    if n <= 1 {
        return false;
    }
    let mut divisor = 2u64;
    while divisor.saturating_mul(divisor) <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 1;
    }
    true
}

/// Build the kernel a worker of `workload` owns
pub fn kernel_for(workload: Workload, rank: Rank) -> Box<dyn WorkKernel> {
    match workload {
        Workload::MonteCarlo => Box::new(MonteCarloPi::for_rank(rank)),
        Workload::PrimeCount => Box::new(PrimeCount::for_rank(rank)),
    }
}
