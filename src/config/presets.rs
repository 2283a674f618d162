//! Benchmark matrices used on the reference cluster
//!
//! Strong scaling keeps the total work fixed while the worker count grows;
//! weak scaling keeps the work per worker fixed. Every case is repeated
//! [`REPETITIONS`] times so the CSV carries enough samples per point.

use std::path::Path;

use super::{SuiteConfig, Workload};

/// Worker counts swept by every preset
pub const WORKER_STEPS: [usize; 5] = [1, 2, 4, 8, 16];

/// Repetitions of each (total work, worker count) point
pub const REPETITIONS: usize = 10;

const MONTE_CARLO_STRONG_TOTALS: [u64; 4] = [50_000, 500_000, 5_000_000, 50_000_000];
const MONTE_CARLO_WEAK_PER_WORKER: [u64; 3] = [50_000, 500_000, 5_000_000];
const PRIME_STRONG_TOTALS: [u64; 3] = [10_000, 100_000, 1_000_000];
const PRIME_WEAK_PER_WORKER: [u64; 2] = [10_000, 100_000];

/// Preset names accepted by [`by_name`]
pub const PRESET_NAMES: [&str; 4] = [
    "monte-carlo-strong",
    "monte-carlo-weak",
    "prime-strong",
    "prime-weak",
];

/// Strong-scaling suite for `workload`, writing into `output_dir`
pub fn strong_scaling(workload: Workload, output_dir: &Path) -> SuiteConfig {
    let (name, totals): (&str, &[u64]) = match workload {
        Workload::MonteCarlo => ("monte-carlo-strong", &MONTE_CARLO_STRONG_TOTALS),
        Workload::PrimeCount => ("prime-strong", &PRIME_STRONG_TOTALS),
    };

    let mut suite = SuiteConfig::new(name, workload, output_dir.join(format!("{}.csv", name)));
    for &total in totals {
        for &workers in &WORKER_STEPS {
            for _ in 0..REPETITIONS {
                suite = suite.with_case(total, workers);
            }
        }
    }
    suite
}

/// Weak-scaling suite for `workload`, writing into `output_dir`
pub fn weak_scaling(workload: Workload, output_dir: &Path) -> SuiteConfig {
    let (name, per_worker): (&str, &[u64]) = match workload {
        Workload::MonteCarlo => ("monte-carlo-weak", &MONTE_CARLO_WEAK_PER_WORKER),
        Workload::PrimeCount => ("prime-weak", &PRIME_WEAK_PER_WORKER),
    };

    let mut suite = SuiteConfig::new(name, workload, output_dir.join(format!("{}.csv", name)));
    for &base in per_worker {
        for &workers in &WORKER_STEPS {
            for _ in 0..REPETITIONS {
                suite = suite.with_case(base * workers as u64, workers);
            }
        }
    }
    suite
}

/// Look a preset up by name
pub fn by_name(name: &str, output_dir: &Path) -> Option<SuiteConfig> {
    match name {
        "monte-carlo-strong" => Some(strong_scaling(Workload::MonteCarlo, output_dir)),
        "monte-carlo-weak" => Some(weak_scaling(Workload::MonteCarlo, output_dir)),
        "prime-strong" => Some(strong_scaling(Workload::PrimeCount, output_dir)),
        "prime-weak" => Some(weak_scaling(Workload::PrimeCount, output_dir)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_scaling_keeps_total_fixed() {
        let suite = strong_scaling(Workload::PrimeCount, Path::new("out"));
        assert_eq!(
            suite.cases.len(),
            PRIME_STRONG_TOTALS.len() * WORKER_STEPS.len() * REPETITIONS
        );
        let first_block = &suite.cases[..WORKER_STEPS.len() * REPETITIONS];
        assert!(first_block.iter().all(|c| c.total_work == 10_000));
        assert_eq!(suite.max_worker_count(), 16);
    }

    #[test]
    fn test_weak_scaling_keeps_work_per_worker_fixed() {
        let suite = weak_scaling(Workload::MonteCarlo, Path::new("out"));
        for case in &suite.cases {
            assert_eq!(case.total_work % case.worker_count as u64, 0);
            let per_worker = case.total_work / case.worker_count as u64;
            assert!(MONTE_CARLO_WEAK_PER_WORKER.contains(&per_worker));
        }
        assert!(suite.output.ends_with("monte-carlo-weak.csv"));
    }

    #[test]
    fn test_every_preset_name_resolves() {
        for name in PRESET_NAMES {
            let suite = by_name(name, Path::new("out")).expect("preset exists");
            assert_eq!(suite.name, name);
            assert!(suite.validate(16).is_ok());
        }
        assert!(by_name("nope", Path::new("out")).is_none());
    }
}
