use scalebench::bench::{
    kernel_for, plan, run_suite, Master, Partition, PrimeCount, WorkKernel, WorkerPool,
    WorkerStatus,
};
use scalebench::config::persistence::CsvResultSink;
use scalebench::config::{SuiteConfig, TestCase, Workload};
use scalebench::models::{ResultRow, RowMetrics};
use scalebench::{Rank, ScaleBenchError};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

/// Fails every partition it is given
struct CrashingKernel {
    rank: Rank,
}

impl WorkKernel for CrashingKernel {
    fn name(&self) -> &'static str {
        "crashing"
    }

    fn compute(&mut self, _partition: &Partition) -> scalebench::Result<u64> {
        Err(ScaleBenchError::KernelFault {
            rank: self.rank,
            message: "simulated crash".to_string(),
        })
    }
}

fn crash_on_rank_one(rank: Rank) -> Box<dyn WorkKernel> {
    if rank == 1 {
        Box::new(CrashingKernel { rank })
    } else {
        Box::new(PrimeCount::for_rank(rank))
    }
}

#[tokio::test]
async fn test_single_worker_pi_estimate() {
    let (pool, endpoint) = WorkerPool::spawn(1, |rank| kernel_for(Workload::MonteCarlo, rank));
    let mut master = Master::new(endpoint, Workload::MonteCarlo, Vec::<ResultRow>::new());

    let cases = [TestCase::new(50_000, 1)];
    let report = master.run("pi", &cases, "pi.csv".into()).await.unwrap();
    assert_eq!(report.rows_recorded, 1);

    let (endpoint, rows) = master.into_parts();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].worker_count, 1);
    assert_eq!(rows[0].total_work, 50_000);
    assert!(rows[0].elapsed_millis >= 0.0);
    match rows[0].metrics {
        RowMetrics::MonteCarlo {
            estimate,
            difference,
            error,
        } => {
            assert!((0.0..=4.0).contains(&estimate));
            assert!(error < 0.1, "estimate {} too far from pi", estimate);
            assert_eq!(error, difference.abs());
        }
        ref other => panic!("unexpected metrics {:?}", other),
    }

    pool.shutdown(&endpoint).await;
}

#[tokio::test]
async fn test_four_worker_prime_count() {
    let case = TestCase::new(10_000, 4);
    let plan = plan(Workload::PrimeCount, &case).unwrap();
    let ranges: Vec<Partition> = plan.descriptors.iter().map(|d| d.partition).collect();
    assert_eq!(
        ranges,
        vec![
            Partition::Range { start: 0, end: 2500 },
            Partition::Range { start: 2500, end: 5000 },
            Partition::Range { start: 5000, end: 7500 },
            Partition::Range { start: 7500, end: 10_000 },
        ]
    );

    let (pool, endpoint) = WorkerPool::spawn(4, |rank| kernel_for(Workload::PrimeCount, rank));
    let mut master = Master::new(endpoint, Workload::PrimeCount, Vec::<ResultRow>::new());

    let outcome = master.run_round(&case).await.unwrap();
    assert_eq!(outcome.metrics, RowMetrics::PrimeCount { total_primes: 1229 });
    let ranks: Vec<Rank> = outcome.reports.iter().map(|&(rank, _)| rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);

    let (endpoint, _) = master.into_parts();
    pool.shutdown(&endpoint).await;
}

#[tokio::test]
async fn test_eight_worker_weighted_samples() {
    let case = TestCase::new(100, 8);
    let plan = plan(Workload::MonteCarlo, &case).unwrap();
    let sizes: Vec<u64> = plan.descriptors.iter().map(|d| d.partition.size()).collect();
    assert_eq!(sizes, vec![20, 20, 20, 20, 5, 5, 5, 5]);

    let (pool, endpoint) = WorkerPool::spawn(8, |rank| kernel_for(Workload::MonteCarlo, rank));
    let mut master = Master::new(endpoint, Workload::MonteCarlo, Vec::<ResultRow>::new());

    let outcome = master.run_round(&case).await.unwrap();
    assert_eq!(outcome.reports.len(), 8);
    for &(rank, hits) in &outcome.reports {
        let limit = if rank <= 4 { 20 } else { 5 };
        assert!(hits <= limit, "rank {} reported {} hits", rank, hits);
    }

    let (endpoint, _) = master.into_parts();
    pool.shutdown(&endpoint).await;
}

#[tokio::test]
async fn test_crashed_worker_stalls_round_without_timeout() {
    let (pool, endpoint) = WorkerPool::spawn(2, crash_on_rank_one);
    let mut master = Master::new(endpoint, Workload::PrimeCount, Vec::<ResultRow>::new());

    let cases = [TestCase::new(1_000, 2)];
    let stalled = timeout(
        Duration::from_millis(500),
        master.run("primes", &cases, "primes.csv".into()),
    )
    .await;
    assert!(stalled.is_err(), "round should not complete");
    assert!(master.sink().is_empty());

    let statuses = pool.get_worker_statuses().await;
    assert!(matches!(statuses[0].1, WorkerStatus::Failed(_)));

    pool.cancel_all();
    let statuses = pool.join_all().await;
    assert!(matches!(statuses[0].1, WorkerStatus::Failed(_)));
    assert_eq!(statuses[1].1, WorkerStatus::Cancelled);
}

#[tokio::test]
async fn test_crashed_worker_surfaces_as_round_timeout() {
    let (pool, endpoint) = WorkerPool::spawn(2, crash_on_rank_one);
    let mut master = Master::new(endpoint, Workload::PrimeCount, Vec::<ResultRow>::new())
        .with_round_timeout(Some(Duration::from_millis(200)));

    let cases = [TestCase::new(1_000, 2), TestCase::new(1_000, 1)];
    match master.run("primes", &cases, "primes.csv".into()).await {
        Err(ScaleBenchError::RoundTimedOut { round, missing, .. }) => {
            assert_eq!(round, 1);
            assert_eq!(missing, vec![1]);
        }
        other => panic!("expected a round timeout, got {:?}", other.map(|r| r.summary())),
    }
    assert!(master.sink().is_empty());
    pool.cancel_all();
}

#[tokio::test]
async fn test_terminate_stops_every_worker() {
    let (pool, endpoint) = WorkerPool::spawn(4, |rank| kernel_for(Workload::PrimeCount, rank));
    let mut master = Master::new(endpoint, Workload::PrimeCount, Vec::<ResultRow>::new());

    let cases = [TestCase::new(100, 1), TestCase::new(100, 2), TestCase::new(100, 4)];
    let report = master.run("primes", &cases, "primes.csv".into()).await.unwrap();
    assert_eq!(report.rounds_completed, 3);

    let (endpoint, rows) = master.into_parts();
    assert!(rows
        .iter()
        .all(|row| row.metrics == RowMetrics::PrimeCount { total_primes: 25 }));

    let statuses = timeout(Duration::from_secs(5), pool.shutdown(&endpoint))
        .await
        .unwrap();
    assert_eq!(statuses.len(), 4);
    assert!(statuses
        .iter()
        .all(|(_, status)| *status == WorkerStatus::Terminated));
}

#[tokio::test]
async fn test_suite_writes_csv_in_case_order() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("results").join("primes.csv");
    let suite = SuiteConfig::new("primes", Workload::PrimeCount, &output)
        .with_case(10_000, 1)
        .with_case(10_000, 4)
        .with_case(10_000, 8);

    let report = run_suite(&suite, 8, Some(Duration::from_secs(30)), None)
        .await
        .unwrap();
    assert_eq!(report.rounds_completed, 3);
    assert_eq!(report.rows_recorded, 3);
    assert_eq!(report.rows_dropped, 0);
    assert_eq!(report.output, output);

    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "TotalPrimes,Ntot,AvailableProcessors,TimeDuration(ms)");
    for (line, workers) in lines[1..].iter().zip(["1", "4", "8"]) {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields[0], "1229");
        assert_eq!(fields[1], "10000");
        assert_eq!(fields[2], workers);
        assert!(fields[3].parse::<f64>().unwrap() >= 0.0);
    }
}

#[tokio::test]
async fn test_suite_rejects_case_larger_than_pool() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("pi.csv");
    let suite = SuiteConfig::new("pi", Workload::MonteCarlo, &output)
        .with_case(1_000, 1)
        .with_case(1_000, 16);

    let result = run_suite(&suite, 8, None, None).await;
    assert!(matches!(result, Err(ScaleBenchError::ConfigError(_))));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_unwritable_output_drops_rows_but_completes() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("blocker");
    std::fs::write(&blocker, "file").unwrap();

    let sink = CsvResultSink::new(blocker.join("pi.csv"), Workload::MonteCarlo);
    let (pool, endpoint) = WorkerPool::spawn(2, |rank| kernel_for(Workload::MonteCarlo, rank));
    let mut master = Master::new(endpoint, Workload::MonteCarlo, sink);

    let cases = [TestCase::new(1_000, 1), TestCase::new(1_000, 2)];
    let report = master
        .run("pi", &cases, blocker.join("pi.csv"))
        .await
        .unwrap();
    assert_eq!(report.rounds_completed, 2);
    assert_eq!(report.rows_recorded, 0);
    assert_eq!(report.rows_dropped, 2);

    let (endpoint, _) = master.into_parts();
    pool.shutdown(&endpoint).await;
}

#[tokio::test]
async fn test_run_all_executes_suites_in_order() {
    use scalebench::bench::run_all;
    use scalebench::config::RunConfig;

    let temp_dir = TempDir::new().unwrap();
    let config = RunConfig::empty(2)
        .with_suite(
            SuiteConfig::new("pi", Workload::MonteCarlo, "pi.csv")
                .with_case(2_000, 1)
                .with_case(2_000, 2),
        )
        .with_suite(SuiteConfig::new("primes", Workload::PrimeCount, "primes.csv").with_case(100, 2))
        .with_output_dir(temp_dir.path())
        .with_round_timeout(Some(Duration::from_secs(30)));

    let reports = run_all(&config).await.unwrap();
    let names: Vec<&str> = reports.iter().map(|r| r.suite.as_str()).collect();
    assert_eq!(names, vec!["pi", "primes"]);
    assert_eq!(reports[0].rows_recorded, 2);
    assert_eq!(reports[1].rows_recorded, 1);

    let primes = std::fs::read_to_string(temp_dir.path().join("primes.csv")).unwrap();
    assert_eq!(primes.lines().nth(1).unwrap().split(',').next(), Some("25"));
}

/// Holds its worker inside the kernel for a few seconds
struct StuckKernel;

impl WorkKernel for StuckKernel {
    fn name(&self) -> &'static str {
        "stuck"
    }

    fn compute(&mut self, _partition: &Partition) -> scalebench::Result<u64> {
        std::thread::sleep(Duration::from_secs(3));
        Ok(0)
    }
}

#[tokio::test]
async fn test_timed_out_round_cancels_busy_workers_promptly() {
    let (pool, endpoint) = WorkerPool::spawn(1, |_| Box::new(StuckKernel) as Box<dyn WorkKernel>);
    let mut master = Master::new(endpoint, Workload::MonteCarlo, Vec::<ResultRow>::new())
        .with_round_timeout(Some(Duration::from_millis(100)));

    let result = master.run("pi", &[TestCase::new(10, 1)], "pi.csv".into()).await;
    assert!(matches!(result, Err(ScaleBenchError::RoundTimedOut { .. })));

    let started = std::time::Instant::now();
    pool.cancel_all();
    let statuses = timeout(Duration::from_secs(1), pool.join_all())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(statuses, vec![(1, WorkerStatus::Cancelled)]);
}
