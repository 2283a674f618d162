//! Configuration management module
//!
//! Handles loading, saving, and validation of the benchmark run
//! configuration: the worker pool size and the ordered test suites.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Result, ScaleBenchError, APP_NAME, CONFIG_FILE};

pub mod persistence;
pub mod presets;

/// Workload executed by every worker of a suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Workload {
    /// Monte-Carlo estimate of pi; work is a number of samples
    MonteCarlo,
    /// Trial-division prime counting; work is the length of `[0, total)`
    PrimeCount,
}

impl Workload {
    /// Get a human-readable description of the workload
    pub fn description(&self) -> &'static str {
        match self {
            Workload::MonteCarlo => "Monte-Carlo pi",
            Workload::PrimeCount => "Prime counting",
        }
    }

    /// Whether partitions are contiguous integer ranges
    pub fn uses_ranges(&self) -> bool {
        matches!(self, Workload::PrimeCount)
    }
}

impl std::str::FromStr for Workload {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monte-carlo" | "montecarlo" | "pi" => Ok(Workload::MonteCarlo),
            "prime-count" | "primes" | "prime" => Ok(Workload::PrimeCount),
            other => Err(format!("Unknown workload: {}", other)),
        }
    }
}

/// One benchmark iteration: how much work, spread over how many workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Samples (Monte-Carlo) or range length (prime counting)
    pub total_work: u64,
    /// Number of worker ranks taking part in the round
    pub worker_count: usize,
}

impl TestCase {
    pub fn new(total_work: u64, worker_count: usize) -> Self {
        Self {
            total_work,
            worker_count,
        }
    }
}

/// An ordered list of test cases sharing a workload and an output file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Suite name used in logs and reports
    pub name: String,
    /// Workload executed by the workers
    pub workload: Workload,
    /// CSV file receiving one row per test case
    pub output: PathBuf,
    /// Test cases, executed in order
    pub cases: Vec<TestCase>,
}

impl SuiteConfig {
    /// Create an empty suite
    pub fn new(name: impl Into<String>, workload: Workload, output: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            workload,
            output: output.into(),
            cases: Vec::new(),
        }
    }

    /// Append a test case
    pub fn with_case(mut self, total_work: u64, worker_count: usize) -> Self {
        self.cases.push(TestCase::new(total_work, worker_count));
        self
    }

    /// Replace the output file
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Largest worker count any case asks for
    pub fn max_worker_count(&self) -> usize {
        self.cases.iter().map(|c| c.worker_count).max().unwrap_or(0)
    }

    /// Validate the suite against the number of available workers
    pub fn validate(&self, available_workers: usize) -> Result<()> {
        if self.cases.is_empty() {
            return Err(ScaleBenchError::ConfigError(format!(
                "Suite '{}' has no test cases",
                self.name
            )));
        }

        for (index, case) in self.cases.iter().enumerate() {
            if case.total_work == 0 {
                return Err(ScaleBenchError::ConfigError(format!(
                    "Suite '{}' case {}: total work must be greater than 0",
                    self.name, index
                )));
            }
            if case.worker_count == 0 {
                return Err(ScaleBenchError::ConfigError(format!(
                    "Suite '{}' case {}: worker count must be greater than 0",
                    self.name, index
                )));
            }
            if case.worker_count > available_workers {
                return Err(ScaleBenchError::ConfigError(format!(
                    "Suite '{}' case {}: {} workers requested but only {} are running",
                    self.name, index, case.worker_count, available_workers
                )));
            }
        }

        Ok(())
    }
}

/// Top-level run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of worker ranks started for the run
    pub workers: usize,
    /// Upper bound on one round's result wait; absent means wait forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_timeout_ms: Option<u64>,
    /// Suites executed one after another
    #[serde(default)]
    pub suites: Vec<SuiteConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        let output_dir = PathBuf::from("output");
        Self {
            workers: 16,
            round_timeout_ms: None,
            suites: vec![
                presets::weak_scaling(Workload::MonteCarlo, &output_dir),
                presets::weak_scaling(Workload::PrimeCount, &output_dir),
            ],
        }
    }
}

impl RunConfig {
    /// Create a new run configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration without suites
    pub fn empty(workers: usize) -> Self {
        Self {
            workers,
            round_timeout_ms: None,
            suites: Vec::new(),
        }
    }

    /// Validate the configuration parameters
    ///
    /// A test case asking for more workers than are running is rejected here,
    /// before anything is dispatched.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ScaleBenchError::ConfigError(
                "Worker count must be greater than 0".to_string(),
            ));
        }

        const MAX_WORKERS: usize = 1024;
        if self.workers > MAX_WORKERS {
            return Err(ScaleBenchError::ConfigError(format!(
                "Too many workers: {} (max: {})",
                self.workers, MAX_WORKERS
            )));
        }

        if self.round_timeout_ms == Some(0) {
            return Err(ScaleBenchError::ConfigError(
                "Round timeout must be greater than 0".to_string(),
            ));
        }

        if self.suites.is_empty() {
            return Err(ScaleBenchError::ConfigError(
                "At least one suite must be configured".to_string(),
            ));
        }

        for suite in &self.suites {
            suite.validate(self.workers)?;
        }

        Ok(())
    }

    /// Round timeout as a duration
    pub fn round_timeout(&self) -> Option<Duration> {
        self.round_timeout_ms.map(Duration::from_millis)
    }

    /// Set the number of worker ranks
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the round timeout
    pub fn with_round_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.round_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Append a suite
    pub fn with_suite(mut self, suite: SuiteConfig) -> Self {
        self.suites.push(suite);
        self
    }

    /// Move every suite output into `dir`, keeping file names
    pub fn with_output_dir(mut self, dir: &Path) -> Self {
        for suite in &mut self.suites {
            let file_name = suite
                .output
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(format!("{}.csv", suite.name)));
            suite.output = dir.join(file_name);
        }
        self
    }

    /// Load configuration from the standard config file location
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load and validate configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScaleBenchError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            ScaleBenchError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ScaleBenchError::ConfigError(format!(
                        "Failed to create config directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(path, content).map_err(|e| {
            ScaleBenchError::ConfigError(format!(
                "Failed to write config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Get the standard configuration file path
    /// Uses $CONFIG_HOME/scalebench/scalebench.toml
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ScaleBenchError::ConfigError("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workers, 16);
        assert_eq!(config.round_timeout(), None);
    }

    #[test]
    fn test_toml_serialization() {
        let config = RunConfig::empty(4)
            .with_round_timeout(Some(Duration::from_secs(30)))
            .with_suite(
                SuiteConfig::new("pi", Workload::MonteCarlo, "pi.csv")
                    .with_case(50_000, 1)
                    .with_case(50_000, 4),
            );
        let toml_str = toml::to_string(&config).expect("Failed to serialize to TOML");
        let deserialized: RunConfig =
            toml::from_str(&toml_str).expect("Failed to deserialize from TOML");

        assert_eq!(config, deserialized);
        assert!(toml_str.contains("monte-carlo"));
    }

    #[test]
    fn test_rejects_more_workers_than_running() {
        let config = RunConfig::empty(4).with_suite(
            SuiteConfig::new("primes", Workload::PrimeCount, "primes.csv")
                .with_case(10_000, 4)
                .with_case(10_000, 8),
        );

        match config.validate() {
            Err(ScaleBenchError::ConfigError(msg)) => {
                assert!(msg.contains("8 workers requested"));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_degenerate_cases() {
        let zero_work = RunConfig::empty(2)
            .with_suite(SuiteConfig::new("s", Workload::MonteCarlo, "s.csv").with_case(0, 1));
        assert!(zero_work.validate().is_err());

        let zero_workers = RunConfig::empty(2)
            .with_suite(SuiteConfig::new("s", Workload::MonteCarlo, "s.csv").with_case(10, 0));
        assert!(zero_workers.validate().is_err());

        let no_cases =
            RunConfig::empty(2).with_suite(SuiteConfig::new("s", Workload::MonteCarlo, "s.csv"));
        assert!(no_cases.validate().is_err());

        assert!(RunConfig::empty(2).validate().is_err());
        assert!(RunConfig::default().with_workers(0).validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("scalebench.toml");

        let config = RunConfig::default().with_round_timeout(Some(Duration::from_millis(1500)));
        config.save_to(&path).unwrap();

        let loaded = RunConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.round_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_with_output_dir_keeps_file_names() {
        let config = RunConfig::default().with_output_dir(Path::new("/tmp/results"));
        for suite in &config.suites {
            assert!(suite.output.starts_with("/tmp/results"));
            assert!(suite.output.extension().is_some());
        }
    }

    #[test]
    fn test_workload_from_str() {
        assert_eq!("pi".parse::<Workload>().unwrap(), Workload::MonteCarlo);
        assert_eq!("Primes".parse::<Workload>().unwrap(), Workload::PrimeCount);
        assert!("sieve".parse::<Workload>().is_err());
    }

    #[test]
    fn test_config_file_path() {
        if let Ok(path) = RunConfig::config_file_path() {
            assert!(path.to_string_lossy().contains("scalebench.toml"));
        }
    }
}
