use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use scalebench::bench::{classify, plan, share_fraction, total_share};
use scalebench::config::{presets, RunConfig, TestCase, Workload};
use scalebench::simple::run_with_progress;
use scalebench::util::{format_count, parse_count};
use scalebench::{error as errors, Result, ScaleBenchError};

/// Master/worker scalability benchmark
#[derive(Parser, Debug)]
#[command(name = "scalebench", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the configured suites
    Run {
        /// Configuration file (defaults to the user config, then built-in suites)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Run these presets instead of the configured suites
        #[arg(long)]
        preset: Vec<String>,

        /// Number of worker ranks to start
        #[arg(long)]
        workers: Option<usize>,

        /// Directory receiving the CSV files
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Give up on a round after this long (e.g. "30s", "2m")
        #[arg(long, value_parser = humantime::parse_duration)]
        round_timeout: Option<Duration>,

        /// Print the run reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the partition plan of one test case
    Plan {
        /// Workload: monte-carlo or prime-count
        #[arg(long, default_value = "monte-carlo")]
        workload: Workload,

        /// Total work, e.g. 50000 or 50k
        #[arg(long, value_parser = parse_count)]
        total: u64,

        /// Worker count of the case
        #[arg(long)]
        workers: usize,
    },
    /// Write the default configuration file
    InitConfig {
        /// Destination (defaults to the user config location)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "scalebench=debug"
    } else {
        "scalebench=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = dispatch(cli.command).await {
        error!(error = %e, "scalebench failed");
        eprintln!("{}", errors::user_friendly_message(&e));
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            config,
            preset,
            workers,
            output_dir,
            round_timeout,
            json,
        } => {
            let config = resolve_config(config, &preset, workers, output_dir, round_timeout)?;
            run(&config, json).await
        }
        Commands::Plan {
            workload,
            total,
            workers,
        } => print_plan(workload, total, workers),
        Commands::InitConfig { path } => {
            let path = match path {
                Some(path) => path,
                None => RunConfig::config_file_path()?,
            };
            RunConfig::default().save_to(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

fn resolve_config(
    path: Option<PathBuf>,
    preset_names: &[String],
    workers: Option<usize>,
    output_dir: Option<PathBuf>,
    round_timeout: Option<Duration>,
) -> Result<RunConfig> {
    let mut config = match &path {
        Some(path) => RunConfig::load_from(path)?,
        None => RunConfig::load()?,
    };

    if !preset_names.is_empty() {
        let dir = output_dir.clone().unwrap_or_else(|| PathBuf::from("output"));
        config.suites = preset_names
            .iter()
            .map(|name| {
                presets::by_name(name, &dir).ok_or_else(|| {
                    ScaleBenchError::ConfigError(format!(
                        "Unknown preset '{}' (known: {})",
                        name,
                        presets::PRESET_NAMES.join(", ")
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
    }

    if let Some(workers) = workers {
        config = config.with_workers(workers);
    }
    if let Some(dir) = output_dir {
        config = config.with_output_dir(&dir);
    }
    if round_timeout.is_some() {
        config = config.with_round_timeout(round_timeout);
    }

    config.validate()?;
    Ok(config)
}

async fn run(config: &RunConfig, json: bool) -> Result<()> {
    info!(
        workers = config.workers,
        suites = config.suites.len(),
        "master starting"
    );

    let mut reports = Vec::with_capacity(config.suites.len());
    for suite in &config.suites {
        let report = run_with_progress(suite, config.workers, config.round_timeout()).await?;
        info!("{}", report.summary());
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}", report.summary());
        }
    }
    Ok(())
}

fn print_plan(workload: Workload, total: u64, workers: usize) -> Result<()> {
    let case = TestCase::new(total, workers);
    let plan = plan(workload, &case)?;

    println!(
        "{} - {} work on {} workers (shares sum to {})",
        workload.description(),
        format_count(total),
        workers,
        total_share(workers)
    );
    println!("{:>5}  {:<5}  {:>8}  payload", "rank", "class", "share");
    for descriptor in &plan.descriptors {
        println!(
            "{:>5}  {:<5}  {:>8.4}  {}",
            descriptor.rank,
            format!("{:?}", classify(descriptor.rank, workers)),
            share_fraction(descriptor.rank, workers),
            descriptor.partition
        );
    }
    println!("assigned {} of {}", plan.total_assigned(), total);
    Ok(())
}
