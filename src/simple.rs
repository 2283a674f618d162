use std::time::Duration;

use crate::bench::{run_suite, ProgressUpdate};
use crate::config::SuiteConfig;
use crate::models::RunReport;
use crate::util::format_millis;
use crate::Result;

/// Run one suite and stream a progress bar, one tick per round.
pub async fn run_with_progress(
    suite: &SuiteConfig,
    workers: usize,
    round_timeout: Option<Duration>,
) -> Result<RunReport> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let pb = indicatif::ProgressBar::new(suite.cases.len() as u64);
    if let Ok(style) =
        indicatif::ProgressStyle::with_template("{spinner} {prefix} {pos}/{len} rounds ({eta}) {msg}")
    {
        pb.set_style(style);
    }
    pb.set_prefix(suite.name.clone());

    let handle = tokio::spawn(async move {
        while let Some(ProgressUpdate {
            case_index,
            case,
            elapsed_millis,
            recorded,
            ..
        }) = rx.recv().await
        {
            pb.set_position(case_index as u64);
            pb.set_message(format!(
                "{} work on {} workers in {}{}",
                case.total_work,
                case.worker_count,
                format_millis(elapsed_millis),
                if recorded { "" } else { " (not saved)" }
            ));
        }
        pb.finish();
    });

    let result = run_suite(suite, workers, round_timeout, Some(tx)).await;
    handle.await.ok();
    result
}
