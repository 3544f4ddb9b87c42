// modgraph/src/cli/status.rs
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use modgraph_common::frontier::FrontierEvent;
use tokio::sync::broadcast;

const BAR_TEMPLATE: &str =
    "{spinner:.blue.bold} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {wide_msg}";

/// Spinner for short single-step commands.
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue.bold} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn crawl_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Renders crawl progress until the run reports its outcome. The bar's length
/// grows as modules are admitted.
pub async fn handle_events(mut event_rx: broadcast::Receiver<FrontierEvent>) {
    let pb = crawl_bar();
    let mut skipped = 0usize;

    loop {
        match event_rx.recv().await {
            Ok(event) => match event {
                FrontierEvent::RunStarted { parallelism } => {
                    pb.println(format!(
                        "{} with {} workers",
                        "Starting crawl".cyan().bold(),
                        parallelism
                    ));
                }
                FrontierEvent::ModuleAdmitted { .. } => pb.inc_length(1),
                FrontierEvent::DuplicateSeed { .. } => {}
                FrontierEvent::ModuleStarted { module } => pb.set_message(module.to_string()),
                FrontierEvent::ModuleDone { .. } => pb.inc(1),
                FrontierEvent::ModuleSkipped { module, .. } => {
                    skipped += 1;
                    pb.inc(1);
                    pb.set_message(format!("{} {}", "skipped".yellow(), module));
                }
                FrontierEvent::RunFinished { summary } => {
                    pb.finish_and_clear();
                    println!(
                        "{} in {:.2}s ({} processed, {} skipped, {} duplicate seeds)",
                        "Crawl finished".bold(),
                        summary.duration_secs,
                        summary.processed.to_string().green(),
                        summary.skipped.to_string().yellow(),
                        summary.duplicates
                    );
                    break;
                }
                FrontierEvent::RunFailed { error } => {
                    pb.abandon_with_message(format!("{} {}", "stopped:".red().bold(), error));
                    if skipped > 0 {
                        eprintln!("{} modules were skipped before the crawl stopped", skipped);
                    }
                    break;
                }
            },
            Err(broadcast::error::RecvError::Closed) => {
                pb.finish_and_clear();
                break;
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                // Lost admissions would leave the bar short of its final length.
                pb.set_message(format!("({missed} progress updates dropped)"));
            }
        }
    }
}
