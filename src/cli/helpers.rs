//! Shared helper functions for CLI commands.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use console::style;

use socrawler::config::Settings;
use socrawler::repository::{self, ItemRepository};
use socrawler::services::download::MediaDownloader;
use socrawler::services::StageResult;

/// Create directories, migrate, and open the item store.
pub async fn open_repository(settings: &Settings) -> anyhow::Result<ItemRepository> {
    settings.ensure_directories()?;
    repository::open(&settings.database_url())
        .await
        .with_context(|| format!("Failed to open database {}", settings.database_path.display()))
}

pub fn downloader(settings: &Settings) -> anyhow::Result<MediaDownloader> {
    MediaDownloader::new(settings.download_config()).context("Failed to build HTTP client")
}

/// Resolve a Ctrl-C into a cancellation signal for long-running work.
pub fn cancel_on_ctrl_c() -> tokio::sync::watch::Receiver<bool> {
    let (tx, rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} Interrupted, finishing up...", style("!").yellow());
            let _ = tx.send(true);
        }
    });
    rx
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

pub fn print_row(label: &str, value: impl std::fmt::Display) {
    println!("  {:<22} {}", label, value);
}

pub fn print_paths(label: &str, paths: &[impl AsRef<Path>]) {
    if paths.is_empty() {
        return;
    }
    println!("  {}:", label);
    for path in paths {
        println!("    {}", style(path.as_ref().display()).dim());
    }
}

/// Summary block for an upload stage.
pub fn print_stage(title: &str, result: &StageResult) {
    let marker = if result.failed == 0 {
        style("✓").green()
    } else {
        style("!").yellow()
    };
    println!("{} {}", marker, style(title).bold());
    print_row("Pending", result.total_pending);
    print_row("Attempted", result.attempted);
    print_row("Succeeded", result.succeeded);
    print_row("Failed", result.failed);
    print_row("Duration", format_duration(result.duration));
    for failure in &result.failures {
        println!(
            "    {} {}: {}",
            style("✗").red(),
            failure.post_id,
            style(&failure.error).dim()
        );
    }
}
