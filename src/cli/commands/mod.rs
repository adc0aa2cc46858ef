//! CLI parser and command dispatch.

mod crawl;
mod export;
mod feed;
mod status;
mod upload;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use socrawler::config::load_settings;

#[derive(Parser)]
#[command(name = "socrawler")]
#[command(about = "Harvest videos from a short video feed and publish them to a CMS")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the live feed page and download every video it loads
    Crawl {
        /// Crawl duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,
        /// Seconds between scrolls
        #[arg(long)]
        scroll_interval: Option<u64>,
        /// Directory for downloads (overrides config)
        #[arg(long)]
        save_path: Option<PathBuf>,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },

    /// Fetch the feed endpoint or download from it
    Feed {
        #[command(subcommand)]
        command: FeedCommands,
    },

    /// Push stored videos through the upload pipeline
    Upload {
        #[command(subcommand)]
        command: UploadCommands,
    },

    /// Show stored item counts and upload progress
    Status,

    /// Export stored items as a feed document
    Export {
        /// Maximum items to export (0 = all)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Output file, or - for stdout
        #[arg(short, long, default_value = "-")]
        output: String,
    },
}

#[derive(Subcommand)]
enum FeedCommands {
    /// Fetch the feed and save it as a snapshot
    Fetch {
        /// Snapshot file to write
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },
    /// Download new items from the live feed or a saved snapshot
    Download {
        /// Read the feed from a snapshot instead of fetching it
        #[arg(long)]
        from: Option<PathBuf>,
        /// Maximum new items to download (0 = unlimited)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },
}

#[derive(Subcommand)]
enum UploadCommands {
    /// Upload stored videos to the object store
    ObjectStore {
        /// Maximum items to upload (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },
    /// Publish stored videos to the CMS
    Cms {
        /// Maximum items to upload (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())
        .await
        .map_err(anyhow::Error::msg)
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Crawl {
            duration,
            scroll_interval,
            save_path,
            headful,
        } => {
            if let Some(duration) = duration {
                settings.crawl.duration = duration;
            }
            if let Some(interval) = scroll_interval {
                settings.crawl.scroll_interval = interval;
            }
            if let Some(path) = save_path {
                settings.downloads_dir = path;
            }
            if headful {
                settings.browser.headless = false;
            }
            crawl::cmd_crawl(&settings).await
        }
        Commands::Feed { command } => match command {
            FeedCommands::Fetch { output, headful } => {
                if headful {
                    settings.browser.headless = false;
                }
                feed::cmd_feed_fetch(&settings, output).await
            }
            FeedCommands::Download {
                from,
                limit,
                headful,
            } => {
                if headful {
                    settings.browser.headless = false;
                }
                let limit = limit.unwrap_or(settings.feed.limit);
                feed::cmd_feed_download(&settings, from, limit).await
            }
        },
        Commands::Upload { command } => match command {
            UploadCommands::ObjectStore { limit } => {
                upload::cmd_upload_object_store(&settings, limit).await
            }
            UploadCommands::Cms { limit } => upload::cmd_upload_cms(&settings, limit).await,
        },
        Commands::Status => status::cmd_status(&settings).await,
        Commands::Export { limit, output } => export::cmd_export(&settings, limit, &output).await,
    }
}
