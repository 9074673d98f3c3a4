//! weub: command-line client for the Weub video service
//!
//! Drives the library against a live server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_stream::StreamExt;
use weub::types::{
    PageRequest, Resolution, SortBy, SortOrder, UploadRequest, VideoFilters, VideoStatus,
};
use weub::{
    Config, NotificationCenter, PollEvent, PollOutcome, StatusPoller, UploadTracker, VideoClient,
};

/// Weub video service client
#[derive(Parser)]
#[command(name = "weub")]
#[command(version = weub::version::PKG_VERSION)]
#[command(about = "Weub video service client")]
struct Args {
    /// Config file (default: ~/.weub/config.toml, then /etc/weub/config.toml)
    #[arg(short, long, env = "WEUB_CONFIG")]
    config: Option<PathBuf>,

    /// Use the production preset when no config file is found
    #[arg(long)]
    production: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check service health
    Health,

    /// Show service statistics
    Stats,

    /// List videos
    List {
        /// Only videos in this status (pending, processing, ready, failed)
        #[arg(long)]
        status: Option<String>,
        /// Free-text search
        #[arg(short, long)]
        search: Option<String>,
        /// Require a tag (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,
        /// Only videos with this rendition, e.g. 720p
        #[arg(long)]
        resolution: Option<Resolution>,
        /// Sort by newest first
        #[arg(long)]
        newest: bool,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Show one video
    Show {
        /// Video id
        id: String,
    },

    /// Show the processing status of a video
    Status {
        /// Video id
        id: String,
    },

    /// Poll a video's status until processing ends
    Watch {
        /// Video id
        id: String,
        /// Poll interval in milliseconds (default: from config)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Print the HLS playlist of one rendition
    Playlist {
        /// Video id
        id: String,
        /// Rendition, e.g. 720p
        #[arg(default_value = "720p")]
        resolution: Resolution,
    },

    /// Upload a video file
    Upload {
        /// Path to the video file
        file: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Tag (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match (&args.config, args.production) {
        (None, true) => Config::production(),
        (path, _) => Config::load_or_default(path.as_deref())?,
    };
    config.apply_env();

    let notifications = NotificationCenter::new();
    let videos = VideoClient::from_config(&config, Some(Arc::new(notifications.clone())))?;

    match args.command {
        Command::Health => {
            let report = videos.health().await?;
            println!("weub {} ({:?})", report.version, report.status);
            println!("database: {}", report.services.database);
            println!("redis: {}", report.services.redis);
            println!("storage: {}", report.services.storage);
            if let Some(stats) = report.stats {
                println!(
                    "videos: {} ({} ready, {} processing, {} failed), queue: {}",
                    stats.total_videos,
                    stats.videos_ready,
                    stats.videos_processing,
                    stats.videos_failed,
                    stats.queue_size
                );
            }
        }

        Command::Stats => {
            let stats = videos.stats().await?;
            println!("videos: {}", stats.overview.total_videos);
            println!("views: {}", stats.overview.total_views);
            println!("storage: {} bytes", stats.overview.total_storage_used);
            println!(
                "success rate: {:.1}%",
                stats.processing_stats.success_rate
            );
            for entry in stats.popular_resolutions {
                println!("  {}: {}", entry.resolution, entry.count);
            }
        }

        Command::List {
            status,
            search,
            tag,
            resolution,
            newest,
            page,
            page_size,
        } => {
            let mut filters = VideoFilters::new();
            if let Some(status) = status {
                filters = filters.status(VideoStatus::from(status));
            }
            if let Some(search) = search {
                filters = filters.search(search);
            }
            for tag in tag {
                filters = filters.tag(tag);
            }
            if let Some(resolution) = resolution {
                filters = filters.resolution(resolution);
            }
            if newest {
                filters = filters.sort_by(SortBy::CreatedAt).sort_order(SortOrder::Desc);
            }
            let page_size = page_size.unwrap_or(config.ui.items_per_page);
            let result = videos
                .list(&filters, Some(PageRequest::new(page, page_size)))
                .await?;
            if result.videos.is_empty() {
                println!("no videos");
            }
            for video in &result.videos {
                println!("{}  {:<10}  {}", video.id, video.status, video.title);
            }
            let p = &result.pagination;
            println!(
                "page {}/{} ({} videos)",
                p.current_page, p.total_pages, p.total_items
            );
        }

        Command::Show { id } => {
            let video = videos.detail(&id).await?;
            println!("{}", serde_json::to_string_pretty(&video)?);
        }

        Command::Status { id } => {
            let snapshot = videos.status(&id).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }

        Command::Watch { id, interval_ms } => {
            let mut poller_config = config.poller_config();
            if let Some(ms) = interval_ms {
                poller_config.interval = Duration::from_millis(ms);
            }
            let poller = StatusPoller::new(Arc::new(videos.clone()), poller_config);
            let handle = poller.start(&id)?;
            let mut events = handle.events();

            let printer = tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    match event {
                        PollEvent::Snapshot(s) => println!(
                            "{}  {:>5.1}%  {}",
                            s.status,
                            s.progress.unwrap_or(0.0),
                            s.current_task.as_deref().unwrap_or("")
                        ),
                        PollEvent::TickFailed { consecutive, error } => {
                            eprintln!("poll failed ({consecutive} in a row): {error}")
                        }
                        PollEvent::StateChanged(state) if state.is_terminal() => break,
                        PollEvent::StateChanged(_) => {}
                    }
                }
            });

            let outcome = tokio::select! {
                outcome = handle.wait() => outcome,
                _ = tokio::signal::ctrl_c() => PollOutcome::Cancelled,
            };
            let _ = printer.await;
            match outcome {
                PollOutcome::Ready(s) => {
                    let renditions: Vec<String> =
                        s.completed_resolutions.iter().map(|r| r.to_string()).collect();
                    println!("ready: {}", renditions.join(", "));
                }
                PollOutcome::Failed { error, .. } => {
                    return Err(error.user_message().into());
                }
                PollOutcome::Cancelled => println!("cancelled"),
            }
        }

        Command::Playlist { id, resolution } => {
            let playlist = videos.playlist(&id, resolution).await?;
            print!("{playlist}");
        }

        Command::Upload {
            file,
            title,
            description,
            tag,
        } => {
            if !config.features.upload_enabled {
                return Err("uploads are disabled in the configuration".into());
            }
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or("file path has no usable file name")?
                .to_string();
            let data = tokio::fs::read(&file).await?;

            let mut request = UploadRequest::new(file_name, data, title);
            if let Some(description) = description {
                request = request.description(description);
            }
            for tag in tag {
                request = request.tag(tag);
            }

            let tracker = UploadTracker::new(videos.pipeline().clone(), config.upload_limits());
            let handle = tracker.start(request)?;
            let id = handle.id().to_string();
            let mut updates = tracker.updates();
            let progress = tokio::spawn(async move {
                while let Some(records) = updates.next().await {
                    let Some(record) = records.iter().find(|r| r.id == id) else {
                        continue;
                    };
                    eprint!("\r{:?} {:>3}%", record.status, record.progress_percent);
                    if record.status.is_terminal() {
                        eprintln!();
                        break;
                    }
                }
            });

            let result = handle.wait().await;
            progress.abort();
            let video = result?;
            println!("uploaded: {} ({})", video.id, video.status);
        }
    }

    Ok(())
}
