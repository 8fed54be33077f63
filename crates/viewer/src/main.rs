use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ppe_core::types::{validate_video_id, FrameNumber};
use ppe_viewer::client::ViewerApi;
use ppe_viewer::config::ViewerConfig;
use ppe_viewer::loader::{FrameImage, FrameLoader, HttpFrameSource, SourceMode};
use ppe_viewer::overlay::OverlayState;
use ppe_viewer::playback::{FrameRenderer, PlaybackDriver, PlaybackSettings};
use ppe_viewer::poller::{monitor, MonitorOptions, MonitorOutcome, StatusUpdate};

#[derive(Debug, Parser)]
#[command(name = "ppe-viewer", version, about = "PPE annotation viewer client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start frame extraction for a video and follow its progress.
    Extract {
        /// Video identifier (file name stem).
        video_id: String,
        /// Only follow an extraction that is already running.
        #[arg(long)]
        no_start: bool,
    },
    /// Print video metadata and the extracted frame count.
    Info { video_id: String },
    /// Print the compliance summary for one frame.
    Annotations {
        video_id: String,
        #[arg(long, default_value_t = 1)]
        frame: FrameNumber,
    },
    /// Play frames headlessly, logging each rendered frame.
    Play {
        video_id: String,
        /// First frame to play.
        #[arg(long, default_value_t = 1)]
        from: FrameNumber,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ppe_viewer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ViewerConfig::from_env();
    tracing::debug!(base_url = %config.base_url, "Loaded viewer configuration");

    let api = match ViewerApi::new(&config.base_url) {
        Ok(api) => api,
        Err(e) => {
            tracing::error!(error = %e, "Invalid API base URL");
            return ExitCode::FAILURE;
        }
    };

    let video_id = match &cli.command {
        Commands::Extract { video_id, .. }
        | Commands::Info { video_id }
        | Commands::Annotations { video_id, .. }
        | Commands::Play { video_id, .. } => video_id.clone(),
    };
    if let Err(e) = validate_video_id(&video_id) {
        tracing::error!(error = %e, "Invalid video id");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Commands::Extract { no_start, .. } => run_extract(&api, &video_id, no_start).await,
        Commands::Info { .. } => run_info(&api, &video_id).await,
        Commands::Annotations { frame, .. } => run_annotations(&api, &video_id, frame).await,
        Commands::Play { from, .. } => run_play(api, &config, &video_id, from).await,
    }
}

async fn run_extract(api: &ViewerApi, video_id: &str, no_start: bool) -> ExitCode {
    if !no_start {
        match api.start_extraction(video_id).await {
            Ok(resp) => tracing::info!(video_id, status = %resp.status, "Extraction requested"),
            Err(e) => {
                tracing::error!(video_id, error = %e, "Failed to start extraction");
                return ExitCode::FAILURE;
            }
        }
    }

    let mut sink = |update: &StatusUpdate| {
        tracing::info!(
            percent = %format!("{:.1}", update.percent),
            details = %update.details,
            "{}",
            update.status_text
        );
    };
    match monitor(api, video_id, &MonitorOptions::default(), &mut sink).await {
        MonitorOutcome::Completed(_) => ExitCode::SUCCESS,
        MonitorOutcome::Failed(record) => {
            if !record.raw_output.is_empty() {
                tracing::error!(output = %record.raw_output, "Extractor output");
            }
            ExitCode::FAILURE
        }
        MonitorOutcome::TimedOut => ExitCode::from(2),
    }
}

async fn run_info(api: &ViewerApi, video_id: &str) -> ExitCode {
    let info = match api.video_info(video_id).await {
        Ok(info) => info,
        Err(e) => {
            tracing::error!(video_id, error = %e, "Failed to load video info");
            return ExitCode::FAILURE;
        }
    };
    let extracted = match api.list_frames(video_id).await {
        Ok(frames) => frames.map_or(0, |f| f.len()),
        Err(e) => {
            tracing::warn!(video_id, error = %e, "Failed to list extracted frames");
            0
        }
    };
    tracing::info!(
        video_id,
        duration = info.duration,
        fps = info.fps,
        total_frames = info.total_frames,
        width = info.width,
        height = info.height,
        extracted,
        "Video info"
    );
    ExitCode::SUCCESS
}

async fn run_annotations(api: &ViewerApi, video_id: &str, frame: FrameNumber) -> ExitCode {
    let mut overlay = OverlayState::new();
    match api.fetch_annotations(video_id).await {
        Ok(file) => overlay.set_annotations(file),
        Err(e) => {
            tracing::error!(video_id, error = %e, "Failed to load annotations");
            return ExitCode::FAILURE;
        }
    }

    for detection in overlay.detections(frame) {
        tracing::info!(
            frame,
            id = %detection.id,
            classes = ?detection.labels(),
            "Detection"
        );
    }
    let summary = overlay.summary(frame);
    match summary.rate {
        Some(rate) => tracing::info!(
            frame,
            total = summary.total,
            non_compliant = summary.non_compliant,
            "Compliance Rate: {rate:.1}%"
        ),
        None => tracing::info!(frame, "No detections"),
    }
    ExitCode::SUCCESS
}

/// Logs each frame with the compliance summary from the overlay.
struct LogRenderer {
    overlay: Mutex<OverlayState>,
}

impl FrameRenderer for LogRenderer {
    fn render(&self, frame: FrameNumber, image: FrameImage) {
        tracing::info!(frame, width = image.width(), height = image.height(), "Frame");
    }

    fn refresh_details(&self, frame: FrameNumber) {
        let overlay = self
            .overlay
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !overlay.has_annotations() {
            return;
        }
        let summary = overlay.summary(frame);
        if summary.non_compliant > 0 {
            tracing::info!(frame, non_compliant = summary.non_compliant, "Non-compliance detected");
        }
    }
}

async fn run_play(api: ViewerApi, config: &ViewerConfig, video_id: &str, from: FrameNumber) -> ExitCode {
    let info = match api.video_info(video_id).await {
        Ok(info) => info,
        Err(e) => {
            tracing::error!(video_id, error = %e, "Failed to load video info");
            return ExitCode::FAILURE;
        }
    };

    let mut overlay = OverlayState::new();
    match api.fetch_annotations(video_id).await {
        Ok(file) => overlay.set_annotations(file),
        Err(e) if e.is_not_found() => tracing::info!(video_id, "No annotations for video"),
        Err(e) => tracing::warn!(video_id, error = %e, "Failed to load annotations"),
    }

    let source = HttpFrameSource::for_video(api, video_id).await;
    let total = match source.mode() {
        SourceMode::Sequence(frames) => u32::try_from(frames.len()).unwrap_or(u32::MAX),
        SourceMode::OnDemand => info.total_frames,
    };
    if total == 0 {
        tracing::error!(video_id, "Video has no frames");
        return ExitCode::FAILURE;
    }

    let loader = FrameLoader::new(source, config.max_cache_size, config.preload_buffer, total);
    let renderer = LogRenderer {
        overlay: Mutex::new(overlay),
    };
    let driver = PlaybackDriver::new(loader, renderer, info.fps, PlaybackSettings::from_config(config));

    driver.set_current_frame(from);
    driver.start();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                driver.stop();
                tracing::info!(frame = driver.current_frame(), "Playback interrupted");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                if !driver.is_playing() {
                    tracing::info!(frame = driver.current_frame(), "Playback finished");
                    break;
                }
            }
        }
    }
    ExitCode::SUCCESS
}
