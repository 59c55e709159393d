//! Incident clipping binary.
//!
//! Paths and the detector come from the environment:
//! `KCLIP_SOURCE_VIDEO`, `KCLIP_OUTPUT`, `KCLIP_WORK_DIR`, and either
//! `KCLIP_DETECTOR` (with optional `KCLIP_DETECTOR_ARGS`) or
//! `KCLIP_DETECTION_LOG` for a log captured earlier.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kclip_media::FfmpegRunner;
use kclip_pipeline::{
    CommandDetector, Detector, ExistingLogDetector, Pipeline, PipelineConfig, PipelineOutcome,
    PipelinePaths, PipelineProgress,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting kclip");

    if let Err(e) = run().await {
        error!("kclip failed: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kclip=info,kclip_pipeline=info,kclip_media=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn env_path(key: &str) -> anyhow::Result<PathBuf> {
    std::env::var(key)
        .map(PathBuf::from)
        .with_context(|| format!("{} is not set", key))
}

async fn run() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env().context("invalid configuration")?;
    info!("Pipeline config: {:?}", config);

    let source = env_path("KCLIP_SOURCE_VIDEO")?;
    let output = env_path("KCLIP_OUTPUT")?;
    let work_dir = std::env::var("KCLIP_WORK_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("kclip"));
    let paths = PipelinePaths::new(source, work_dir, output);

    let detector: Arc<dyn Detector> = match (
        std::env::var("KCLIP_DETECTOR").ok(),
        std::env::var("KCLIP_DETECTION_LOG").ok(),
    ) {
        (Some(program), _) => {
            let args = std::env::var("KCLIP_DETECTOR_ARGS").unwrap_or_default();
            let runner = FfmpegRunner::new()
                .with_binary(&config.ffmpeg_binary)
                .with_timeout(config.tool_timeout);
            Arc::new(
                CommandDetector::new(program, config.detection_fps)
                    .with_args(args.split_whitespace())
                    .with_frame_rate_reduction(runner, &paths.reduced_video)
                    .with_timeout(config.tool_timeout),
            )
        }
        (None, Some(log)) => Arc::new(ExistingLogDetector::from_file(log)),
        (None, None) => bail!("set KCLIP_DETECTOR or KCLIP_DETECTION_LOG"),
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<PipelineProgress>();
    let progress = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            info!(stage = %update.stage, "{:>5.1}% {}", update.percent, update.message);
        }
    });

    let pipeline = Pipeline::new(config, detector).with_progress(tx);
    let outcome = pipeline.run(&paths).await;
    drop(pipeline);
    progress.await.ok();

    match outcome? {
        PipelineOutcome::Completed { output, clips, incidents } => info!(
            "Joined {} clips from {} incidents into {}",
            clips.len(),
            incidents.len(),
            output.display()
        ),
        PipelineOutcome::NothingToExtract => info!("No incidents found; nothing to extract"),
    }

    Ok(())
}
