//! Pitchmedia CLI: drives one pitch-video ingestion from the command line.
//!
//! Set PITCHMEDIA_API_URL and PITCHMEDIA_API_TOKEN (or put them in a .env
//! file). Engine sources come from PITCHMEDIA_ENGINE_SOURCES.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use pitchmedia_cli::{content_type_for, init_tracing};
use pitchmedia_core::{IngestConfig, VideoAttributes, VideoSubmission};
use pitchmedia_pipeline::{PipelineCoordinator, PipelineProgressFn};
use pitchmedia_processing::{FfmpegLoader, TranscodeEngine};

#[derive(Parser)]
#[command(name = "pitchmedia", about = "Pitch-video ingestion CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a pitch video: classify, convert if needed, upload, persist.
    Ingest {
        /// Path to the video file
        file: PathBuf,
        /// Submitting user id
        #[arg(long)]
        user: String,
        /// Video title
        #[arg(long)]
        title: String,
        /// Video description
        #[arg(long, default_value = "")]
        description: String,
        /// Tags (repeatable)
        #[arg(long)]
        tag: Vec<String>,
    },
    /// Probe a video file and print its stream attributes.
    Probe {
        /// Path to the video file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = IngestConfig::from_env();

    match cli.command {
        Commands::Ingest {
            file,
            user,
            title,
            description,
            tag,
        } => ingest(&config, file, user, title, description, tag).await,
        Commands::Probe { file } => probe(&config, file).await,
    }
}

async fn ingest(
    config: &IngestConfig,
    file: PathBuf,
    user: String,
    title: String,
    description: String,
    tags: Vec<String>,
) -> anyhow::Result<()> {
    let coordinator =
        PipelineCoordinator::from_config(config).map_err(|e| anyhow!(e.to_string()))?;

    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("file path has no usable file name")?
        .to_string();
    let data = Bytes::from(
        tokio::fs::read(&file)
            .await
            .with_context(|| format!("reading {}", file.display()))?,
    );

    let probe = coordinator
        .engine()
        .probe(data.clone())
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    let attrs = VideoAttributes {
        file_size: data.len() as u64,
        duration_secs: probe.duration_secs,
        width: probe.width,
        height: probe.height,
    };

    let submission = VideoSubmission {
        sec_user_id: user,
        title,
        description,
        content_type: content_type_for(&file_name).to_string(),
        file_name,
        tags,
    };

    let on_progress: PipelineProgressFn = Arc::new(|update| {
        eprint!("\r[{:>3}%] {:<40}", update.percent, update.message);
        let _ = std::io::stderr().flush();
    });

    let cancel = CancellationToken::new();
    let abort = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.cancel();
        }
    });

    let result = coordinator
        .ingest(submission, attrs, data, on_progress, cancel)
        .await;
    eprintln!();
    coordinator.engine().cleanup();

    match result {
        Ok(record) => {
            println!("{}", record.url);
            if let Some(thumbnail) = record.thumbnail_url {
                println!("{thumbnail}");
            }
            Ok(())
        }
        Err(e) => {
            tracing::debug!(error = %e, "ingestion failed");
            Err(anyhow!(e.user_message()))
        }
    }
}

async fn probe(config: &IngestConfig, file: PathBuf) -> anyhow::Result<()> {
    // Probing needs no trust-boundary credentials, only the engine.
    let loader = Arc::new(FfmpegLoader::new(std::time::Duration::from_secs(
        config.engine_fetch_timeout_secs,
    )));
    let engine = TranscodeEngine::new(loader, config.engine_sources.clone());
    let data = Bytes::from(
        tokio::fs::read(&file)
            .await
            .with_context(|| format!("reading {}", file.display()))?,
    );
    let info = engine.probe(data).await.map_err(|e| anyhow!(e.to_string()))?;
    engine.cleanup();

    println!(
        "duration: {:.2}s  resolution: {}x{}",
        info.duration_secs, info.width, info.height
    );
    Ok(())
}
