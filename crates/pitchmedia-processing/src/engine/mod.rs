//! On-demand transcoding engine.
//!
//! The engine runtime is provisioned lazily from a prioritized source list
//! (remote mirrors, then a local fallback) and held as a process-wide
//! instance behind [`TranscodeEngine`]. Loading and execution are abstracted
//! behind [`EngineLoader`] and [`Transcoder`] so the state machine can be
//! exercised without a real binary.

mod adapter;
mod ffmpeg;

pub use adapter::TranscodeEngine;
pub use ffmpeg::{FfmpegLoader, FfmpegTranscoder};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use pitchmedia_core::{ConversionProgress, EngineSource, IngestConfig, MediaProbe};

/// Normalized output container extension.
pub const NORMALIZED_EXTENSION: &str = "mp4";
/// Content type of normalized output.
pub const NORMALIZED_CONTENT_TYPE: &str = "video/mp4";

/// Engine-internal progress signal, 0.0-1.0.
pub type EngineProgressFn = Arc<dyn Fn(f32) + Send + Sync>;

/// UI-facing conversion progress callback.
pub type ConversionProgressFn = Arc<dyn Fn(ConversionProgress) + Send + Sync>;

/// Errors raised by the engine. Public operations normalize everything into
/// `Unavailable` or `ConversionFailed`; the finer-grained variants stay
/// internal to loading/execution and are logged, never surfaced.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("video transcoder could not be loaded; check your connection and retry")]
    Unavailable,

    #[error("video conversion failed; try uploading an already-compatible video")]
    ConversionFailed,

    #[error("transcoder initialization was interrupted")]
    Interrupted,

    #[error("engine source failed ({origin}): {reason}")]
    Source { origin: String, reason: String },

    #[error("engine execution failed: {0}")]
    Execution(String),

    #[error("stream analysis failed: {0}")]
    Probe(String),
}

/// Fixed transcode targets: bounded portrait resolution, bounded bitrates,
/// single container/codec pair, progressive-playback flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscodeSpec {
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

impl Default for TranscodeSpec {
    fn default() -> Self {
        Self {
            width: 720,
            height: 1280,
            video_bitrate_kbps: 2500,
            audio_bitrate_kbps: 128,
        }
    }
}

impl TranscodeSpec {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            width: config.target_width,
            height: config.target_height,
            video_bitrate_kbps: config.video_bitrate_kbps,
            audio_bitrate_kbps: config.audio_bitrate_kbps,
        }
    }
}

/// Provisions a [`Transcoder`] from one engine source.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self, source: &EngineSource) -> Result<Arc<dyn Transcoder>, EngineError>;
}

/// A provisioned engine instance. Implementations own their runtime assets
/// and release them on drop.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcode `input` to the normalized format, emitting 0.0-1.0 progress.
    async fn transcode(
        &self,
        input: Bytes,
        input_name: &str,
        spec: &TranscodeSpec,
        on_progress: EngineProgressFn,
    ) -> Result<Bytes, EngineError>;

    /// Decode one frame at `offset_secs` and return it as an encoded image.
    async fn extract_frame(&self, input: Bytes, offset_secs: f64) -> Result<Bytes, EngineError>;

    /// Parse stream information (duration, dimensions) from the input.
    async fn probe(&self, input: Bytes) -> Result<MediaProbe, EngineError>;
}
