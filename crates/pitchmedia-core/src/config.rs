//! Configuration module
//!
//! Env-driven configuration for the ingestion pipeline: trust-boundary API
//! location, transcoder source list, transcode targets, validation-gate
//! limits, and retry/thumbnail settings.

use std::env;
use std::path::PathBuf;

// Defaults
const MAX_FILE_SIZE_BYTES: u64 = 100 * 1024 * 1024;
const MIN_DURATION_SECS: f64 = 5.0;
const MAX_DURATION_SECS: f64 = 120.0;
const TARGET_WIDTH: u32 = 720;
const TARGET_HEIGHT: u32 = 1280;
const VIDEO_BITRATE_KBPS: u32 = 2500;
const AUDIO_BITRATE_KBPS: u32 = 128;
const UPLOAD_MAX_RETRIES: u32 = 2;
const ENGINE_FETCH_TIMEOUT_SECS: u64 = 30;
const THUMBNAIL_OFFSET_SECS: f64 = 1.0;
const THUMBNAIL_JPEG_QUALITY: u8 = 80;

/// One place the transcoder's runtime can be provisioned from. Sources are
/// tried in order; the first success wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineSource {
    /// Fetch the engine binary over HTTP from a mirror.
    Remote(String),
    /// Use an already-installed binary on the local filesystem.
    Local(PathBuf),
}

impl EngineSource {
    /// Short description used in logs when a source fails.
    pub fn describe(&self) -> String {
        match self {
            EngineSource::Remote(url) => format!("remote:{}", url),
            EngineSource::Local(path) => format!("local:{}", path.display()),
        }
    }
}

/// Configuration for one ingestion pipeline instance.
#[derive(Clone, Debug)]
pub struct IngestConfig {
    /// Base URL of the trust boundary (upload-url issuing + metadata persist).
    pub api_base_url: String,
    /// Bearer token for the trust boundary. Absence is a precondition
    /// failure at call time, not a config-load failure.
    pub auth_token: Option<String>,
    /// Prioritized transcoder sources (mirrors first, local fallback last).
    pub engine_sources: Vec<EngineSource>,
    /// Per-source timeout for remote engine fetches.
    pub engine_fetch_timeout_secs: u64,
    // Validation gate
    pub max_file_size_bytes: u64,
    pub min_duration_secs: f64,
    pub max_duration_secs: f64,
    // Transcode targets
    pub target_width: u32,
    pub target_height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    // Upload retry
    pub upload_max_retries: u32,
    // Thumbnail
    pub thumbnail_offset_secs: f64,
    pub thumbnail_jpeg_quality: u8,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            auth_token: None,
            engine_sources: default_engine_sources(),
            engine_fetch_timeout_secs: ENGINE_FETCH_TIMEOUT_SECS,
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            min_duration_secs: MIN_DURATION_SECS,
            max_duration_secs: MAX_DURATION_SECS,
            target_width: TARGET_WIDTH,
            target_height: TARGET_HEIGHT,
            video_bitrate_kbps: VIDEO_BITRATE_KBPS,
            audio_bitrate_kbps: AUDIO_BITRATE_KBPS,
            upload_max_retries: UPLOAD_MAX_RETRIES,
            thumbnail_offset_secs: THUMBNAIL_OFFSET_SECS,
            thumbnail_jpeg_quality: THUMBNAIL_JPEG_QUALITY,
        }
    }
}

fn default_engine_sources() -> Vec<EngineSource> {
    vec![
        EngineSource::Remote("https://cdn.pitchsultan.com/engine/ffmpeg".to_string()),
        EngineSource::Remote("https://cdn-fallback.pitchsultan.com/engine/ffmpeg".to_string()),
        EngineSource::Local(PathBuf::from("/usr/bin/ffmpeg")),
    ]
}

impl IngestConfig {
    /// Load configuration from environment variables, falling back to the
    /// documented defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let engine_sources = env::var("PITCHMEDIA_ENGINE_SOURCES")
            .ok()
            .map(|raw| parse_engine_sources(&raw))
            .filter(|sources| !sources.is_empty())
            .unwrap_or(defaults.engine_sources);

        Self {
            api_base_url: env::var("PITCHMEDIA_API_URL")
                .or_else(|_| env::var("API_URL"))
                .unwrap_or(defaults.api_base_url),
            auth_token: env::var("PITCHMEDIA_API_TOKEN")
                .or_else(|_| env::var("JWT_TOKEN"))
                .ok(),
            engine_sources,
            engine_fetch_timeout_secs: parse_env(
                "PITCHMEDIA_ENGINE_FETCH_TIMEOUT_SECS",
                defaults.engine_fetch_timeout_secs,
            ),
            max_file_size_bytes: parse_env(
                "PITCHMEDIA_MAX_FILE_SIZE_BYTES",
                defaults.max_file_size_bytes,
            ),
            min_duration_secs: parse_env("PITCHMEDIA_MIN_DURATION_SECS", defaults.min_duration_secs),
            max_duration_secs: parse_env("PITCHMEDIA_MAX_DURATION_SECS", defaults.max_duration_secs),
            target_width: parse_env("PITCHMEDIA_TARGET_WIDTH", defaults.target_width),
            target_height: parse_env("PITCHMEDIA_TARGET_HEIGHT", defaults.target_height),
            video_bitrate_kbps: parse_env(
                "PITCHMEDIA_VIDEO_BITRATE_KBPS",
                defaults.video_bitrate_kbps,
            ),
            audio_bitrate_kbps: parse_env(
                "PITCHMEDIA_AUDIO_BITRATE_KBPS",
                defaults.audio_bitrate_kbps,
            ),
            upload_max_retries: parse_env(
                "PITCHMEDIA_UPLOAD_MAX_RETRIES",
                defaults.upload_max_retries,
            ),
            thumbnail_offset_secs: parse_env(
                "PITCHMEDIA_THUMBNAIL_OFFSET_SECS",
                defaults.thumbnail_offset_secs,
            ),
            thumbnail_jpeg_quality: parse_env(
                "PITCHMEDIA_THUMBNAIL_JPEG_QUALITY",
                defaults.thumbnail_jpeg_quality,
            ),
        }
    }
}

/// Parse a comma-separated source list. Entries starting with http(s) are
/// remote mirrors; anything else is a local path.
fn parse_engine_sources(raw: &str) -> Vec<EngineSource> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.starts_with("http://") || s.starts_with("https://") {
                EngineSource::Remote(s.to_string())
            } else {
                EngineSource::Local(PathBuf::from(s))
            }
        })
        .collect()
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
