//! FFmpeg-backed engine runtime.
//!
//! [`FfmpegLoader`] provisions an ffmpeg binary either by fetching it from a
//! remote mirror into a scratch directory or by pointing at a local install.
//! [`FfmpegTranscoder`] executes the fixed transcode command, parses the
//! `-progress` stream for the 0.0-1.0 signal, and parses stream info for
//! probing. All scratch files live in `TempDir`s, so cleanup is guaranteed on
//! every exit path, including errors and cancellation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use pitchmedia_core::{EngineSource, MediaProbe};

use super::{EngineError, EngineLoader, EngineProgressFn, TranscodeSpec, Transcoder};

/// Provisions ffmpeg from an [`EngineSource`].
pub struct FfmpegLoader {
    http: reqwest::Client,
    fetch_timeout: Duration,
}

impl FfmpegLoader {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            fetch_timeout,
        }
    }
}

#[async_trait]
impl EngineLoader for FfmpegLoader {
    async fn load(&self, source: &EngineSource) -> Result<Arc<dyn Transcoder>, EngineError> {
        match source {
            EngineSource::Remote(url) => {
                let response = self
                    .http
                    .get(url)
                    .timeout(self.fetch_timeout)
                    .send()
                    .await
                    .map_err(|e| source_error(source, format!("fetch failed: {e}")))?;

                if !response.status().is_success() {
                    return Err(source_error(
                        source,
                        format!("fetch returned status {}", response.status()),
                    ));
                }

                let binary = response
                    .bytes()
                    .await
                    .map_err(|e| source_error(source, format!("fetch body failed: {e}")))?;

                let install_dir = TempDir::new()
                    .map_err(|e| source_error(source, format!("scratch dir failed: {e}")))?;
                let binary_path = install_dir.path().join("ffmpeg");
                tokio::fs::write(&binary_path, &binary)
                    .await
                    .map_err(|e| source_error(source, format!("install failed: {e}")))?;
                make_executable(&binary_path)
                    .await
                    .map_err(|e| source_error(source, format!("chmod failed: {e}")))?;

                tracing::info!(source = %source.describe(), bytes = binary.len(), "engine runtime installed");
                Ok(Arc::new(FfmpegTranscoder {
                    binary: binary_path,
                    _install_dir: Some(install_dir),
                }))
            }
            EngineSource::Local(path) => {
                let meta = tokio::fs::metadata(path)
                    .await
                    .map_err(|e| source_error(source, format!("not found: {e}")))?;
                if !meta.is_file() {
                    return Err(source_error(source, "not a regular file".to_string()));
                }
                tracing::info!(source = %source.describe(), "using local engine runtime");
                Ok(Arc::new(FfmpegTranscoder {
                    binary: path.clone(),
                    _install_dir: None,
                }))
            }
        }
    }
}

fn source_error(source: &EngineSource, reason: String) -> EngineError {
    EngineError::Source {
        origin: source.describe(),
        reason,
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o755);
    tokio::fs::set_permissions(path, perms).await
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// A provisioned ffmpeg instance. Dropping it removes the installed binary
/// when it was fetched remotely.
pub struct FfmpegTranscoder {
    binary: PathBuf,
    _install_dir: Option<TempDir>,
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: Bytes,
        input_name: &str,
        spec: &TranscodeSpec,
        on_progress: EngineProgressFn,
    ) -> Result<Bytes, EngineError> {
        let scratch = scratch_dir()?;
        let input_path = scratch.path().join(scratch_input_name(input_name));
        let output_path = scratch.path().join("output.mp4");

        tokio::fs::write(&input_path, &input)
            .await
            .map_err(|e| EngineError::Execution(format!("writing input: {e}")))?;

        // Duration is needed to turn ffmpeg's out_time into a 0.0-1.0 ratio.
        let duration_secs = match self.probe_path(&input_path).await {
            Ok(probe) => probe.duration_secs,
            Err(e) => {
                tracing::warn!(error = %e, "could not probe duration; progress ratio degraded");
                0.0
            }
        };

        let scale = format!(
            "scale=w={}:h={}:force_original_aspect_ratio=decrease",
            spec.width, spec.height
        );
        let mut command = Command::new(&self.binary);
        command
            .arg("-hide_banner")
            .arg("-y")
            .args(["-i", &input_path.to_string_lossy()])
            .args(["-vf", &scale])
            .args(["-c:v", "libx264"])
            .args(["-b:v", &format!("{}k", spec.video_bitrate_kbps)])
            .args(["-c:a", "aac"])
            .args(["-b:a", &format!("{}k", spec.audio_bitrate_kbps)])
            .args(["-movflags", "+faststart"])
            .args(["-progress", "pipe:1"])
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| EngineError::Execution(format!("spawning engine: {e}")))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let progress_reader = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(micros) = parse_out_time_micros(&line) {
                        let ratio = if duration_secs > 0.0 {
                            ((micros as f64 / 1_000_000.0) / duration_secs).clamp(0.0, 1.0)
                        } else {
                            0.0
                        };
                        on_progress(ratio as f32);
                    }
                }
            }
        };
        let stderr_reader = async {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        };

        let (status, (), stderr_text) =
            tokio::join!(wait_child(&mut child), progress_reader, stderr_reader);
        let status = status?;

        if !status.success() {
            return Err(EngineError::Execution(format!(
                "engine exited with {}: {}",
                status,
                tail(&stderr_text, 2048)
            )));
        }

        let output = tokio::fs::read(&output_path)
            .await
            .map_err(|e| EngineError::Execution(format!("reading output: {e}")))?;

        on_progress(1.0);
        Ok(Bytes::from(output))
    }

    async fn extract_frame(&self, input: Bytes, offset_secs: f64) -> Result<Bytes, EngineError> {
        let scratch = scratch_dir()?;
        let input_path = scratch.path().join("input.bin");
        let frame_path = scratch.path().join("frame.png");

        tokio::fs::write(&input_path, &input)
            .await
            .map_err(|e| EngineError::Execution(format!("writing input: {e}")))?;

        let output = Command::new(&self.binary)
            .arg("-hide_banner")
            .arg("-y")
            .args(["-ss", &format!("{offset_secs:.3}")])
            .args(["-i", &input_path.to_string_lossy()])
            .args(["-frames:v", "1"])
            .arg(&frame_path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EngineError::Execution(format!("spawning engine: {e}")))?;

        if !output.status.success() {
            return Err(EngineError::Execution(format!(
                "frame extraction exited with {}: {}",
                output.status,
                tail(&String::from_utf8_lossy(&output.stderr), 1024)
            )));
        }

        let frame = tokio::fs::read(&frame_path)
            .await
            .map_err(|e| EngineError::Execution(format!("reading frame: {e}")))?;
        Ok(Bytes::from(frame))
    }

    async fn probe(&self, input: Bytes) -> Result<MediaProbe, EngineError> {
        let scratch = scratch_dir()?;
        let input_path = scratch.path().join("input.bin");
        tokio::fs::write(&input_path, &input)
            .await
            .map_err(|e| EngineError::Execution(format!("writing input: {e}")))?;
        self.probe_path(&input_path).await
    }
}

impl FfmpegTranscoder {
    /// `ffmpeg -i <file>` with no output exits non-zero but prints the stream
    /// info we need on stderr.
    async fn probe_path(&self, path: &Path) -> Result<MediaProbe, EngineError> {
        let output = Command::new(&self.binary)
            .arg("-hide_banner")
            .args(["-i", &path.to_string_lossy()])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EngineError::Probe(format!("spawning engine: {e}")))?;

        let stderr_text = String::from_utf8_lossy(&output.stderr);
        parse_stream_info(&stderr_text).map_err(EngineError::Probe)
    }
}

fn scratch_dir() -> Result<TempDir, EngineError> {
    TempDir::new().map_err(|e| EngineError::Execution(format!("scratch dir failed: {e}")))
}

/// Scratch filename preserving the input's extension so the demuxer can use
/// it as a container hint.
fn scratch_input_name(input_name: &str) -> String {
    let extension = input_name
        .rsplit_once('.')
        .map(|(_, e)| e)
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");
    format!("input.{}", extension.to_ascii_lowercase())
}

async fn wait_child(child: &mut tokio::process::Child) -> Result<std::process::ExitStatus, EngineError> {
    child
        .wait()
        .await
        .map_err(|e| EngineError::Execution(format!("waiting for engine: {e}")))
}

/// Last `max` bytes of `text`, advanced to a char boundary so stderr with
/// multibyte metadata cannot panic the error path.
fn tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut cut = text.len() - max;
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    text[cut..].to_string()
}

/// Parse one `-progress pipe:1` key/value line into elapsed microseconds.
/// ffmpeg emits `out_time_us` (and the historically misnamed `out_time_ms`,
/// also microseconds).
fn parse_out_time_micros(line: &str) -> Option<u64> {
    let value = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))?;
    value.trim().parse().ok()
}

static DURATION_RE: OnceLock<Regex> = OnceLock::new();
static DIMENSIONS_RE: OnceLock<Regex> = OnceLock::new();

/// Parse duration and dimensions from ffmpeg's stream-info banner.
fn parse_stream_info(stderr_text: &str) -> Result<MediaProbe, String> {
    let duration_re = DURATION_RE.get_or_init(|| {
        Regex::new(r"Duration: (\d{2,}):(\d{2}):(\d{2})\.(\d{2})").expect("static regex")
    });
    let dimensions_re = DIMENSIONS_RE
        .get_or_init(|| Regex::new(r"Video:.*?, (\d{2,5})x(\d{2,5})").expect("static regex"));

    let duration = duration_re
        .captures(stderr_text)
        .ok_or_else(|| "no duration in stream info".to_string())?;
    let hours: f64 = duration[1].parse().map_err(|_| "bad duration".to_string())?;
    let minutes: f64 = duration[2].parse().map_err(|_| "bad duration".to_string())?;
    let seconds: f64 = duration[3].parse().map_err(|_| "bad duration".to_string())?;
    let centis: f64 = duration[4].parse().map_err(|_| "bad duration".to_string())?;
    let duration_secs = hours * 3600.0 + minutes * 60.0 + seconds + centis / 100.0;

    let dims = dimensions_re
        .captures(stderr_text)
        .ok_or_else(|| "no video stream dimensions in stream info".to_string())?;
    let width: u32 = dims[1].parse().map_err(|_| "bad width".to_string())?;
    let height: u32 = dims[2].parse().map_err(|_| "bad height".to_string())?;

    Ok(MediaProbe {
        duration_secs,
        width,
        height,
    })
}
