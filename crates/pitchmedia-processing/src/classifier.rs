//! Format classification.
//!
//! Decides from container/MIME hints whether an input is already playable
//! downstream or needs transcoding. The decision rule is a small fixed set of
//! compatible containers; the policy is deliberately conservative. The goal
//! is to avoid unnecessary transcoding, not perfect codec detection, and a
//! classification failure must never block an upload.

use pitchmedia_core::MediaFormatDescriptor;

/// Container/MIME substrings the downstream player accepts as-is.
const COMPATIBLE_CONTAINERS: &[&str] = &["mp4", "webm", "quicktime", "m4v"];

#[derive(Debug, Default, Clone)]
pub struct FormatClassifier;

impl FormatClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify an input file. Never fails: internal classification errors
    /// map to the permissive default so the user can still attempt an upload.
    pub fn classify(&self, file_name: &str, content_type: &str) -> MediaFormatDescriptor {
        match Self::inspect(file_name, content_type) {
            Ok(descriptor) => descriptor,
            Err(reason) => {
                tracing::debug!(
                    file = %file_name,
                    content_type = %content_type,
                    %reason,
                    "format classification inconclusive, assuming compatible"
                );
                MediaFormatDescriptor::permissive()
            }
        }
    }

    /// Whether the pipeline must run the transcoding stage for this input.
    pub fn needs_conversion(&self, descriptor: &MediaFormatDescriptor) -> bool {
        !descriptor.is_compatible
    }

    fn inspect(file_name: &str, content_type: &str) -> Result<MediaFormatDescriptor, String> {
        let container = Self::container_hint(file_name, content_type)
            .ok_or_else(|| "no container hint in content type or file name".to_string())?;

        let is_compatible = COMPATIBLE_CONTAINERS
            .iter()
            .any(|c| container.contains(c));

        let (video_codec, audio_codec) = Self::codec_guess(&container);

        Ok(MediaFormatDescriptor {
            container,
            video_codec: video_codec.to_string(),
            audio_codec: audio_codec.to_string(),
            is_compatible,
        })
    }

    /// Container from the MIME subtype when present, falling back to the
    /// file extension.
    fn container_hint(file_name: &str, content_type: &str) -> Option<String> {
        let mime = content_type.trim().to_ascii_lowercase();
        if let Some(subtype) = mime.strip_prefix("video/") {
            let subtype = subtype.split(';').next().unwrap_or(subtype).trim();
            if !subtype.is_empty() {
                return Some(subtype.trim_start_matches("x-").to_string());
            }
        }

        let extension = file_name.rsplit('.').next()?.trim().to_ascii_lowercase();
        if extension.is_empty() || extension == file_name.to_ascii_lowercase() {
            return None;
        }
        Some(match extension.as_str() {
            "mov" => "quicktime".to_string(),
            other => other.to_string(),
        })
    }

    /// Best-guess codec pair by container. Not authoritative; downstream only
    /// keys off `is_compatible`.
    fn codec_guess(container: &str) -> (&'static str, &'static str) {
        if container.contains("webm") {
            ("vp9", "opus")
        } else if container.contains("mkv") || container.contains("matroska") {
            ("h264", "ac3")
        } else {
            ("h264", "aac")
        }
    }
}
