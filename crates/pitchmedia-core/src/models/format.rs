use serde::{Deserialize, Serialize};

/// Result of classifying one input file. Derived per input, never persisted.
///
/// `is_compatible` is conservative-true: an inconclusive classification must
/// never block an upload, so classification failures map to a permissive
/// default rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormatDescriptor {
    pub container: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub is_compatible: bool,
}

impl MediaFormatDescriptor {
    /// Permissive default used when classification is inconclusive.
    pub fn permissive() -> Self {
        Self {
            container: "mp4".to_string(),
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
            is_compatible: true,
        }
    }
}
