//! Poster thumbnail extraction.
//!
//! Decodes one frame at a fixed offset (past the usual black/blank opening
//! frame) and rasterizes it to a JPEG at a fixed quality. Failures here are
//! non-fatal to the pipeline: the coordinator logs and continues without a
//! thumbnail.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;

use crate::engine::{EngineError, TranscodeEngine};

pub struct ThumbnailExtractor {
    engine: Arc<TranscodeEngine>,
    offset_secs: f64,
    jpeg_quality: u8,
}

impl ThumbnailExtractor {
    pub fn new(engine: Arc<TranscodeEngine>, offset_secs: f64, jpeg_quality: u8) -> Self {
        Self {
            engine,
            offset_secs,
            jpeg_quality,
        }
    }

    /// Extract a poster frame from `video` and return it as JPEG bytes.
    ///
    /// Scratch resources are owned by the engine call and released on every
    /// path; nothing is retained across calls.
    pub async fn extract(&self, video: Bytes) -> Result<Bytes, EngineError> {
        let frame = self.engine.extract_frame(video, self.offset_secs).await?;
        encode_jpeg(&frame, self.jpeg_quality)
    }
}

/// Re-encode a decoded frame as JPEG at the fixed quality setting.
fn encode_jpeg(frame: &[u8], quality: u8) -> Result<Bytes, EngineError> {
    let image = image::load_from_memory(frame)
        .map_err(|e| EngineError::Execution(format!("decoding frame: {e}")))?;
    let rgb = image.to_rgb8();

    let mut out = Cursor::new(Vec::new());
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    encoder
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| EngineError::Execution(format!("encoding thumbnail: {e}")))?;

    Ok(Bytes::from(out.into_inner()))
}
