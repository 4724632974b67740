//! Pipeline coordinator.
//!
//! Owns the lifecycle of a single ingestion attempt: validation gate,
//! classification, optional conversion, thumbnail (degraded-mode on
//! failure), video upload, and the metadata commit. Nothing upstream of the
//! commit has durable side effects besides already-transferred objects, so a
//! failed run leaves no partial persisted state and a retry starts clean.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use pitchmedia_client::{
    ApiClient, ByteTransport, ClientError, HttpTransport, RetryPolicy, TransferError,
    TrustBoundary, UploadOrchestrator, UploadProgressFn,
};
use pitchmedia_core::{
    ConversionPhase, ConversionProgress, IngestConfig, VideoAttributes, VideoMetadataRequest,
    VideoRecord, VideoSubmission,
};
use pitchmedia_processing::{
    ConversionProgressFn, EngineError, FfmpegLoader, FormatClassifier, SubmissionValidator,
    ThumbnailExtractor, TranscodeEngine, TranscodeSpec, ValidationError, NORMALIZED_CONTENT_TYPE,
    NORMALIZED_EXTENSION,
};

use crate::progress::{PipelineProgressFn, PipelineStage, ProgressReporter};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error(transparent)]
    Conversion(EngineError),

    #[error("Upload failed: {0}")]
    Upload(TransferError),

    #[error("Thumbnail stage failed: {0}")]
    Thumbnail(String),

    #[error("Metadata persist failed: {0}")]
    Persist(String),

    #[error("Ingestion was cancelled")]
    Cancelled,
}

impl PipelineError {
    /// The only place normalized errors turn into user-facing copy. Internal
    /// diagnostics never reach the UI.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Validation(e) => e.to_string(),
            PipelineError::Precondition(m) => m.clone(),
            PipelineError::Conversion(e) => e.to_string(),
            PipelineError::Upload(TransferError::Unauthorized(_)) => {
                "You are not authorized to upload right now. Please sign in again.".to_string()
            }
            PipelineError::Upload(TransferError::Precondition(m)) => m.clone(),
            PipelineError::Upload(_) => {
                "Upload failed after multiple attempts. Check your connection and retry."
                    .to_string()
            }
            PipelineError::Thumbnail(_) => {
                "Could not create a thumbnail for your video.".to_string()
            }
            PipelineError::Persist(_) => {
                "Your video was uploaded but its details could not be saved. Please retry."
                    .to_string()
            }
            PipelineError::Cancelled => "Upload cancelled.".to_string(),
        }
    }
}

/// Composes the ingestion stages for one submission.
pub struct PipelineCoordinator {
    classifier: FormatClassifier,
    validator: SubmissionValidator,
    engine: Arc<TranscodeEngine>,
    thumbnails: ThumbnailExtractor,
    uploader: UploadOrchestrator,
    boundary: Arc<dyn TrustBoundary>,
    spec: TranscodeSpec,
}

impl PipelineCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: FormatClassifier,
        validator: SubmissionValidator,
        engine: Arc<TranscodeEngine>,
        thumbnails: ThumbnailExtractor,
        uploader: UploadOrchestrator,
        boundary: Arc<dyn TrustBoundary>,
        spec: TranscodeSpec,
    ) -> Self {
        Self {
            classifier,
            validator,
            engine,
            thumbnails,
            uploader,
            boundary,
            spec,
        }
    }

    /// Wire up the production stack from configuration.
    pub fn from_config(config: &IngestConfig) -> Result<Self, ClientError> {
        let loader = Arc::new(FfmpegLoader::new(std::time::Duration::from_secs(
            config.engine_fetch_timeout_secs,
        )));
        let engine = Arc::new(TranscodeEngine::new(loader, config.engine_sources.clone()));
        let thumbnails = ThumbnailExtractor::new(
            engine.clone(),
            config.thumbnail_offset_secs,
            config.thumbnail_jpeg_quality,
        );
        let boundary: Arc<dyn TrustBoundary> = Arc::new(ApiClient::new(
            config.api_base_url.clone(),
            config.auth_token.clone(),
        )?);
        let transport: Arc<dyn ByteTransport> = Arc::new(HttpTransport::new());
        let uploader = UploadOrchestrator::new(
            boundary.clone(),
            transport,
            RetryPolicy::new(config.upload_max_retries),
        );

        Ok(Self::new(
            FormatClassifier::new(),
            SubmissionValidator::from_config(config),
            engine.clone(),
            thumbnails,
            uploader,
            boundary,
            TranscodeSpec::from_config(config),
        ))
    }

    /// Access to the shared engine, e.g. for probing or explicit teardown.
    pub fn engine(&self) -> Arc<TranscodeEngine> {
        self.engine.clone()
    }

    /// Run one ingestion end to end. On success the returned record is the
    /// persisted metadata; on failure nothing has been persisted.
    pub async fn ingest(
        &self,
        submission: VideoSubmission,
        attrs: VideoAttributes,
        data: Bytes,
        on_progress: PipelineProgressFn,
        cancel: CancellationToken,
    ) -> Result<VideoRecord, PipelineError> {
        let reporter = ProgressReporter::new(on_progress, cancel.clone());

        // Validation gate: strict, fails closed.
        self.validator.validate_all(&attrs)?;
        if submission.sec_user_id.trim().is_empty() {
            return Err(PipelineError::Precondition("missing user id".to_string()));
        }

        let descriptor = self
            .classifier
            .classify(&submission.file_name, &submission.content_type);
        tracing::info!(
            file = %submission.file_name,
            container = %descriptor.container,
            compatible = descriptor.is_compatible,
            "submission classified"
        );

        let (video, file_name, content_type) = if self.classifier.needs_conversion(&descriptor) {
            let conversion_progress: ConversionProgressFn = {
                let reporter = reporter.clone();
                Arc::new(move |p: ConversionProgress| {
                    reporter.report(PipelineStage::Converting, conversion_local(&p), &p.message)
                })
            };
            let converted = cancellable(&cancel, async {
                self.engine
                    .convert(
                        data.clone(),
                        &submission.file_name,
                        &self.spec,
                        conversion_progress,
                    )
                    .await
                    .map_err(PipelineError::Conversion)
            })
            .await?;
            (
                converted,
                normalized_file_name(&submission.file_name),
                NORMALIZED_CONTENT_TYPE.to_string(),
            )
        } else {
            reporter.report(PipelineStage::Converting, 100, "Video already compatible");
            (
                data,
                sanitize_file_name(&submission.file_name),
                submission.content_type.clone(),
            )
        };

        // Thumbnail: degraded-mode on any failure, never aborts the run.
        let thumbnail_url =
            match cancellable(&cancel, self.thumbnail_stage(&video, &file_name, &reporter)).await {
                Ok(url) => Some(url),
                Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled),
                Err(e) => {
                    tracing::warn!(error = %e, "thumbnail stage failed, continuing without poster");
                    None
                }
            };

        let upload_progress: UploadProgressFn = {
            let reporter = reporter.clone();
            Arc::new(move |p| reporter.report(PipelineStage::UploadingVideo, p.percentage, "Uploading video"))
        };
        let remote_url = cancellable(&cancel, async {
            self.uploader
                .upload_with_retry(video.clone(), &file_name, &content_type, &upload_progress)
                .await
                .map_err(PipelineError::Upload)
        })
        .await?;

        // Commit point: metadata is persisted exactly once, strictly last.
        reporter.report(PipelineStage::Saving, 0, "Saving video details");
        let request = VideoMetadataRequest {
            sec_user_id: submission.sec_user_id.clone(),
            url: remote_url.clone(),
            file_name: file_name.clone(),
            title: submission.title.clone(),
            description: submission.description.clone(),
            file_size: Some(video.len() as u64),
            thumbnail_url,
            tags: submission.tags.clone(),
        };
        let record = cancellable(&cancel, async {
            self.boundary
                .save_video_metadata(&request)
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %e,
                        object = %remote_url,
                        "metadata persist failed; uploaded object may be orphaned"
                    );
                    PipelineError::Persist(e.to_string())
                })
        })
        .await?;

        reporter.report(PipelineStage::Saving, 100, "Video published");
        tracing::info!(url = %record.url, "ingestion complete");
        Ok(record)
    }

    async fn thumbnail_stage(
        &self,
        video: &Bytes,
        file_name: &str,
        reporter: &ProgressReporter,
    ) -> Result<String, PipelineError> {
        reporter.report(PipelineStage::Thumbnail, 0, "Creating thumbnail");
        let jpeg = self
            .thumbnails
            .extract(video.clone())
            .await
            .map_err(|e| PipelineError::Thumbnail(e.to_string()))?;

        let thumbnail_name = format!("{}.jpg", file_stem(file_name));
        let progress: UploadProgressFn = {
            let reporter = reporter.clone();
            Arc::new(move |p| reporter.report(PipelineStage::Thumbnail, p.percentage, "Uploading thumbnail"))
        };
        self.uploader
            .upload_with_retry(jpeg, &thumbnail_name, "image/jpeg", &progress)
            .await
            .map_err(|e| PipelineError::Thumbnail(e.to_string()))
    }
}

/// Fold per-phase conversion progress into one stage-local 0-100 value.
///
/// The engine reports each phase on its own 0-100 scale, so the phases get
/// weighted slices: loading 0-10, transcoding 10-95 on top of that. Without
/// the weighting, loading completion would hit the top of the stage band and
/// the monotonic guard would clamp every transcoding update under it.
fn conversion_local(p: &ConversionProgress) -> u8 {
    let progress = p.progress.min(100) as u32;
    match p.phase {
        ConversionPhase::Loading => (progress / 10) as u8,
        ConversionPhase::Analyzing => 10,
        ConversionPhase::Converting => 10 + (progress * 85 / 100) as u8,
        ConversionPhase::Complete => 100,
    }
}

/// Race a stage against the caller's abort. After an abort, no stage result
/// is surfaced and no further progress callbacks fire.
async fn cancellable<T>(
    cancel: &CancellationToken,
    stage: impl std::future::Future<Output = Result<T, PipelineError>>,
) -> Result<T, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        result = stage => result,
    }
}

fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("video")
        .to_string()
}

/// Keep only filesystem-safe characters, cap length, and reject traversal.
fn sanitize_file_name(file_name: &str) -> String {
    const MAX: usize = 255;
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    if base.contains("..") {
        return format!("video.{}", NORMALIZED_EXTENSION);
    }
    let safe: String = base
        .chars()
        .take(MAX)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.trim().is_empty() || safe.len() < 3 {
        format!("video.{}", NORMALIZED_EXTENSION)
    } else {
        safe
    }
}

/// Sanitized base name with the extension swapped to the normalized
/// container's.
fn normalized_file_name(original: &str) -> String {
    let sanitized = sanitize_file_name(original);
    format!("{}.{}", file_stem(&sanitized), NORMALIZED_EXTENSION)
}
