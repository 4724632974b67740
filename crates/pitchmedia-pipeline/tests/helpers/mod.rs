//! Shared fixtures: a scripted engine, trust boundary, and transport that
//! let full pipeline runs execute without a real transcoder or network.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};

use pitchmedia_client::{
    ByteTransport, ClientError, RetryPolicy, TransferError, TrustBoundary, UploadOrchestrator,
    UploadProgressFn,
};
use pitchmedia_core::{
    EngineSource, MediaProbe, UploadDestination, UploadProgress, VideoAttributes,
    VideoMetadataRequest, VideoRecord, VideoSubmission,
};
use pitchmedia_pipeline::{PipelineCoordinator, PipelineUpdate};
use pitchmedia_processing::engine::{EngineProgressFn, Transcoder};
use pitchmedia_processing::{
    EngineError, EngineLoader, FormatClassifier, SubmissionValidator, ThumbnailExtractor,
    TranscodeEngine, TranscodeSpec,
};

/// A 4x4 PNG produced in memory, so the thumbnail encoder has a real frame
/// to work with.
pub fn tiny_png() -> Bytes {
    let mut out = std::io::Cursor::new(Vec::new());
    let buffer = image::RgbImage::from_pixel(4, 4, image::Rgb([12, 120, 220]));
    image::DynamicImage::ImageRgb8(buffer)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encoding fixture png");
    Bytes::from(out.into_inner())
}

pub struct StubTranscoder {
    pub transcodes: AtomicUsize,
    pub fail_frames: bool,
}

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn transcode(
        &self,
        _input: Bytes,
        _input_name: &str,
        _spec: &TranscodeSpec,
        on_progress: EngineProgressFn,
    ) -> Result<Bytes, EngineError> {
        self.transcodes.fetch_add(1, Ordering::SeqCst);
        for ratio in [0.2, 0.6, 1.0] {
            on_progress(ratio);
        }
        Ok(Bytes::from_static(b"normalized-video-bytes"))
    }

    async fn extract_frame(&self, _input: Bytes, _offset_secs: f64) -> Result<Bytes, EngineError> {
        if self.fail_frames {
            Err(EngineError::Execution("seek failed".to_string()))
        } else {
            Ok(tiny_png())
        }
    }

    async fn probe(&self, _input: Bytes) -> Result<MediaProbe, EngineError> {
        Ok(MediaProbe {
            duration_secs: 30.0,
            width: 720,
            height: 1280,
        })
    }
}

pub struct StubLoader {
    pub loads: AtomicUsize,
    pub transcoder: Arc<StubTranscoder>,
}

impl StubLoader {
    pub fn new(fail_frames: bool) -> Self {
        Self {
            loads: AtomicUsize::new(0),
            transcoder: Arc::new(StubTranscoder {
                transcodes: AtomicUsize::new(0),
                fail_frames,
            }),
        }
    }
}

#[async_trait]
impl EngineLoader for StubLoader {
    async fn load(&self, _source: &EngineSource) -> Result<Arc<dyn Transcoder>, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.transcoder.clone())
    }
}

/// Trust boundary issuing numbered destinations and recording persisted
/// metadata.
pub struct RecordingBoundary {
    pub destination_requests: AtomicUsize,
    /// The first N destinations are issued already expired.
    pub expired_first: usize,
    pub saved: Mutex<Vec<VideoMetadataRequest>>,
    pub fail_save: bool,
}

impl RecordingBoundary {
    pub fn new() -> Self {
        Self {
            destination_requests: AtomicUsize::new(0),
            expired_first: 0,
            saved: Mutex::new(Vec::new()),
            fail_save: false,
        }
    }

    pub fn final_url(n: usize, filename: &str) -> String {
        format!("https://storage.example.com/get/{n}/{filename}")
    }
}

#[async_trait]
impl TrustBoundary for RecordingBoundary {
    async fn request_upload_destination(
        &self,
        filename: &str,
        _content_type: &str,
    ) -> Result<UploadDestination, ClientError> {
        let n = self.destination_requests.fetch_add(1, Ordering::SeqCst);
        let expires_at = if n < self.expired_first {
            Utc::now() - ChronoDuration::seconds(5)
        } else {
            Utc::now() + ChronoDuration::seconds(300)
        };
        Ok(UploadDestination {
            upload_url: format!("https://storage.example.com/put/{n}/{filename}"),
            final_file_url: Self::final_url(n, filename),
            expires_at,
        })
    }

    async fn save_video_metadata(
        &self,
        request: &VideoMetadataRequest,
    ) -> Result<VideoRecord, ClientError> {
        if self.fail_save {
            return Err(ClientError::Request("500: persistence down".to_string()));
        }
        self.saved.lock().unwrap().push(request.clone());
        Ok(VideoRecord {
            url: request.url.clone(),
            file_name: request.file_name.clone(),
            title: request.title.clone(),
            description: request.description.clone(),
            file_size: request.file_size,
            thumbnail_url: request.thumbnail_url.clone(),
        })
    }
}

/// Transport replaying scripted outcomes; unscripted puts succeed.
pub struct ScriptedTransport {
    pub outcomes: Mutex<VecDeque<Result<(), TransferError>>>,
    pub puts: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(outcomes: Vec<Result<(), TransferError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            puts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ByteTransport for ScriptedTransport {
    async fn put(
        &self,
        _url: &str,
        _content_type: &str,
        body: Bytes,
        on_progress: &UploadProgressFn,
    ) -> Result<(), TransferError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let total = body.len() as u64;
        on_progress(UploadProgress::new(total / 2, total));
        on_progress(UploadProgress::new(total, total));
        self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

pub struct TestRig {
    pub coordinator: PipelineCoordinator,
    pub loader: Arc<StubLoader>,
    pub boundary: Arc<RecordingBoundary>,
    pub transport: Arc<ScriptedTransport>,
    pub updates: Arc<Mutex<Vec<PipelineUpdate>>>,
}

pub fn rig(
    loader: StubLoader,
    boundary: RecordingBoundary,
    transport: ScriptedTransport,
) -> TestRig {
    let loader = Arc::new(loader);
    let boundary = Arc::new(boundary);
    let transport = Arc::new(transport);

    let engine = Arc::new(TranscodeEngine::new(
        loader.clone(),
        vec![EngineSource::Local(PathBuf::from("/usr/bin/ffmpeg"))],
    ));
    let thumbnails = ThumbnailExtractor::new(engine.clone(), 1.0, 80);
    let uploader = UploadOrchestrator::new(boundary.clone(), transport.clone(), RetryPolicy::new(2));

    let coordinator = PipelineCoordinator::new(
        FormatClassifier::new(),
        SubmissionValidator::new(100 * 1024 * 1024, 5.0, 120.0),
        engine,
        thumbnails,
        uploader,
        boundary.clone(),
        TranscodeSpec::default(),
    );

    TestRig {
        coordinator,
        loader,
        boundary,
        transport,
        updates: Arc::new(Mutex::new(Vec::new())),
    }
}

impl TestRig {
    pub fn progress_sink(&self) -> pitchmedia_pipeline::PipelineProgressFn {
        let updates = self.updates.clone();
        Arc::new(move |u| updates.lock().unwrap().push(u))
    }

    pub fn percents(&self) -> Vec<u8> {
        self.updates.lock().unwrap().iter().map(|u| u.percent).collect()
    }
}

pub fn submission(file_name: &str, content_type: &str) -> VideoSubmission {
    VideoSubmission {
        sec_user_id: "user-42".to_string(),
        title: "My pitch".to_string(),
        description: "Quarterly pitch video".to_string(),
        file_name: file_name.to_string(),
        content_type: content_type.to_string(),
        tags: vec!["pitch".to_string()],
    }
}

pub fn portrait_attrs() -> VideoAttributes {
    VideoAttributes {
        file_size: 4 * 1024 * 1024,
        duration_secs: 30.0,
        width: 720,
        height: 1280,
    }
}
