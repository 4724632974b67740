//! Staged progress composition.
//!
//! Each stage reports progress in its own local 0-100 scale; the reporter
//! owns the stage-to-band table and performs the linear rescale in
//! one place. The surfaced timeline is monotonically non-decreasing and
//! never exceeds 100, and goes silent once the run is aborted.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Pipeline stages, each with a reserved band of the global 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Converting,
    Thumbnail,
    UploadingVideo,
    Saving,
}

impl PipelineStage {
    /// Reserved (start, end) band on the global scale.
    pub fn band(self) -> (u8, u8) {
        match self {
            PipelineStage::Converting => (0, 60),
            PipelineStage::Thumbnail => (60, 70),
            PipelineStage::UploadingVideo => (70, 95),
            PipelineStage::Saving => (95, 100),
        }
    }

    /// Rescale a stage-local 0-100 value into the stage's band.
    pub fn rescale(self, local: u8) -> u8 {
        let (start, end) = self.band();
        let local = local.min(100) as u32;
        start + ((end - start) as u32 * local / 100) as u8
    }
}

/// One update on the user-facing timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineUpdate {
    pub percent: u8,
    pub message: String,
}

pub type PipelineProgressFn = Arc<dyn Fn(PipelineUpdate) + Send + Sync>;

/// Folds stage-local progress into the single global timeline.
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<Inner>,
}

struct Inner {
    sink: PipelineProgressFn,
    last: AtomicU8,
    cancel: CancellationToken,
}

impl ProgressReporter {
    pub fn new(sink: PipelineProgressFn, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                last: AtomicU8::new(0),
                cancel,
            }),
        }
    }

    /// Report stage-local progress. Values that would move the global
    /// timeline backwards are clamped to the last surfaced value.
    pub fn report(&self, stage: PipelineStage, local: u8, message: &str) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let scaled = stage.rescale(local);
        let previous = self.inner.last.fetch_max(scaled, Ordering::SeqCst);
        let percent = scaled.max(previous);
        (self.inner.sink)(PipelineUpdate {
            percent,
            message: message.to_string(),
        });
    }
}
