//! Pipeline composition: classify, convert if needed, thumbnail, upload,
//! persist, folded into one user-facing progress timeline.

pub mod coordinator;
pub mod progress;

pub use coordinator::{PipelineCoordinator, PipelineError};
pub use progress::{PipelineProgressFn, PipelineStage, PipelineUpdate, ProgressReporter};
