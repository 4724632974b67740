//! Domain models shared across the pipeline.

pub mod format;
pub mod progress;
pub mod upload;
pub mod video;

pub use format::MediaFormatDescriptor;
pub use progress::{ConversionPhase, ConversionProgress, UploadProgress};
pub use upload::UploadDestination;
pub use video::{MediaProbe, VideoAttributes, VideoMetadataRequest, VideoRecord, VideoSubmission};
