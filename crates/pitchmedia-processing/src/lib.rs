//! Media processing for pitch-video ingestion: format classification, the
//! submission validation gate, the on-demand transcoding engine, and
//! thumbnail extraction.

pub mod classifier;
pub mod engine;
pub mod thumbnail;
pub mod validator;

pub use classifier::FormatClassifier;
pub use engine::{
    ConversionProgressFn, EngineError, EngineLoader, FfmpegLoader, TranscodeEngine, TranscodeSpec,
    Transcoder, NORMALIZED_CONTENT_TYPE, NORMALIZED_EXTENSION,
};
pub use thumbnail::ThumbnailExtractor;
pub use validator::{SubmissionValidator, ValidationError};
