//! Pitchmedia Core Library
//!
//! This crate provides the domain models, error taxonomy, and configuration
//! shared across all pitchmedia components.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{EngineSource, IngestConfig};
pub use error::{ErrorClass, LogLevel};
pub use models::{
    ConversionPhase, ConversionProgress, MediaFormatDescriptor, MediaProbe, UploadDestination,
    UploadProgress, VideoAttributes, VideoMetadataRequest, VideoRecord, VideoSubmission,
};
