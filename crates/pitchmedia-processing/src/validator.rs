//! Submission validation gate.
//!
//! Strict, fail-closed checks applied before a file enters the pipeline:
//! size ceiling, duration window, and a portrait-only aspect constraint.

use pitchmedia_core::{IngestConfig, VideoAttributes};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Empty file")]
    EmptyFile,

    #[error("Video duration {duration:.1}s is outside the allowed window ({min:.0}s to {max:.0}s)")]
    DurationOutOfRange { duration: f64, min: f64, max: f64 },

    #[error("Video must be portrait (got {width}x{height})")]
    NotPortrait { width: u32, height: u32 },
}

/// Validates measured attributes of a submission against configured limits.
pub struct SubmissionValidator {
    max_file_size: u64,
    min_duration_secs: f64,
    max_duration_secs: f64,
}

impl SubmissionValidator {
    pub fn new(max_file_size: u64, min_duration_secs: f64, max_duration_secs: f64) -> Self {
        Self {
            max_file_size,
            min_duration_secs,
            max_duration_secs,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(
            config.max_file_size_bytes,
            config.min_duration_secs,
            config.max_duration_secs,
        )
    }

    pub fn validate_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    pub fn validate_duration(&self, duration_secs: f64) -> Result<(), ValidationError> {
        if duration_secs < self.min_duration_secs || duration_secs > self.max_duration_secs {
            return Err(ValidationError::DurationOutOfRange {
                duration: duration_secs,
                min: self.min_duration_secs,
                max: self.max_duration_secs,
            });
        }
        Ok(())
    }

    pub fn validate_aspect(&self, width: u32, height: u32) -> Result<(), ValidationError> {
        if height <= width {
            return Err(ValidationError::NotPortrait { width, height });
        }
        Ok(())
    }

    /// Run all gate checks. Fails closed on the first violation.
    pub fn validate_all(&self, attrs: &VideoAttributes) -> Result<(), ValidationError> {
        self.validate_size(attrs.file_size)?;
        self.validate_duration(attrs.duration_secs)?;
        self.validate_aspect(attrs.width, attrs.height)?;
        Ok(())
    }
}
