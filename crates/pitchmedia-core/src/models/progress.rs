use serde::{Deserialize, Serialize};

/// Phase of a single conversion, UI-facing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionPhase {
    Loading,
    Analyzing,
    Converting,
    Complete,
}

/// Conversion progress update. `progress` is 0-100 and non-decreasing within
/// a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionProgress {
    pub phase: ConversionPhase,
    pub progress: u8,
    pub message: String,
}

impl ConversionProgress {
    pub fn new(phase: ConversionPhase, progress: u8, message: impl Into<String>) -> Self {
        Self {
            phase,
            progress: progress.min(100),
            message: message.into(),
        }
    }
}

/// Byte-transfer progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
    pub percentage: u8,
}

impl UploadProgress {
    pub fn new(loaded: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((loaded.min(total) * 100) / total) as u8
        };
        Self {
            loaded,
            total,
            percentage,
        }
    }
}
