use thiserror::Error;

/// Why a single frame could not be classified.
///
/// Every variant aborts the current frame only; whether the stream carries
/// on is the caller's policy.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("frame is empty or malformed ({width}x{height}, {len} bytes)")]
    EmptyFrame { width: u32, height: u32, len: usize },
    #[error("face locator failed: {0}")]
    Locate(#[source] Box<dyn std::error::Error>),
    #[error("mask classifier failed: {0}")]
    Classify(#[source] Box<dyn std::error::Error>),
    #[error("mask classifier returned {actual} predictions for {expected} faces")]
    PredictionCountMismatch { expected: usize, actual: usize },
    #[error("invalid face crop: {0}")]
    InvalidCrop(String),
    #[error("invalid pipeline configuration: {0}")]
    Config(String),
}
