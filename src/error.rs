//! Error types for the visualizer pipeline.

use std::fmt;

/// Pipeline error type.
#[derive(Debug)]
pub enum VizError {
    /// Structural misconfiguration: a capture device could not be initialized
    /// with the requested parameters, or no usable capture size exists.
    /// Fatal; surfaced to the caller at start time and never retried.
    Config(String),
    /// A delivered frame's length disagrees with the configured size.
    /// An integration defect, not a runtime condition; never retried.
    SizeMismatch { expected: usize, actual: usize },
    /// Audio device enumeration/configuration errors.
    AudioDevice(String),
    /// Audio stream construction/playback errors.
    AudioStream(String),
}

impl fmt::Display for VizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VizError::Config(msg) => write!(f, "Configuration error: {}", msg),
            VizError::SizeMismatch { expected, actual } => {
                write!(f, "Data size={} doesn't match expected size={}", actual, expected)
            }
            VizError::AudioDevice(msg) => write!(f, "Audio device error: {}", msg),
            VizError::AudioStream(msg) => write!(f, "Audio stream error: {}", msg),
        }
    }
}

impl std::error::Error for VizError {}

impl From<cpal::DeviceNameError> for VizError {
    fn from(err: cpal::DeviceNameError) -> Self {
        VizError::AudioDevice(format!("Failed to get device name: {}", err))
    }
}

impl From<cpal::SupportedStreamConfigsError> for VizError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        VizError::AudioDevice(format!("Failed to get supported stream configs: {}", err))
    }
}

impl From<cpal::BuildStreamError> for VizError {
    fn from(err: cpal::BuildStreamError) -> Self {
        VizError::AudioStream(format!("Failed to build audio stream: {}", err))
    }
}

impl From<cpal::PlayStreamError> for VizError {
    fn from(err: cpal::PlayStreamError) -> Self {
        VizError::AudioStream(format!("Failed to play audio stream: {}", err))
    }
}

/// Result type alias for pipeline operations.
pub type VizResult<T> = Result<T, VizError>;
