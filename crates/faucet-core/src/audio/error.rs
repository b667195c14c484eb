//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening the output stream
#[derive(Error, Debug)]
pub enum AudioError {
    /// Host has no output device at all
    #[error("No default audio output device")]
    NoDefaultDevice,

    /// Configured device name did not match any output device
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to enumerate devices or query their configurations
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Device only offers sample formats the mixer cannot render
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
