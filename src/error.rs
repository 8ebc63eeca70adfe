//! Error types for the phantom words engine

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio output and signal graph errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A source was stopped after it had already ended or been stopped.
    #[error("Source already stopped")]
    AlreadyStopped,

    #[error("Processing context is closed")]
    ContextClosed,

    #[error("Invalid signal graph: {0}")]
    InvalidGraph(String),

    /// Playback would run longer than a timer can represent
    #[error("Playback duration out of range: {0}s")]
    DurationOutOfRange(f64),
}

/// Errors raised while fetching or decoding a track payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Payload unreachable: {0}")]
    Unreachable(String),

    #[error("Unsupported content locator: {0}")]
    UnsupportedLocator(String),

    #[error("Payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed audio data: {0}")]
    Malformed(String),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Decoded audio is empty")]
    Empty,

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Decode task failed: {0}")]
    TaskFailed(String),
}

/// Playback request validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required parameters")]
    MissingParameters,

    #[error("Dual track mode selected but track 2 is missing")]
    MissingSecondTrack,

    #[error("Invalid track mode: {0}")]
    InvalidMode(String),

    #[error("Invalid number for {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Invalid playback speed for {field}: {value}")]
    InvalidSpeed { field: &'static str, value: String },

    #[error("Invalid track payload for {field}: {reason}")]
    InvalidPayload { field: &'static str, reason: String },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
