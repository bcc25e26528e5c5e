//! Error types for the TLD tracker.

use thiserror::Error;

/// Main error type for tracker operations.
#[derive(Error, Debug)]
pub enum TldError {
    /// Fatal configuration problem: zero area, overlap or scale, a scaled box
    /// larger than the frame, or an unsupported descriptor width.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No frame has been processed yet")]
    NoFrame,

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TldError>;
