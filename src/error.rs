//! # Error Types
//!
//! Custom error types for the buoy monitor using `thiserror`.

use thiserror::Error;

/// Main error type for the buoy monitor
#[derive(Debug, Error)]
pub enum BuoyError {
    /// A gateway request failed or produced no usable response
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Serial port errors
    #[error("serial error: {0}")]
    Serial(String),

    /// Sensor driver errors
    #[error("sensor error: {0}")]
    Sensor(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the buoy monitor
pub type Result<T> = std::result::Result<T, BuoyError>;
