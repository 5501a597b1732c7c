//! # Error Types
//!
//! Custom error types for Gamepad Events using `thiserror`.
//!
//! The event engine itself never fails: unreadable devices and unknown
//! indices are reported as absence. These errors cover the edges around it
//! (configuration, the event log, device enumeration).

use thiserror::Error;

/// Main error type for Gamepad Events
#[derive(Debug, Error)]
pub enum GamepadEventsError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Event log serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The input device directory cannot be used
    #[error("Input devices unavailable: {0}")]
    InputUnavailable(String),
}

/// Result type alias for Gamepad Events
pub type Result<T> = std::result::Result<T, GamepadEventsError>;
