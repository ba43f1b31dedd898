//! Error types for tunebox
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Provider-side failures have their own type at the trait
//! boundary; see [`crate::provider::ProviderError`].

use thiserror::Error;

/// Main error type for the tunebox crate
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or empty credentials, rejected before any provider contact
    #[error("Credential error: {0}")]
    Credentials(String),

    /// Another playback session currently holds the process-wide session slot
    #[error("A playback session is already active in this process")]
    SessionActive,

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Background task spawn/control errors
    #[error("Task error: {0}")]
    Task(String),

    /// Errors reported by the streaming provider
    #[error("Provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the tunebox Error
pub type Result<T> = std::result::Result<T, Error>;
