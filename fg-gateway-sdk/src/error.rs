use std::time::Duration;
use thiserror::Error;

/// Driver specific errors
#[derive(Error, Debug, Default)]
pub enum DriverError {
    #[error("Service unavailable")]
    #[default]
    ServiceUnavailable,
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Execution error: {0}")]
    ExecutionError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Initialization error: {0}")]
    InitializationError(String),
    #[error("Codec error: {0}")]
    CodecError(String),
    #[error("Read/Write timeout")]
    Timeout(Duration),
    #[error("Session error: {0}")]
    SessionError(String),
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),
}

/// Errors surfaced by `NorthwardPublisher::try_publish`.
///
/// Publishing is non-blocking; a full northward queue is reported as
/// `QueueFull` so the caller can decide whether to drop or retry.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("northward queue is full")]
    QueueFull,
    #[error("northward pipeline closed: {0}")]
    Closed(String),
}
