//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Command text is not one of the recognized commands
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// An event batch with no events has no message to compose
    #[error("event batch is empty")]
    EmptyBatch,
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
