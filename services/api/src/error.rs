//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and the mapping
//! from core errors to HTTP status codes.

use crate::config::ConfigError;
use axum::http::StatusCode;
use study_notes_core::error::{ErrorKind, PipelineError};
use study_notes_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failed migration run at startup.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// Status Code Mapping
//=========================================================================================

/// Maps a pipeline failure to the status returned to the caller.
///
/// The failure kind is matched exactly; message text never decides the status.
pub fn pipeline_status(error: &PipelineError) -> StatusCode {
    match error.kind() {
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Schema | ErrorKind::Parse | ErrorKind::NoPayloadFound => StatusCode::BAD_GATEWAY,
        ErrorKind::Upstream => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
    }
}

pub fn port_status(error: &PortError) -> StatusCode {
    match error {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
