//! crates/study_notes_core/src/error.rs
//!
//! Error types for the generation pipeline.

/// Why a single generation attempt failed. Every variant is retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The model could not be reached, timed out, or returned an empty reply.
    #[error("Upstream generation error: {0}")]
    Upstream(String),
    /// No delimiter-matched JSON span was found in the reply.
    #[error("No JSON payload found in model response")]
    NoPayloadFound,
    #[error("Malformed JSON payload: {0}")]
    Parse(String),
    /// Well-formed JSON that breaks a structural rule.
    #[error("Payload failed schema validation: {0}")]
    Schema(String),
}

/// A flat discriminant over every way a pipeline run can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    Upstream,
    NoPayloadFound,
    Parse,
    Schema,
    Cancelled,
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::Upstream(_) => ErrorKind::Upstream,
            GenerationError::NoPayloadFound => ErrorKind::NoPayloadFound,
            GenerationError::Parse(_) => ErrorKind::Parse,
            GenerationError::Schema(_) => ErrorKind::Schema,
        }
    }
}

/// The terminal error of a pipeline run, surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The request itself was unusable; no attempt was made.
    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),
    #[error("Generation failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: GenerationError },
    #[error("Generation was cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            PipelineError::Exhausted { last, .. } => last.kind(),
            PipelineError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// A convenience type alias for `Result<T, PipelineError>`.
pub type PipelineResult<T> = Result<T, PipelineError>;
