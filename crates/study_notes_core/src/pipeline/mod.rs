//! crates/study_notes_core/src/pipeline/mod.rs
//!
//! The generation pipeline, leaf modules first.

pub mod client;
pub mod extract;
pub mod fallback;
pub mod generator;
pub mod prompt;
pub mod retry;
pub mod validate;

pub use client::GenerationClient;
pub use extract::{extract, ShapeHint};
pub use fallback::fallback_notes;
pub use generator::{GenerationOutcome, PipelineSettings, StudyMaterialGenerator};
pub use retry::{with_retry, RetryError, RetryPolicy};
