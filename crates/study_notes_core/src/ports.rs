//! crates/study_notes_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! These traits form the boundary of the hexagonal architecture: the generation
//! pipeline talks to a text-generation service and the web layer talks to a
//! repository, without either knowing which concrete implementation is plugged in.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Flashcard, NewNote, NoteSummary, QuizQuestion, StoredNote};
use crate::stats::NoteStats;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Generation Settings
//=========================================================================================

/// Model settings sent with every generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl GenerationConfig {
    /// Structured notes: long output, moderate randomness.
    pub fn notes() -> Self {
        Self {
            max_output_tokens: 8192,
            temperature: 0.7,
        }
    }

    pub fn flashcards() -> Self {
        Self {
            max_output_tokens: 8192,
            temperature: 0.7,
        }
    }

    /// Quizzes run hotter for more varied questions.
    pub fn quiz() -> Self {
        Self {
            max_output_tokens: 8192,
            temperature: 0.9,
        }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Sends the instruction text to the model and returns its raw reply text.
    ///
    /// A successful call makes no promise about the shape of the text.
    async fn generate_content(&self, prompt: &str, config: &GenerationConfig)
        -> PortResult<String>;
}

#[async_trait]
pub trait StudyNotesRepository: Send + Sync {
    async fn create_note(&self, note: NewNote) -> PortResult<StoredNote>;

    /// Fetches a note owned by `user_id`. Notes owned by someone else are `NotFound`.
    async fn get_note(&self, user_id: Uuid, note_id: Uuid) -> PortResult<StoredNote>;

    /// Lists a user's notes, newest first.
    async fn list_notes(&self, user_id: Uuid) -> PortResult<Vec<NoteSummary>>;

    /// Replaces the flashcards attached to a note.
    async fn save_flashcards(&self, note_id: Uuid, flashcards: &[Flashcard]) -> PortResult<()>;

    /// Replaces the quiz attached to a note.
    async fn save_quiz(&self, note_id: Uuid, quiz: &[QuizQuestion]) -> PortResult<()>;

    /// Aggregates a user's notes. A user without notes gets all-zero stats.
    async fn note_stats(&self, user_id: Uuid) -> PortResult<NoteStats>;
}
