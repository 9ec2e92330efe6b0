//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use study_notes_core::ports::StudyNotesRepository;
use study_notes_core::StudyMaterialGenerator;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn StudyNotesRepository>,
    pub generator: Arc<StudyMaterialGenerator>,
}
