pub mod domain;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod stats;

pub use domain::{
    Chapter, ContentKind, Flashcard, GeneratedContent, GenerationRequest, NewNote, NoteSummary,
    QuizDifficulty, QuizOptions, QuizQuestion, StoredNote, StudyNoteDocument,
};
pub use error::{ErrorKind, GenerationError, PipelineError, PipelineResult};
pub use pipeline::{GenerationOutcome, PipelineSettings, RetryPolicy, StudyMaterialGenerator};
pub use ports::{
    GenerationConfig, PortError, PortResult, StudyNotesRepository, TextGenerationService,
};
pub use stats::{DailyCount, NoteCounts, NoteStats};
