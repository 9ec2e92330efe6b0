//! crates/study_notes_core/src/domain.rs
//!
//! Defines the core data structures for study material generation.
//! Everything here is constructed once per request and never mutated afterwards.
//! The serde shape mirrors the stored document shape (`correctAnswer` etc.).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Number of chapters every study note document carries.
pub const CHAPTER_COUNT: usize = 5;

/// Every quiz question carries exactly this many options.
pub const QUIZ_OPTION_COUNT: usize = 4;

pub const DEFAULT_QUESTION_COUNT: u32 = 5;
pub const MAX_QUESTION_COUNT: u32 = 20;

//=========================================================================================
// Generated Content
//=========================================================================================

/// An ordered section of a study note document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    /// Prose, possibly with inline (`$...$`) or display (`$$...$$`) math markup.
    pub content: String,
    pub order: u32,
}

/// A complete set of study notes: a title and exactly five ordered chapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyNoteDocument {
    pub title: String,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

/// A multiple-choice question. `correct_answer` indexes into `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: u8,
    pub explanation: String,
}

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl QuizDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizDifficulty::Easy => "easy",
            QuizDifficulty::Medium => "medium",
            QuizDifficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for QuizDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizDifficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(QuizDifficulty::Easy),
            "medium" => Ok(QuizDifficulty::Medium),
            "hard" => Ok(QuizDifficulty::Hard),
            other => Err(format!(
                "'{}' is not a quiz difficulty (expected easy, medium or hard)",
                other
            )),
        }
    }
}

/// Settings for a quiz batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOptions {
    pub question_count: u32,
    pub difficulty: QuizDifficulty,
}

impl Default for QuizOptions {
    fn default() -> Self {
        Self {
            question_count: DEFAULT_QUESTION_COUNT,
            difficulty: QuizDifficulty::default(),
        }
    }
}

/// Which kind of content a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Notes,
    Flashcards,
    Quiz,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentKind::Notes => "notes",
            ContentKind::Flashcards => "flashcards",
            ContentKind::Quiz => "quiz",
        };
        f.write_str(name)
    }
}

/// A single generation request, discriminated by content kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    Notes {
        topic: String,
        subject: String,
        difficulty_level: String,
    },
    Flashcards {
        source_text: String,
    },
    Quiz {
        source_text: String,
        question_count: u32,
        difficulty: QuizDifficulty,
    },
}

impl GenerationRequest {
    pub fn kind(&self) -> ContentKind {
        match self {
            GenerationRequest::Notes { .. } => ContentKind::Notes,
            GenerationRequest::Flashcards { .. } => ContentKind::Flashcards,
            GenerationRequest::Quiz { .. } => ContentKind::Quiz,
        }
    }
}

/// The payload produced by [`GenerationRequest`] dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedContent {
    Notes(StudyNoteDocument),
    Flashcards(Vec<Flashcard>),
    Quiz(Vec<QuizQuestion>),
}

//=========================================================================================
// Persisted Notes
//=========================================================================================

/// The data needed to persist a freshly generated note.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub user_id: Uuid,
    pub topic: String,
    pub subject: String,
    pub difficulty: String,
    pub document: StudyNoteDocument,
    /// Set when the chapters came from the fallback template.
    pub degraded: bool,
}

/// A note as stored, together with any flashcards and quiz generated from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredNote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub subject: String,
    pub topic: String,
    pub difficulty: String,
    pub chapters: Vec<Chapter>,
    pub flashcards: Vec<Flashcard>,
    pub flashcards_generated_at: Option<DateTime<Utc>>,
    pub quiz: Vec<QuizQuestion>,
    pub quiz_generated_at: Option<DateTime<Utc>>,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredNote {
    pub fn has_flashcards(&self) -> bool {
        !self.flashcards.is_empty()
    }
}

/// List-view projection of a note; chapter content is left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSummary {
    pub id: Uuid,
    pub title: String,
    pub subject: String,
    pub topic: String,
    pub difficulty: String,
    pub chapter_titles: Vec<String>,
    pub has_flashcards: bool,
    pub has_quiz: bool,
    pub created_at: DateTime<Utc>,
}
