//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `StudyNotesRepository` port from the `core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use study_notes_core::domain::{
    Chapter, Flashcard, NewNote, NoteSummary, QuizQuestion, StoredNote,
};
use study_notes_core::ports::{PortError, PortResult, StudyNotesRepository};
use study_notes_core::stats::{NoteCounts, NoteStats};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StudyNotesRepository` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn note_not_found(note_id: Uuid) -> PortError {
    PortError::NotFound(format!("Note {} not found", note_id))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct NoteRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    subject: String,
    topic: String,
    difficulty: String,
    degraded: bool,
    flashcards_generated_at: Option<DateTime<Utc>>,
    quiz_generated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ChapterRecord {
    chapter_order: i32,
    title: String,
    content: String,
}
impl ChapterRecord {
    fn to_domain(self) -> Chapter {
        Chapter {
            title: self.title,
            content: self.content,
            order: self.chapter_order.max(0) as u32,
        }
    }
}

#[derive(FromRow)]
struct FlashcardRecord {
    front: String,
    back: String,
}
impl FlashcardRecord {
    fn to_domain(self) -> Flashcard {
        Flashcard {
            front: self.front,
            back: self.back,
        }
    }
}

#[derive(FromRow)]
struct QuizQuestionRecord {
    question: String,
    options: Vec<String>,
    correct_answer: i16,
    explanation: String,
}
impl QuizQuestionRecord {
    fn to_domain(self) -> QuizQuestion {
        QuizQuestion {
            question: self.question,
            options: self.options,
            correct_answer: self.correct_answer.clamp(0, u8::MAX as i16) as u8,
            explanation: self.explanation,
        }
    }
}

#[derive(FromRow)]
struct NoteSummaryRecord {
    id: Uuid,
    title: String,
    subject: String,
    topic: String,
    difficulty: String,
    chapter_titles: Vec<String>,
    has_flashcards: bool,
    has_quiz: bool,
    created_at: DateTime<Utc>,
}
impl NoteSummaryRecord {
    fn to_domain(self) -> NoteSummary {
        NoteSummary {
            id: self.id,
            title: self.title,
            subject: self.subject,
            topic: self.topic,
            difficulty: self.difficulty,
            chapter_titles: self.chapter_titles,
            has_flashcards: self.has_flashcards,
            has_quiz: self.has_quiz,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct NoteCountsRecord {
    created_on: NaiveDate,
    chapter_count: i64,
    flashcard_count: i64,
}
impl NoteCountsRecord {
    fn to_domain(self) -> NoteCounts {
        NoteCounts {
            created_on: self.created_on,
            chapter_count: self.chapter_count.clamp(0, u32::MAX as i64) as u32,
            flashcard_count: self.flashcard_count.clamp(0, u32::MAX as i64) as u32,
        }
    }
}

//=========================================================================================
// `StudyNotesRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudyNotesRepository for DbAdapter {
    async fn create_note(&self, note: NewNote) -> PortResult<StoredNote> {
        let note_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            "INSERT INTO notes (id, user_id, title, subject, topic, difficulty, degraded)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING created_at",
        )
        .bind(note_id)
        .bind(note.user_id)
        .bind(&note.document.title)
        .bind(&note.subject)
        .bind(&note.topic)
        .bind(&note.difficulty)
        .bind(note.degraded)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        for chapter in &note.document.chapters {
            sqlx::query(
                "INSERT INTO chapters (id, note_id, chapter_order, title, content)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(note_id)
            .bind(chapter.order as i32)
            .bind(&chapter.title)
            .bind(&chapter.content)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;

        Ok(StoredNote {
            id: note_id,
            user_id: note.user_id,
            title: note.document.title,
            subject: note.subject,
            topic: note.topic,
            difficulty: note.difficulty,
            chapters: note.document.chapters,
            flashcards: Vec::new(),
            flashcards_generated_at: None,
            quiz: Vec::new(),
            quiz_generated_at: None,
            degraded: note.degraded,
            created_at,
        })
    }

    async fn get_note(&self, user_id: Uuid, note_id: Uuid) -> PortResult<StoredNote> {
        let record = sqlx::query_as::<_, NoteRecord>(
            "SELECT id, user_id, title, subject, topic, difficulty, degraded,
                    flashcards_generated_at, quiz_generated_at, created_at
             FROM notes WHERE id = $1 AND user_id = $2",
        )
        .bind(note_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => note_not_found(note_id),
            _ => unexpected(e),
        })?;

        let chapters = sqlx::query_as::<_, ChapterRecord>(
            "SELECT chapter_order, title, content FROM chapters
             WHERE note_id = $1 ORDER BY chapter_order",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let flashcards = sqlx::query_as::<_, FlashcardRecord>(
            "SELECT front, back FROM flashcards WHERE note_id = $1 ORDER BY position",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let quiz = sqlx::query_as::<_, QuizQuestionRecord>(
            "SELECT question, options, correct_answer, explanation FROM quiz_questions
             WHERE note_id = $1 ORDER BY position",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(StoredNote {
            id: record.id,
            user_id: record.user_id,
            title: record.title,
            subject: record.subject,
            topic: record.topic,
            difficulty: record.difficulty,
            chapters: chapters.into_iter().map(ChapterRecord::to_domain).collect(),
            flashcards: flashcards.into_iter().map(FlashcardRecord::to_domain).collect(),
            flashcards_generated_at: record.flashcards_generated_at,
            quiz: quiz.into_iter().map(QuizQuestionRecord::to_domain).collect(),
            quiz_generated_at: record.quiz_generated_at,
            degraded: record.degraded,
            created_at: record.created_at,
        })
    }

    async fn list_notes(&self, user_id: Uuid) -> PortResult<Vec<NoteSummary>> {
        let records = sqlx::query_as::<_, NoteSummaryRecord>(
            "SELECT n.id, n.title, n.subject, n.topic, n.difficulty, n.created_at,
                    ARRAY(SELECT c.title FROM chapters c
                          WHERE c.note_id = n.id ORDER BY c.chapter_order) AS chapter_titles,
                    EXISTS(SELECT 1 FROM flashcards f WHERE f.note_id = n.id) AS has_flashcards,
                    EXISTS(SELECT 1 FROM quiz_questions q WHERE q.note_id = n.id) AS has_quiz
             FROM notes n
             WHERE n.user_id = $1
             ORDER BY n.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(NoteSummaryRecord::to_domain).collect())
    }

    async fn save_flashcards(&self, note_id: Uuid, flashcards: &[Flashcard]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let updated = sqlx::query("UPDATE notes SET flashcards_generated_at = NOW() WHERE id = $1")
            .bind(note_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if updated.rows_affected() == 0 {
            return Err(note_not_found(note_id));
        }

        sqlx::query("DELETE FROM flashcards WHERE note_id = $1")
            .bind(note_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        for (position, card) in flashcards.iter().enumerate() {
            sqlx::query(
                "INSERT INTO flashcards (id, note_id, position, front, back)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(note_id)
            .bind(position as i32)
            .bind(&card.front)
            .bind(&card.back)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)
    }

    async fn save_quiz(&self, note_id: Uuid, quiz: &[QuizQuestion]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let updated = sqlx::query("UPDATE notes SET quiz_generated_at = NOW() WHERE id = $1")
            .bind(note_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if updated.rows_affected() == 0 {
            return Err(note_not_found(note_id));
        }

        sqlx::query("DELETE FROM quiz_questions WHERE note_id = $1")
            .bind(note_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        for (position, question) in quiz.iter().enumerate() {
            sqlx::query(
                "INSERT INTO quiz_questions
                     (id, note_id, position, question, options, correct_answer, explanation)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(Uuid::new_v4())
            .bind(note_id)
            .bind(position as i32)
            .bind(&question.question)
            .bind(&question.options)
            .bind(question.correct_answer as i16)
            .bind(&question.explanation)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)
    }

    async fn note_stats(&self, user_id: Uuid) -> PortResult<NoteStats> {
        let records = sqlx::query_as::<_, NoteCountsRecord>(
            "SELECT (n.created_at AT TIME ZONE 'UTC')::date AS created_on,
                    (SELECT COUNT(*) FROM chapters c WHERE c.note_id = n.id) AS chapter_count,
                    (SELECT COUNT(*) FROM flashcards f WHERE f.note_id = n.id) AS flashcard_count
             FROM notes n
             WHERE n.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let counts: Vec<NoteCounts> = records.into_iter().map(NoteCountsRecord::to_domain).collect();
        Ok(NoteStats::from_counts(&counts, Utc::now().date_naive()))
    }
}
