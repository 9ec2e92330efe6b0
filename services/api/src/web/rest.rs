//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{pipeline_status, port_status};
use crate::web::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use study_notes_core::domain::{
    Chapter, Flashcard, NewNote, NoteSummary, QuizDifficulty, QuizOptions, QuizQuestion,
    StoredNote,
};
use study_notes_core::error::PipelineError;
use study_notes_core::pipeline::prompt::format_note_content;
use study_notes_core::ports::PortError;
use study_notes_core::stats::{DailyCount, NoteStats};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

type HandlerError = (StatusCode, String);

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_note_handler,
        list_notes_handler,
        get_note_handler,
        generate_flashcards_handler,
        get_flashcards_handler,
        generate_quiz_handler,
        get_quiz_handler,
        stats_handler,
    ),
    components(
        schemas(
            CreateNoteRequest,
            GenerateQuizRequest,
            NoteResponse,
            NoteSummaryResponse,
            ChapterResponse,
            FlashcardResponse,
            QuizQuestionResponse,
            GenerateFlashcardsResponse,
            FlashcardsResponse,
            GenerateQuizResponse,
            QuizResponse,
            StatsResponse,
            NoteStatsResponse,
            DailyCountResponse,
        )
    ),
    tags(
        (name = "Study Notes API", description = "Generate study notes, flashcards and quizzes.")
    )
)]
pub struct ApiDoc;

/// Builds the router for every REST endpoint.
pub fn routes(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/notes", post(create_note_handler).get(list_notes_handler))
        .route("/notes/{id}", get(get_note_handler))
        .route(
            "/notes/{id}/flashcards",
            post(generate_flashcards_handler).get(get_flashcards_handler),
        )
        .route(
            "/notes/{id}/quiz",
            post(generate_quiz_handler).get(get_quiz_handler),
        )
        .route("/stats", get(stats_handler))
        .with_state(app_state)
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The payload for requesting a new set of study notes.
#[derive(Deserialize, ToSchema)]
pub struct CreateNoteRequest {
    #[serde(default)]
    topic: String,
    #[serde(default)]
    subject: String,
    /// Free-form level, e.g. "Grade 10-11" or "Undergraduate".
    #[serde(default)]
    difficulty: String,
}

/// Optional quiz settings; both fields fall back to 5 questions at medium difficulty.
#[derive(Deserialize, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizRequest {
    num_questions: Option<u32>,
    /// One of `easy`, `medium`, `hard`.
    difficulty: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ChapterResponse {
    title: String,
    content: String,
    order: u32,
}

impl From<Chapter> for ChapterResponse {
    fn from(chapter: Chapter) -> Self {
        Self {
            title: chapter.title,
            content: chapter.content,
            order: chapter.order,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FlashcardResponse {
    front: String,
    back: String,
}

impl From<Flashcard> for FlashcardResponse {
    fn from(card: Flashcard) -> Self {
        Self {
            front: card.front,
            back: card.back,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionResponse {
    question: String,
    options: Vec<String>,
    /// Index into `options`, 0 to 3.
    correct_answer: u8,
    explanation: String,
}

impl From<QuizQuestion> for QuizQuestionResponse {
    fn from(q: QuizQuestion) -> Self {
        Self {
            question: q.question,
            options: q.options,
            correct_answer: q.correct_answer,
            explanation: q.explanation,
        }
    }
}

/// A stored study note with everything generated from it so far.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    id: Uuid,
    user_id: Uuid,
    title: String,
    subject: String,
    topic: String,
    difficulty: String,
    chapters: Vec<ChapterResponse>,
    flashcards: Vec<FlashcardResponse>,
    flashcards_generated_at: Option<DateTime<Utc>>,
    quiz: Vec<QuizQuestionResponse>,
    quiz_generated_at: Option<DateTime<Utc>>,
    /// Set when the chapters are template content rather than model output.
    degraded: bool,
    created_at: DateTime<Utc>,
}

impl From<StoredNote> for NoteResponse {
    fn from(note: StoredNote) -> Self {
        Self {
            id: note.id,
            user_id: note.user_id,
            title: note.title,
            subject: note.subject,
            topic: note.topic,
            difficulty: note.difficulty,
            chapters: convert(note.chapters),
            flashcards: convert(note.flashcards),
            flashcards_generated_at: note.flashcards_generated_at,
            quiz: convert(note.quiz),
            quiz_generated_at: note.quiz_generated_at,
            degraded: note.degraded,
            created_at: note.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteSummaryResponse {
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

impl From<NoteSummary> for NoteSummaryResponse {
    fn from(summary: NoteSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            subject: summary.subject,
            topic: summary.topic,
            difficulty: summary.difficulty,
            chapter_titles: summary.chapter_titles,
            has_flashcards: summary.has_flashcards,
            has_quiz: summary.has_quiz,
            created_at: summary.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct GenerateFlashcardsResponse {
    message: String,
    count: usize,
    flashcards: Vec<FlashcardResponse>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardsResponse {
    flashcards: Vec<FlashcardResponse>,
    has_flashcards: bool,
    flashcards_generated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateQuizResponse {
    success: bool,
    message: String,
    quiz: Vec<QuizQuestionResponse>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizResponse {
    success: bool,
    quiz: Vec<QuizQuestionResponse>,
    quiz_generated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct DailyCountResponse {
    /// UTC calendar day, `YYYY-MM-DD`.
    date: NaiveDate,
    count: u64,
}

impl From<DailyCount> for DailyCountResponse {
    fn from(day: DailyCount) -> Self {
        Self {
            date: day.date,
            count: day.count,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteStatsResponse {
    total_notes: u64,
    total_chapters: u64,
    notes_with_flashcards: u64,
    total_flashcards: u64,
    /// The last seven days, oldest first.
    notes_per_day: Vec<DailyCountResponse>,
    /// Chapter count -> number of notes with that many chapters.
    chapter_distribution: BTreeMap<u32, u64>,
    average_chapters_per_note: f64,
    /// Percentage of notes that have flashcards.
    flashcard_completion_rate: f64,
}

impl From<NoteStats> for NoteStatsResponse {
    fn from(stats: NoteStats) -> Self {
        Self {
            total_notes: stats.total_notes,
            total_chapters: stats.total_chapters,
            notes_with_flashcards: stats.notes_with_flashcards,
            total_flashcards: stats.total_flashcards,
            notes_per_day: convert(stats.notes_per_day),
            chapter_distribution: stats.chapter_distribution,
            average_chapters_per_note: stats.average_chapters_per_note,
            flashcard_completion_rate: stats.flashcard_completion_rate,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    success: bool,
    stats: NoteStatsResponse,
}

fn convert<T, U: From<T>>(items: Vec<T>) -> Vec<U> {
    items.into_iter().map(U::from).collect()
}

//=========================================================================================
// Handler Helpers
//=========================================================================================

fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, HandlerError> {
    let user_id_str = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(user_id_str).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

fn port_failure(context: &str, e: PortError) -> HandlerError {
    let status = port_status(&e);
    if status == StatusCode::NOT_FOUND {
        return (status, e.to_string());
    }
    error!("{}: {:?}", context, e);
    (status, context.to_string())
}

fn pipeline_failure(context: &str, e: PipelineError) -> HandlerError {
    error!("{}: {}", context, e);
    (pipeline_status(&e), format!("{}: {}", context, e))
}

/// A token cancelled when the returned guard drops, i.e. when the handler
/// future is dropped because the client went away.
fn request_cancellation() -> (CancellationToken, tokio_util::sync::DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

//=========================================================================================
// Study Note Handlers
//=========================================================================================

/// Generate and store a new set of five-chapter study notes.
///
/// When the model never produces usable notes, template notes are stored and
/// the response carries `degraded: true`.
#[utoipa::path(
    post,
    path = "/notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Notes generated and stored", body = NoteResponse),
        (status = 400, description = "Missing header or empty topic, subject or difficulty"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn create_note_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateNoteRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let (cancel, _guard) = request_cancellation();

    let outcome = app_state
        .generator
        .generate_study_notes(&payload.topic, &payload.subject, &payload.difficulty, &cancel)
        .await;
    let degraded = outcome.is_degraded();
    let document = outcome
        .into_result()
        .map_err(|e| pipeline_failure("Failed to generate study notes", e))?;

    let note = app_state
        .repository
        .create_note(NewNote {
            user_id,
            topic: payload.topic.trim().to_string(),
            subject: payload.subject.trim().to_string(),
            difficulty: payload.difficulty.trim().to_string(),
            document,
            degraded,
        })
        .await
        .map_err(|e| port_failure("Failed to save study notes", e))?;

    info!("Stored study notes {} (degraded: {})", note.id, degraded);
    Ok((StatusCode::CREATED, Json(NoteResponse::from(note))))
}

/// List the caller's study notes, newest first.
#[utoipa::path(
    get,
    path = "/notes",
    responses(
        (status = 200, description = "The caller's notes", body = [NoteSummaryResponse]),
        (status = 400, description = "Missing or invalid x-user-id header"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_notes_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let notes = app_state
        .repository
        .list_notes(user_id)
        .await
        .map_err(|e| port_failure("Failed to list study notes", e))?;

    Ok(Json(convert::<_, NoteSummaryResponse>(notes)))
}

/// Fetch one of the caller's study notes.
#[utoipa::path(
    get,
    path = "/notes/{id}",
    responses(
        (status = 200, description = "The stored note", body = NoteResponse),
        (status = 404, description = "No such note for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "The note ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_note_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(note_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let note = app_state
        .repository
        .get_note(user_id, note_id)
        .await
        .map_err(|e| port_failure("Failed to load study notes", e))?;

    Ok(Json(NoteResponse::from(note)))
}

//=========================================================================================
// Flashcard Handlers
//=========================================================================================

/// Generate flashcards from a stored note, replacing any existing ones.
#[utoipa::path(
    post,
    path = "/notes/{id}/flashcards",
    responses(
        (status = 200, description = "Flashcards generated", body = GenerateFlashcardsResponse),
        (status = 404, description = "No such note for this user"),
        (status = 502, description = "The model never returned usable flashcards"),
        (status = 503, description = "The model could not be reached")
    ),
    params(
        ("id" = Uuid, Path, description = "The note ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn generate_flashcards_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(note_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let note = app_state
        .repository
        .get_note(user_id, note_id)
        .await
        .map_err(|e| port_failure("Failed to load study notes", e))?;

    let (cancel, _guard) = request_cancellation();
    let source_text = format_note_content(&note.title, &note.chapters);
    let flashcards = app_state
        .generator
        .generate_flashcards(&source_text, &cancel)
        .await
        .into_result()
        .map_err(|e| pipeline_failure("Failed to generate flashcards", e))?;

    app_state
        .repository
        .save_flashcards(note_id, &flashcards)
        .await
        .map_err(|e| port_failure("Failed to save flashcards", e))?;

    Ok(Json(GenerateFlashcardsResponse {
        message: "Flashcards generated successfully".to_string(),
        count: flashcards.len(),
        flashcards: convert(flashcards),
    }))
}

/// Fetch the flashcards stored for a note.
#[utoipa::path(
    get,
    path = "/notes/{id}/flashcards",
    responses(
        (status = 200, description = "Stored flashcards, possibly empty", body = FlashcardsResponse),
        (status = 404, description = "No such note for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "The note ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_flashcards_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(note_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let note = app_state
        .repository
        .get_note(user_id, note_id)
        .await
        .map_err(|e| port_failure("Failed to load flashcards", e))?;

    Ok(Json(FlashcardsResponse {
        has_flashcards: note.has_flashcards(),
        flashcards_generated_at: note.flashcards_generated_at,
        flashcards: convert(note.flashcards),
    }))
}

//=========================================================================================
// Quiz Handlers
//=========================================================================================

fn quiz_options(body: &[u8]) -> Result<QuizOptions, HandlerError> {
    let request: GenerateQuizRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateQuizRequest::default()
    } else {
        serde_json::from_slice(body).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid quiz request body: {}", e),
            )
        })?
    };

    let defaults = QuizOptions::default();
    let difficulty = match request.difficulty {
        Some(raw) => QuizDifficulty::from_str(&raw).map_err(|e| (StatusCode::BAD_REQUEST, e))?,
        None => defaults.difficulty,
    };
    Ok(QuizOptions {
        question_count: request.num_questions.unwrap_or(defaults.question_count),
        difficulty,
    })
}

/// Generate a multiple-choice quiz from a stored note, replacing any existing one.
///
/// The body is optional; `numQuestions` must be between 1 and 20.
#[utoipa::path(
    post,
    path = "/notes/{id}/quiz",
    request_body(content = GenerateQuizRequest, description = "Optional quiz settings."),
    responses(
        (status = 200, description = "Quiz generated", body = GenerateQuizResponse),
        (status = 400, description = "Invalid question count or difficulty"),
        (status = 404, description = "No such note for this user"),
        (status = 502, description = "The model never returned a valid quiz"),
        (status = 503, description = "The model could not be reached")
    ),
    params(
        ("id" = Uuid, Path, description = "The note ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn generate_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(note_id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let options = quiz_options(&body)?;
    let note = app_state
        .repository
        .get_note(user_id, note_id)
        .await
        .map_err(|e| port_failure("Failed to load study notes", e))?;

    let (cancel, _guard) = request_cancellation();
    let source_text = format_note_content(&note.title, &note.chapters);
    let quiz = app_state
        .generator
        .generate_quiz(&source_text, options, &cancel)
        .await
        .into_result()
        .map_err(|e| pipeline_failure("Failed to generate quiz", e))?;

    app_state
        .repository
        .save_quiz(note_id, &quiz)
        .await
        .map_err(|e| port_failure("Failed to save quiz", e))?;

    Ok(Json(GenerateQuizResponse {
        success: true,
        message: "Quiz generated successfully".to_string(),
        quiz: convert(quiz),
    }))
}

/// Fetch the quiz stored for a note.
#[utoipa::path(
    get,
    path = "/notes/{id}/quiz",
    responses(
        (status = 200, description = "The stored quiz", body = QuizResponse),
        (status = 404, description = "No such note, or no quiz generated yet")
    ),
    params(
        ("id" = Uuid, Path, description = "The note ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(note_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let note = app_state
        .repository
        .get_note(user_id, note_id)
        .await
        .map_err(|e| port_failure("Failed to load quiz", e))?;

    if note.quiz.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            "No quiz found for this note".to_string(),
        ));
    }

    Ok(Json(QuizResponse {
        success: true,
        quiz: convert(note.quiz),
        quiz_generated_at: note.quiz_generated_at,
    }))
}

//=========================================================================================
// Stats Handler
//=========================================================================================

/// Summarize the caller's notes: totals, the last seven days of activity and
/// how many chapters their notes carry.
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Statistics for the caller's notes", body = StatsResponse),
        (status = 400, description = "Missing or invalid x-user-id header"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;
    let stats = app_state
        .repository
        .note_stats(user_id)
        .await
        .map_err(|e| port_failure("Failed to compute note statistics", e))?;

    Ok(Json(StatsResponse {
        success: true,
        stats: NoteStatsResponse::from(stats),
    }))
}
