//! crates/study_notes_core/src/pipeline/generator.rs
//!
//! The orchestration layer: builds the prompt, calls the model through the retry
//! controller, extracts and validates the reply, and falls back to template notes
//! when every attempt failed.
//!
//! Per attempt the pipeline moves through
//! `Building -> Requesting -> Extracting -> Validating -> Done`. A failure at any
//! step goes back through the retry controller; once attempts run out the run
//! ends `Degrading` (notes) or `Failed`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{
    ContentKind, Flashcard, GeneratedContent, GenerationRequest, QuizOptions, QuizQuestion,
    StudyNoteDocument, MAX_QUESTION_COUNT,
};
use crate::error::{GenerationError, PipelineError, PipelineResult};
use crate::pipeline::client::{GenerationClient, DEFAULT_CALL_TIMEOUT};
use crate::pipeline::extract::{extract, ShapeHint};
use crate::pipeline::fallback::fallback_notes;
use crate::pipeline::prompt;
use crate::pipeline::retry::{with_retry, RetryError, RetryPolicy};
use crate::pipeline::validate::{validate_flashcards, validate_notes, validate_quiz};
use crate::ports::{GenerationConfig, TextGenerationService};

//=========================================================================================
// Outcome and Settings
//=========================================================================================

/// The result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome<T> {
    /// Validated model output.
    Success(T),
    /// Template content used after every attempt failed.
    Degraded(T),
    Failure(PipelineError),
}

impl<T> GenerationOutcome<T> {
    pub fn into_result(self) -> PipelineResult<T> {
        match self {
            GenerationOutcome::Success(value) | GenerationOutcome::Degraded(value) => Ok(value),
            GenerationOutcome::Failure(e) => Err(e),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, GenerationOutcome::Degraded(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> GenerationOutcome<U> {
        match self {
            GenerationOutcome::Success(value) => GenerationOutcome::Success(f(value)),
            GenerationOutcome::Degraded(value) => GenerationOutcome::Degraded(f(value)),
            GenerationOutcome::Failure(e) => GenerationOutcome::Failure(e),
        }
    }
}

/// Invocation-scoped knobs; nothing here is process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub retry: RetryPolicy,
    /// Upper bound on a single upstream call.
    pub call_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Building,
    Requesting,
    Extracting,
    Validating,
    Done,
    Degrading,
    Failed,
}

fn transition(kind: ContentKind, attempt: u32, state: PipelineState) {
    debug!("[{} attempt {}] -> {:?}", kind, attempt, state);
}

//=========================================================================================
// The Generator
//=========================================================================================

/// Turns topic and source-text requests into validated study material.
///
/// Holds no per-request state, so one instance can be shared behind an `Arc`
/// by any number of concurrent callers.
#[derive(Clone)]
pub struct StudyMaterialGenerator {
    service: Arc<dyn TextGenerationService>,
    settings: PipelineSettings,
}

impl StudyMaterialGenerator {
    pub fn new(service: Arc<dyn TextGenerationService>, settings: PipelineSettings) -> Self {
        Self { service, settings }
    }

    fn client(&self, config: GenerationConfig) -> GenerationClient {
        GenerationClient::new(self.service.clone(), config, self.settings.call_timeout)
    }

    /// Generates five-chapter study notes.
    ///
    /// When every attempt fails the template notes are returned as `Degraded`;
    /// only an invalid request or cancellation yields `Failure`.
    pub async fn generate_study_notes(
        &self,
        topic: &str,
        subject: &str,
        difficulty: &str,
        cancel: &CancellationToken,
    ) -> GenerationOutcome<StudyNoteDocument> {
        let (topic, subject, difficulty) = (topic.trim(), subject.trim(), difficulty.trim());
        if let Err(e) = require_text(&[
            ("topic", topic),
            ("subject", subject),
            ("difficulty", difficulty),
        ]) {
            return GenerationOutcome::Failure(e);
        }

        info!(
            "Generating study notes on '{}' ({}, {})",
            topic, subject, difficulty
        );
        let prompt = prompt::build_prompt(&GenerationRequest::Notes {
            topic: topic.to_string(),
            subject: subject.to_string(),
            difficulty_level: difficulty.to_string(),
        });
        let client = self.client(GenerationConfig::notes());

        match self
            .run(ContentKind::Notes, &client, &prompt, cancel, ShapeHint::Object, validate_notes)
            .await
        {
            Ok(notes) => GenerationOutcome::Success(notes),
            Err(PipelineError::Exhausted { attempts, last }) => {
                transition(ContentKind::Notes, attempts, PipelineState::Degrading);
                warn!(
                    "Study notes on '{}' fell back to template content after {} attempt(s): {}",
                    topic, attempts, last
                );
                GenerationOutcome::Degraded(fallback_notes(topic, subject, difficulty))
            }
            Err(e) => GenerationOutcome::Failure(e),
        }
    }

    /// Generates flashcards from the given source text. Invalid cards are dropped.
    pub async fn generate_flashcards(
        &self,
        source_text: &str,
        cancel: &CancellationToken,
    ) -> GenerationOutcome<Vec<Flashcard>> {
        if let Err(e) = require_text(&[("source text", source_text.trim())]) {
            return GenerationOutcome::Failure(e);
        }

        info!(
            "Generating flashcards from {} characters of source text",
            source_text.chars().count()
        );
        let prompt = prompt::build_prompt(&GenerationRequest::Flashcards {
            source_text: source_text.to_string(),
        });
        let client = self.client(GenerationConfig::flashcards());

        self.run(
            ContentKind::Flashcards,
            &client,
            &prompt,
            cancel,
            ShapeHint::Array,
            validate_flashcards,
        )
        .await
        .into()
    }

    /// Generates a multiple-choice quiz of exactly `options.question_count` questions.
    pub async fn generate_quiz(
        &self,
        source_text: &str,
        options: QuizOptions,
        cancel: &CancellationToken,
    ) -> GenerationOutcome<Vec<QuizQuestion>> {
        if let Err(e) = require_text(&[("source text", source_text.trim())]) {
            return GenerationOutcome::Failure(e);
        }
        if !(1..=MAX_QUESTION_COUNT).contains(&options.question_count) {
            return GenerationOutcome::Failure(PipelineError::InvalidRequest(format!(
                "question count must be between 1 and {}, got {}",
                MAX_QUESTION_COUNT, options.question_count
            )));
        }

        info!(
            "Generating {} {} quiz question(s)",
            options.question_count, options.difficulty
        );
        let prompt = prompt::build_prompt(&GenerationRequest::Quiz {
            source_text: source_text.to_string(),
            question_count: options.question_count,
            difficulty: options.difficulty,
        });
        let client = self.client(GenerationConfig::quiz());
        let expected = options.question_count;

        self.run(
            ContentKind::Quiz,
            &client,
            &prompt,
            cancel,
            ShapeHint::Array,
            |text| validate_quiz(text, expected),
        )
        .await
        .into()
    }

    /// Dispatches a [`GenerationRequest`] to the matching operation.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> GenerationOutcome<GeneratedContent> {
        match request {
            GenerationRequest::Notes {
                topic,
                subject,
                difficulty_level,
            } => self
                .generate_study_notes(topic, subject, difficulty_level, cancel)
                .await
                .map(GeneratedContent::Notes),
            GenerationRequest::Flashcards { source_text } => self
                .generate_flashcards(source_text, cancel)
                .await
                .map(GeneratedContent::Flashcards),
            GenerationRequest::Quiz {
                source_text,
                question_count,
                difficulty,
            } => {
                let options = QuizOptions {
                    question_count: *question_count,
                    difficulty: *difficulty,
                };
                self.generate_quiz(source_text, options, cancel)
                    .await
                    .map(GeneratedContent::Quiz)
            }
        }
    }

    /// Request -> extract -> validate, retried as a whole under the retry policy.
    async fn run<T, F>(
        &self,
        kind: ContentKind,
        client: &GenerationClient,
        prompt: &str,
        cancel: &CancellationToken,
        shape: ShapeHint,
        validate: F,
    ) -> PipelineResult<T>
    where
        F: Fn(&str) -> Result<T, GenerationError> + Sync,
    {
        transition(kind, 1, PipelineState::Building);

        let result = with_retry(&self.settings.retry, cancel, |attempt| {
            let validate = &validate;
            async move {
                transition(kind, attempt, PipelineState::Requesting);
                let raw = client.generate(prompt).await?;

                transition(kind, attempt, PipelineState::Extracting);
                let payload = extract(&raw, shape)?;

                transition(kind, attempt, PipelineState::Validating);
                let value = validate(&payload)?;

                transition(kind, attempt, PipelineState::Done);
                Ok::<T, GenerationError>(value)
            }
        })
        .await;

        match result {
            Ok(value) => Ok(value),
            Err(RetryError::Exhausted { attempts, last }) => {
                transition(kind, attempts, PipelineState::Failed);
                Err(PipelineError::Exhausted { attempts, last })
            }
            Err(RetryError::Cancelled) => {
                info!("{} generation cancelled by caller", kind);
                Err(PipelineError::Cancelled)
            }
        }
    }
}

impl<T> From<PipelineResult<T>> for GenerationOutcome<T> {
    fn from(result: PipelineResult<T>) -> Self {
        match result {
            Ok(value) => GenerationOutcome::Success(value),
            Err(e) => GenerationOutcome::Failure(e),
        }
    }
}

/// Client-input errors are rejected before any upstream call and never retried.
fn require_text(fields: &[(&str, &str)]) -> PipelineResult<()> {
    match fields.iter().find(|(_, value)| value.is_empty()) {
        Some((name, _)) => Err(PipelineError::InvalidRequest(format!(
            "{} must not be empty",
            name
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuizDifficulty;
    use crate::pipeline::fallback::FALLBACK_CHAPTER_TITLES;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted replies in order; the last one repeats once the script runs out.
    struct ScriptedService {
        replies: Mutex<VecDeque<Result<String, String>>>,
        last: Mutex<Option<Result<String, String>>>,
        calls: Mutex<Vec<GenerationConfig>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(replies: Vec<Result<String, String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                last: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn always(reply: &str) -> Arc<Self> {
            Self::new(vec![Ok(reply.to_string())])
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerationService for ScriptedService {
        async fn generate_content(
            &self,
            prompt: &str,
            config: &GenerationConfig,
        ) -> PortResult<String> {
            self.calls.lock().unwrap().push(*config);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = self.replies.lock().unwrap().pop_front();
            let reply = match next {
                Some(reply) => {
                    *self.last.lock().unwrap() = Some(reply.clone());
                    reply
                }
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| Err("script is empty".to_string())),
            };
            reply.map_err(PortError::Unexpected)
        }
    }

    fn generator(service: Arc<ScriptedService>) -> StudyMaterialGenerator {
        StudyMaterialGenerator::new(service, PipelineSettings::default())
    }

    fn notes_reply() -> String {
        let chapters: Vec<Value> = (1..=5)
            .map(|n| {
                json!({
                    "title": format!("Chapter {}", n),
                    "content": format!(
                        "For a right triangle $a^2 + b^2 = c^2$ and this chapter {} works through it. ",
                        n
                    )
                    .repeat(4),
                    "order": n,
                })
            })
            .collect();
        format!(
            "Here are your notes:\n```json\n{}\n```",
            serde_json::to_string_pretty(&json!({ "title": "Right Triangles", "chapters": chapters }))
                .unwrap()
        )
    }

    fn flashcards_reply(count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| json!({ "front": format!("Question {}?", i), "back": format!("Answer {}.", i) }))
            .collect()
    }

    fn quiz_item(options: usize) -> Value {
        json!({
            "question": "What is 3^2 + 4^2?",
            "options": (0..options).map(|i| format!("{}", 20 + i)).collect::<Vec<_>>(),
            "correctAnswer": 1,
            "explanation": "9 + 16 = 25.",
        })
    }

    #[tokio::test]
    async fn every_operation_sends_the_built_prompt() {
        let options = QuizOptions {
            question_count: 1,
            difficulty: QuizDifficulty::Hard,
        };
        let service = ScriptedService::new(vec![
            Ok(notes_reply()),
            Ok(Value::Array(flashcards_reply(10)).to_string()),
            Ok(Value::Array(vec![quiz_item(4)]).to_string()),
        ]);
        let generator = generator(service.clone());
        let cancel = CancellationToken::new();
        generator
            .generate_study_notes("Right triangles", "Mathematics", "Grade 9", &cancel)
            .await;
        generator.generate_flashcards("Some notes", &cancel).await;
        generator.generate_quiz("Some notes", options, &cancel).await;

        let expected = vec![
            prompt::build_prompt(&GenerationRequest::Notes {
                topic: "Right triangles".to_string(),
                subject: "Mathematics".to_string(),
                difficulty_level: "Grade 9".to_string(),
            }),
            prompt::build_prompt(&GenerationRequest::Flashcards {
                source_text: "Some notes".to_string(),
            }),
            prompt::build_prompt(&GenerationRequest::Quiz {
                source_text: "Some notes".to_string(),
                question_count: 1,
                difficulty: QuizDifficulty::Hard,
            }),
        ];
        assert_eq!(*service.prompts.lock().unwrap(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn notes_success_has_five_chapters_in_order() {
        let service = ScriptedService::always(&notes_reply());
        let outcome = generator(service.clone())
            .generate_study_notes("Right triangles", "Mathematics", "Grade 9", &CancellationToken::new())
            .await;

        let notes = match outcome {
            GenerationOutcome::Success(notes) => notes,
            other => panic!("unexpected outcome: {:?}", other),
        };
        let orders: Vec<u32> = notes.chapters.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
        assert!(notes.chapters.iter().all(|c| c.content.chars().count() >= 200));
        assert_eq!(service.call_count(), 1);
        assert_eq!(service.calls.lock().unwrap()[0], GenerationConfig::notes());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_notes_degrade_to_the_template_after_all_attempts() {
        let service = ScriptedService::always(r#"{"title": "Pythagorean theorem", "chapters": [ {"title": "#);
        let outcome = generator(service.clone())
            .generate_study_notes(
                "Pythagorean theorem",
                "Mathematics",
                "Grade 10-11",
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_degraded());
        let notes = outcome.into_result().unwrap();
        assert_eq!(service.call_count(), 3);
        assert_eq!(notes.chapters.len(), 5);
        for (chapter, template) in notes.chapters.iter().zip(FALLBACK_CHAPTER_TITLES) {
            assert!(chapter.title.ends_with(template));
            assert!(chapter.content.contains("Pythagorean theorem"));
            assert!(chapter.content.contains("Mathematics"));
            assert!(chapter.content.contains("Grade 10-11"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_bad_first_reply_is_retried_after_one_second() {
        let service = ScriptedService::new(vec![
            Ok("I cannot help with that.".to_string()),
            Err("503 Service Unavailable".to_string()),
            Ok(notes_reply()),
        ]);
        let start = Instant::now();
        let outcome = generator(service.clone())
            .generate_study_notes("Right triangles", "Mathematics", "Grade 9", &CancellationToken::new())
            .await;

        assert!(matches!(outcome, GenerationOutcome::Success(_)));
        assert_eq!(service.call_count(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn single_backslash_latex_notes_validate_end_to_end() {
        let content = r"The quadratic formula is $x = \frac{-b \pm \sqrt{b^2 - 4ac}}{2a}$ and it solves every quadratic equation. ".repeat(3);
        let chapters: Vec<String> = (1..=5)
            .map(|n| format!(r#"{{"title": "Chapter {}", "content": "{}", "order": {}}}"#, n, content, n))
            .collect();
        let reply = format!(r#"{{"title": "Quadratics", "chapters": [{}]}}"#, chapters.join(", "));

        let notes = generator(ScriptedService::always(&reply))
            .generate_study_notes("Quadratics", "Mathematics", "Grade 10", &CancellationToken::new())
            .await
            .into_result()
            .unwrap();
        assert!(notes.chapters[0].content.contains(r"\frac{-b \pm \sqrt{b^2 - 4ac}}{2a}"));
    }

    #[tokio::test(start_paused = true)]
    async fn flashcards_drop_the_invalid_card() {
        let mut cards = flashcards_reply(12);
        cards[4]["back"] = json!("   ");
        let reply = format!("Here you go: {}", Value::Array(cards));

        let outcome = generator(ScriptedService::always(&reply))
            .generate_flashcards("Cells are the unit of life.", &CancellationToken::new())
            .await;

        let cards = match outcome {
            GenerationOutcome::Success(cards) => cards,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(cards.len(), 11);
        assert!(cards.iter().all(|c| !c.front.trim().is_empty() && !c.back.trim().is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn flashcards_fail_with_the_last_reason_after_exhaustion() {
        let service = ScriptedService::always(r#"[{"front": "", "back": ""}]"#);
        let outcome = generator(service.clone())
            .generate_flashcards("Cells are the unit of life.", &CancellationToken::new())
            .await;

        match outcome {
            GenerationOutcome::Failure(PipelineError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, GenerationError::Schema(_)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(service.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn quiz_with_a_three_option_question_is_retried_not_truncated() {
        let mut bad: Vec<Value> = (0..5).map(|_| quiz_item(4)).collect();
        bad[2] = quiz_item(3);
        let good: Vec<Value> = (0..5).map(|_| quiz_item(4)).collect();
        let service = ScriptedService::new(vec![
            Ok(Value::Array(bad).to_string()),
            Ok(Value::Array(good).to_string()),
        ]);

        let quiz = generator(service.clone())
            .generate_quiz(
                "Pythagorean triples",
                QuizOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .into_result()
            .unwrap();

        assert_eq!(service.call_count(), 2);
        assert_eq!(quiz.len(), 5);
        assert!(quiz.iter().all(|q| q.options.len() == 4 && q.correct_answer <= 3));
        assert!(service
            .calls
            .lock()
            .unwrap()
            .iter()
            .all(|config| *config == GenerationConfig::quiz()));
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_the_model() {
        let service = ScriptedService::always(&notes_reply());
        let generator = generator(service.clone());
        let cancel = CancellationToken::new();

        let notes = generator
            .generate_study_notes("  ", "Mathematics", "Grade 9", &cancel)
            .await;
        assert!(matches!(
            notes,
            GenerationOutcome::Failure(PipelineError::InvalidRequest(ref m)) if m.contains("topic")
        ));

        let quiz = generator
            .generate_quiz(
                "notes",
                QuizOptions {
                    question_count: 0,
                    difficulty: QuizDifficulty::Easy,
                },
                &cancel,
            )
            .await;
        assert!(matches!(
            quiz,
            GenerationOutcome::Failure(PipelineError::InvalidRequest(_))
        ));

        let cards = generator.generate_flashcards("\n", &cancel).await;
        assert!(matches!(
            cards,
            GenerationOutcome::Failure(PipelineError::InvalidRequest(_))
        ));
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_notes_request_fails_instead_of_degrading() {
        let service = ScriptedService::always("garbage");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = generator(service.clone())
            .generate_study_notes("Cells", "Biology", "Intro", &cancel)
            .await;

        assert_eq!(outcome, GenerationOutcome::Failure(PipelineError::Cancelled));
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_and_concurrent_invocations_are_independent() {
        let notes_service = ScriptedService::always(&notes_reply());
        let cards_service =
            ScriptedService::always(&Value::Array(flashcards_reply(10)).to_string());
        let notes_generator = generator(notes_service.clone());
        let cards_generator = generator(cards_service.clone());
        let cancel = CancellationToken::new();

        let notes_request = GenerationRequest::Notes {
            topic: "Right triangles".to_string(),
            subject: "Mathematics".to_string(),
            difficulty_level: "Grade 9".to_string(),
        };
        let cards_request = GenerationRequest::Flashcards {
            source_text: "Triangles have three sides.".to_string(),
        };

        let (notes, cards) = futures::future::join(
            notes_generator.generate(&notes_request, &cancel),
            cards_generator.generate(&cards_request, &cancel),
        )
        .await;

        assert!(matches!(
            notes,
            GenerationOutcome::Success(GeneratedContent::Notes(ref n)) if n.chapters.len() == 5
        ));
        assert!(matches!(
            cards,
            GenerationOutcome::Success(GeneratedContent::Flashcards(ref c)) if c.len() == 10
        ));
        assert_eq!(notes_service.call_count(), 1);
        assert_eq!(cards_service.call_count(), 1);
    }
}
