//! crates/study_notes_core/src/pipeline/validate.rs
//!
//! Strict structural validation of extracted payloads.
//!
//! Each validator parses first (`GenerationError::Parse`) and then checks the
//! shape for its content kind (`GenerationError::Schema`), naming the element
//! that broke the rule. Validation never does I/O.

use std::ops::RangeInclusive;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{
    Chapter, Flashcard, QuizQuestion, StudyNoteDocument, CHAPTER_COUNT, QUIZ_OPTION_COUNT,
};
use crate::error::GenerationError;

pub const MIN_CHAPTER_CONTENT_CHARS: usize = 200;

/// The batch size flashcard prompts ask for. Only the lower bound of one is enforced.
pub const FLASHCARD_TARGET: RangeInclusive<usize> = 10..=15;

fn schema(reason: impl Into<String>) -> GenerationError {
    GenerationError::Schema(reason.into())
}

fn parse(text: &str) -> Result<Value, GenerationError> {
    serde_json::from_str(text).map_err(|e| GenerationError::Parse(e.to_string()))
}

/// A trimmed, non-empty string field.
fn text_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Whole numbers, including ones a model wrote as `1.0`.
fn whole_number(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

//=========================================================================================
// Notes
//=========================================================================================

pub fn validate_notes(text: &str) -> Result<StudyNoteDocument, GenerationError> {
    let value = parse(text)?;
    let object = value
        .as_object()
        .ok_or_else(|| schema("expected a JSON object at the top level"))?;

    let title = text_field(object, "title").ok_or_else(|| schema("invalid or missing title"))?;

    let raw_chapters = object
        .get("chapters")
        .and_then(Value::as_array)
        .ok_or_else(|| schema("invalid or missing chapters array"))?;
    if raw_chapters.len() != CHAPTER_COUNT {
        return Err(schema(format!(
            "expected exactly {} chapters, got {}",
            CHAPTER_COUNT,
            raw_chapters.len()
        )));
    }

    let mut seen_orders = [false; CHAPTER_COUNT];
    let mut chapters = Vec::with_capacity(CHAPTER_COUNT);

    for (index, raw) in raw_chapters.iter().enumerate() {
        let number = index + 1;
        let chapter = raw
            .as_object()
            .ok_or_else(|| schema(format!("chapter {} is not an object", number)))?;

        let title = text_field(chapter, "title")
            .ok_or_else(|| schema(format!("invalid title in chapter {}", number)))?;

        let content = chapter
            .get("content")
            .and_then(Value::as_str)
            .map(str::trim)
            .ok_or_else(|| schema(format!("missing content in chapter {}", number)))?;
        let length = content.chars().count();
        if length < MIN_CHAPTER_CONTENT_CHARS {
            return Err(schema(format!(
                "chapter {} content is too short ({} < {} characters)",
                number, length, MIN_CHAPTER_CONTENT_CHARS
            )));
        }
        if content.contains('[') && content.contains(']') {
            return Err(schema(format!(
                "chapter {} contains placeholder content",
                number
            )));
        }

        let order = chapter
            .get("order")
            .and_then(whole_number)
            .ok_or_else(|| schema(format!("invalid order in chapter {}", number)))?;
        if !(1..=CHAPTER_COUNT as u64).contains(&order) {
            return Err(schema(format!(
                "chapter {} has order {} outside 1..={}",
                number, order, CHAPTER_COUNT
            )));
        }
        let slot = &mut seen_orders[(order - 1) as usize];
        if *slot {
            return Err(schema(format!(
                "chapter {} repeats order {}",
                number, order
            )));
        }
        *slot = true;

        chapters.push(Chapter {
            title: title.to_string(),
            content: content.to_string(),
            order: order as u32,
        });
    }

    chapters.sort_by_key(|c| c.order);

    Ok(StudyNoteDocument {
        title: title.to_string(),
        chapters,
    })
}

//=========================================================================================
// Flashcards
//=========================================================================================

/// Keeps every card with a non-empty front and back; fails only if none survive.
pub fn validate_flashcards(text: &str) -> Result<Vec<Flashcard>, GenerationError> {
    let value = parse(text)?;
    let items = value
        .as_array()
        .ok_or_else(|| schema("expected a JSON array of flashcards"))?;

    let cards: Vec<Flashcard> = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let card = item.as_object().and_then(|card| {
                Some(Flashcard {
                    front: text_field(card, "front")?.to_string(),
                    back: text_field(card, "back")?.to_string(),
                })
            });
            if card.is_none() {
                debug!("Dropping invalid flashcard at index {}", index);
            }
            card
        })
        .collect();

    if cards.is_empty() {
        return Err(schema(format!(
            "no valid flashcards among {} generated item(s)",
            items.len()
        )));
    }
    if !FLASHCARD_TARGET.contains(&cards.len()) {
        warn!(
            "Generated {} flashcards, outside the target range of {}-{}",
            cards.len(),
            FLASHCARD_TARGET.start(),
            FLASHCARD_TARGET.end()
        );
    }

    Ok(cards)
}

//=========================================================================================
// Quiz
//=========================================================================================

/// All-or-nothing: a single bad question rejects the batch.
pub fn validate_quiz(text: &str, expected_count: u32) -> Result<Vec<QuizQuestion>, GenerationError> {
    let value = parse(text)?;
    let items = value
        .as_array()
        .ok_or_else(|| schema("expected a JSON array of questions"))?;

    if items.is_empty() {
        return Err(schema("no questions generated"));
    }
    if items.len() != expected_count as usize {
        return Err(schema(format!(
            "expected {} questions, got {}",
            expected_count,
            items.len()
        )));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| quiz_question(index, item))
        .collect()
}

fn quiz_question(index: usize, item: &Value) -> Result<QuizQuestion, GenerationError> {
    let object = item
        .as_object()
        .ok_or_else(|| schema(format!("question {} is not an object", index)))?;

    let question = text_field(object, "question")
        .ok_or_else(|| schema(format!("question {} is missing question text", index)))?;

    let raw_options = object
        .get("options")
        .and_then(Value::as_array)
        .ok_or_else(|| schema(format!("question {} options is not an array", index)))?;
    if raw_options.len() != QUIZ_OPTION_COUNT {
        return Err(schema(format!(
            "question {} does not have exactly {} options (got {})",
            index,
            QUIZ_OPTION_COUNT,
            raw_options.len()
        )));
    }
    let options = raw_options
        .iter()
        .map(|option| {
            option
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| schema(format!("question {} has a non-text or empty option", index)))?;

    let correct_answer = object
        .get("correctAnswer")
        .and_then(whole_number)
        .filter(|answer| *answer < QUIZ_OPTION_COUNT as u64)
        .ok_or_else(|| {
            schema(format!(
                "question {} has an invalid correctAnswer (expected an integer 0-{})",
                index,
                QUIZ_OPTION_COUNT - 1
            ))
        })?;

    let explanation = text_field(object, "explanation")
        .ok_or_else(|| schema(format!("question {} is missing explanation", index)))?;

    Ok(QuizQuestion {
        question: question.to_string(),
        options,
        correct_answer: correct_answer as u8,
        explanation: explanation.to_string(),
    })
}
