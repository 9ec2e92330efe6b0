//! crates/study_notes_core/src/pipeline/prompt.rs
//!
//! Instruction text sent to the model for each content kind.
//! Every builder is a pure function of its request.

use crate::domain::{Chapter, GenerationRequest, QuizDifficulty};

const NOTES_TEMPLATE: &str = r#"You are a professional educator creating comprehensive study notes. Generate detailed, educational study notes about "{topic}" for {subject} at {difficulty} level.

IMPORTANT: Generate a complete, detailed study guide. DO NOT use placeholders. Write out actual content, terms, examples, and explanations.
Keep each chapter concise but informative (around 500 words, never fewer than 200 characters).

The response must be a single valid JSON object with exactly this structure and no other text:
{
  "title": "Main title for the notes",
  "chapters": [
    {
      "title": "Chapter 1: Core Concepts and Definitions",
      "content": "Actual detailed content here...",
      "order": 1
    }
  ]
}

The "chapters" array must contain exactly 5 objects with "order" values 1, 2, 3, 4 and 5, in this order:

Chapter 1: Core Concepts and Definitions
- Clear introduction to the topic
- Key terms with examples
- Fundamental principles and basic formulas with explanations
- Common misconceptions

Chapter 2: Detailed Explanations and Examples
- Thorough explanations
- Step-by-step examples
- Real-world applications

Chapter 3: Problem-Solving Techniques
- Specific methods
- Example problems with solutions
- Common errors and corrections

Chapter 4: Practice Problems and Solutions
- A mix of practice problems
- Complete, step-by-step solutions

Chapter 5: Advanced Topics and Extensions
- Advanced applications
- Connections to other topics
- Study strategies

Requirements:
1. Every chapter has a non-empty "title", a "content" string and an integer "order".
2. Use proper mathematical notation written as LaTeX:
   Inline: $x = \\frac{-b \\pm \\sqrt{b^2 - 4ac}}{2a}$
   Display: $$\\int_0^\\infty e^{-x^2} dx = \\frac{\\sqrt{\\pi}}{2}$$
   Inside JSON strings every LaTeX backslash must be written as a double backslash.
3. Include worked examples.
4. Use clear language appropriate for {difficulty} level.
5. NO placeholders and NO square brackets anywhere in chapter content.

CRITICAL: Return ONLY the JSON object. Write actual content, never placeholders."#;

const FLASHCARDS_TEMPLATE: &str = r#"Create flashcards from this educational content. Each flashcard should test one key concept.

Content to process:
{content}

IMPORTANT:
1. Create between 10 and 15 high-quality flashcards.
2. Cover key concepts, definitions, and principles.
3. Make questions clear and specific; include "what", "how" and "why" questions.
4. Keep answers concise but complete (one to three sentences).
5. Include important formulas and their applications.
6. Use LaTeX for mathematics (e.g., $a^2 + b^2 = c^2$); inside JSON strings write every backslash as a double backslash.
7. Never leave "front" or "back" empty and never use placeholders.

The response must be a valid JSON array of objects with exactly this structure:
[
  {
    "front": "What is the question?",
    "back": "The complete answer"
  }
]

Return ONLY the JSON array, no additional text."#;

const QUIZ_TEMPLATE: &str = r#"You are an expert educator creating a quiz based on study notes. Generate exactly {count} multiple-choice questions at {difficulty} difficulty level from the following study notes:

{content}

IMPORTANT: Generate challenging but fair questions that test understanding, not just memorization.
Each question must have exactly 4 options with only one correct answer.
"correctAnswer" is the 0-based index of the correct option (0, 1, 2 or 3).
Every question needs a non-empty "explanation".
Include a mix of conceptual and application questions.
DO NOT use LaTeX math delimiters ($). Write mathematical expressions in plain text.

The response must be a valid JSON array of exactly {count} question objects with this structure:
[
  {
    "question": "The actual question text",
    "options": ["Option A", "Option B", "Option C", "Option D"],
    "correctAnswer": 0,
    "explanation": "Detailed explanation of why this is the correct answer"
  }
]

Guidelines for difficulty levels:
- Easy: Basic recall and simple concept application
- Medium: Understanding relationships and moderate problem-solving
- Hard: Complex analysis, evaluation, and advanced applications

This quiz is {difficulty}: {guideline}

Return ONLY the JSON array, no additional text."#;

/// Builds the instruction text for a request.
pub fn build_prompt(request: &GenerationRequest) -> String {
    match request {
        GenerationRequest::Notes {
            topic,
            subject,
            difficulty_level,
        } => notes_prompt(topic, subject, difficulty_level),
        GenerationRequest::Flashcards { source_text } => flashcards_prompt(source_text),
        GenerationRequest::Quiz {
            source_text,
            question_count,
            difficulty,
        } => quiz_prompt(source_text, *question_count, *difficulty),
    }
}

/// Replaces every `{name}` slot of `template` in a single pass.
///
/// Substituted text is never scanned again, so user input that happens to
/// contain a slot name stays literal. Unknown `{...}` sequences are kept.
pub(crate) fn fill_slots(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let slot = slots
            .iter()
            .find(|(name, _)| tail.starts_with(name) && tail[name.len()..].starts_with('}'));
        match slot {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn notes_prompt(topic: &str, subject: &str, difficulty: &str) -> String {
    fill_slots(
        NOTES_TEMPLATE,
        &[("topic", topic), ("subject", subject), ("difficulty", difficulty)],
    )
}

fn flashcards_prompt(source_text: &str) -> String {
    fill_slots(FLASHCARDS_TEMPLATE, &[("content", source_text)])
}

fn quiz_prompt(source_text: &str, question_count: u32, difficulty: QuizDifficulty) -> String {
    let guideline = match difficulty {
        QuizDifficulty::Easy => "focus on basic recall and simple concept application.",
        QuizDifficulty::Medium => {
            "focus on relationships between ideas and moderate problem-solving."
        }
        QuizDifficulty::Hard => "focus on complex analysis, evaluation, and advanced applications.",
    };

    let count = question_count.to_string();
    fill_slots(
        QUIZ_TEMPLATE,
        &[
            ("count", count.as_str()),
            ("difficulty", difficulty.as_str()),
            ("guideline", guideline),
            ("content", source_text),
        ],
    )
}

/// Renders a stored note as the source text for flashcards and quizzes.
///
/// Chapters are written in `order`, each as its title followed by its content.
pub fn format_note_content(title: &str, chapters: &[Chapter]) -> String {
    let mut sorted: Vec<&Chapter> = chapters.iter().collect();
    sorted.sort_by_key(|c| c.order);

    let body = sorted
        .iter()
        .map(|c| format!("{}\n{}", c.title, c.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    if title.trim().is_empty() {
        body
    } else {
        format!("Title: {}\n\n{}", title, body)
    }
}
