//! crates/study_notes_core/src/pipeline/fallback.rs
//!
//! Template notes used when the model never produced a valid document.
//! The output is a pure function of its inputs and always passes
//! [`validate_notes`](super::validate::validate_notes).

use crate::domain::{Chapter, StudyNoteDocument};
use crate::pipeline::prompt::fill_slots;

/// Chapter themes of the fallback skeleton, in order.
pub const FALLBACK_CHAPTER_TITLES: [&str; 5] = [
    "Introduction and Fundamentals",
    "Core Concepts",
    "Advanced Applications",
    "Problem-Solving Strategies",
    "Review and Summary",
];

const FALLBACK_CHAPTER_BODIES: [&str; 5] = [
    "This chapter introduces {topic} as it is studied in {subject} at the {difficulty} level. \
     Start by writing down the key terms that appear whenever {topic} is discussed and the basic \
     principles that connect them. Make sure you can state each definition in your own words and \
     give one simple example for every term before moving on to the next chapter.",
    "The core concepts of {topic} build directly on the fundamentals. In {subject}, these ideas \
     are usually presented as a small set of rules or relationships that can be combined to \
     explain more complex situations. At the {difficulty} level, focus on why each rule holds, \
     how the rules relate to each other, and which common misconceptions lead students astray.",
    "Once the core ideas of {topic} are familiar, they can be applied to richer problems. This \
     chapter looks at how {topic} connects to other areas of {subject} and where it appears in \
     real-world situations. Work through applications appropriate for the {difficulty} level and \
     note the assumptions each application relies on, since those assumptions often decide the method.",
    "Solving problems about {topic} is easier with a repeatable strategy. Read the problem \
     carefully, identify what is given and what is asked, choose the relevant principle from \
     {subject}, and carry out the steps one at a time. Check every answer for reasonableness, and \
     keep a list of the mistakes you make so you can avoid them in future {difficulty} level exercises.",
    "This final chapter reviews {topic}. Summarize the definitions, core concepts, applications \
     and problem-solving strategies from the earlier chapters on a single page. Test yourself by \
     explaining {topic} to someone else without notes, then revisit any part of {subject} that felt \
     unclear. Regular short review sessions at the {difficulty} level are more effective than one long session.",
];

/// Square brackets would read as placeholders, so request text swaps them for parentheses.
fn bracket_free(text: &str) -> String {
    text.replace('[', "(").replace(']', ")")
}

/// Builds a five-chapter study note document from the fixed template.
pub fn fallback_notes(topic: &str, subject: &str, difficulty: &str) -> StudyNoteDocument {
    let (topic, subject, difficulty) = (
        bracket_free(topic),
        bracket_free(subject),
        bracket_free(difficulty),
    );
    let fill = |template: &str| {
        fill_slots(
            template,
            &[
                ("topic", topic.as_str()),
                ("subject", subject.as_str()),
                ("difficulty", difficulty.as_str()),
            ],
        )
    };

    let chapters = FALLBACK_CHAPTER_TITLES
        .iter()
        .zip(FALLBACK_CHAPTER_BODIES.iter())
        .enumerate()
        .map(|(index, (title, body))| Chapter {
            title: format!("Chapter {}: {}", index + 1, title),
            content: fill(*body),
            order: index as u32 + 1,
        })
        .collect();

    StudyNoteDocument {
        title: format!("{}: Study Notes", topic),
        chapters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::validate::validate_notes;

    #[test]
    fn fallback_is_deterministic() {
        let a = fallback_notes("Pythagorean theorem", "Mathematics", "Grade 10-11");
        let b = fallback_notes("Pythagorean theorem", "Mathematics", "Grade 10-11");
        assert_eq!(a, b);
    }

    #[test]
    fn fallback_substitutes_request_fields() {
        let notes = fallback_notes("Pythagorean theorem", "Mathematics", "Grade 10-11");
        assert_eq!(notes.title, "Pythagorean theorem: Study Notes");
        for chapter in &notes.chapters {
            assert!(chapter.content.contains("Pythagorean theorem"));
            assert!(chapter.content.contains("Mathematics"));
            assert!(chapter.content.contains("Grade 10-11"));
            assert!(!chapter.content.contains('{'));
        }
        assert_eq!(
            notes.chapters[0].title,
            "Chapter 1: Introduction and Fundamentals"
        );
        assert_eq!(notes.chapters[4].title, "Chapter 5: Review and Summary");
    }

    #[test]
    fn bracketed_request_text_still_validates() {
        let notes = fallback_notes("Arrays [Data Structures]", "Computer [Science]", "Intro");
        let json = serde_json::to_string(&notes).unwrap();
        assert_eq!(validate_notes(&json).unwrap(), notes);
        assert!(notes.chapters[0].content.contains("Arrays (Data Structures)"));
        assert_eq!(notes.title, "Arrays (Data Structures): Study Notes");
    }

    #[test]
    fn slot_names_in_the_topic_are_not_expanded() {
        let notes = fallback_notes("Sets {difficulty}", "Mathematics", "Grade 9");
        assert!(notes.chapters[0].content.contains("Sets {difficulty}"));
        assert!(!notes.chapters[0].content.contains("Sets Grade 9"));
    }

    #[test]
    fn fallback_passes_notes_validation_even_for_short_inputs() {
        let notes = fallback_notes("x", "y", "z");
        let json = serde_json::to_string(&notes).unwrap();
        assert_eq!(validate_notes(&json).unwrap(), notes);
    }
}
