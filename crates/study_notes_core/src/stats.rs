//! crates/study_notes_core/src/stats.rs
//!
//! Per-user activity statistics, folded from one small record per stored note.
//! Repositories only gather the per-note counts; the arithmetic lives here so
//! every backend reports the same numbers.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Length of the daily activity window, today included.
pub const ACTIVITY_WINDOW_DAYS: u64 = 7;

/// The counts a repository reports for one note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteCounts {
    /// UTC calendar day the note was created on.
    pub created_on: NaiveDate,
    pub chapter_count: u32,
    pub flashcard_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteStats {
    pub total_notes: u64,
    pub total_chapters: u64,
    pub notes_with_flashcards: u64,
    pub total_flashcards: u64,
    /// One entry per day of the activity window, oldest first.
    pub notes_per_day: Vec<DailyCount>,
    /// Chapter count -> number of notes with that many chapters.
    pub chapter_distribution: BTreeMap<u32, u64>,
    /// Rounded to one decimal; 0 without notes.
    pub average_chapters_per_note: f64,
    /// Percentage of notes with flashcards, rounded to one decimal; 0 without notes.
    pub flashcard_completion_rate: f64,
}

impl NoteStats {
    /// Folds per-note counts into statistics, with the activity window ending on `today`.
    pub fn from_counts(notes: &[NoteCounts], today: NaiveDate) -> Self {
        let total_notes = notes.len() as u64;
        let total_chapters: u64 = notes.iter().map(|n| u64::from(n.chapter_count)).sum();
        let total_flashcards: u64 = notes.iter().map(|n| u64::from(n.flashcard_count)).sum();
        let notes_with_flashcards = notes.iter().filter(|n| n.flashcard_count > 0).count() as u64;

        let mut chapter_distribution = BTreeMap::new();
        for note in notes {
            *chapter_distribution.entry(note.chapter_count).or_insert(0) += 1;
        }

        let notes_per_day = (0..ACTIVITY_WINDOW_DAYS)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .map(|date| DailyCount {
                date,
                count: notes.iter().filter(|n| n.created_on == date).count() as u64,
            })
            .collect();

        Self {
            total_notes,
            total_chapters,
            notes_with_flashcards,
            total_flashcards,
            notes_per_day,
            chapter_distribution,
            average_chapters_per_note: ratio(total_chapters as f64, total_notes),
            flashcard_completion_rate: ratio(notes_with_flashcards as f64 * 100.0, total_notes),
        }
    }
}

fn ratio(numerator: f64, total_notes: u64) -> f64 {
    if total_notes == 0 {
        return 0.0;
    }
    round_to_tenth(numerator / total_notes as f64)
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn note(created_on: NaiveDate, chapters: u32, flashcards: u32) -> NoteCounts {
        NoteCounts {
            created_on,
            chapter_count: chapters,
            flashcard_count: flashcards,
        }
    }

    #[test]
    fn no_notes_gives_zeroes_and_an_empty_week() {
        let stats = NoteStats::from_counts(&[], day(10));
        assert_eq!(stats.total_notes, 0);
        assert_eq!(stats.average_chapters_per_note, 0.0);
        assert_eq!(stats.flashcard_completion_rate, 0.0);
        assert!(stats.chapter_distribution.is_empty());
        assert_eq!(stats.notes_per_day.len(), 7);
        assert!(stats.notes_per_day.iter().all(|d| d.count == 0));
    }

    #[test]
    fn totals_distribution_and_rates() {
        let notes = [
            note(day(10), 5, 12),
            note(day(10), 5, 0),
            note(day(9), 4, 10),
        ];
        let stats = NoteStats::from_counts(&notes, day(10));

        assert_eq!(stats.total_notes, 3);
        assert_eq!(stats.total_chapters, 14);
        assert_eq!(stats.total_flashcards, 22);
        assert_eq!(stats.notes_with_flashcards, 2);
        assert_eq!(stats.chapter_distribution, BTreeMap::from([(4, 1), (5, 2)]));
        // 14 / 3 = 4.666..., 2 / 3 = 66.666...%
        assert_eq!(stats.average_chapters_per_note, 4.7);
        assert_eq!(stats.flashcard_completion_rate, 66.7);
    }

    #[test]
    fn activity_window_is_the_last_seven_days_oldest_first() {
        let notes = [
            note(day(10), 5, 0),
            note(day(4), 5, 0),
            note(day(4), 5, 0),
            note(day(3), 5, 0),
        ];
        let stats = NoteStats::from_counts(&notes, day(10));

        let dates: Vec<NaiveDate> = stats.notes_per_day.iter().map(|d| d.date).collect();
        assert_eq!(dates, (4..=10).map(day).collect::<Vec<_>>());
        let counts: Vec<u64> = stats.notes_per_day.iter().map(|d| d.count).collect();
        assert_eq!(counts, vec![2, 0, 0, 0, 0, 0, 1]);
        // Notes outside the window still count towards the totals.
        assert_eq!(stats.total_notes, 4);
    }

    #[test]
    fn serializes_with_iso_dates_and_camel_case_keys() {
        let stats = NoteStats::from_counts(&[note(day(10), 5, 3)], day(10));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["notesPerDay"][6]["date"], "2024-03-10");
        assert_eq!(json["chapterDistribution"]["5"], 1);
        assert_eq!(json["flashcardCompletionRate"], 100.0);
    }
}
