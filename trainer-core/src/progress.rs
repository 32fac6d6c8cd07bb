//! # Exercise Progress Module
//!
//! Holds position, score, and per-note outcomes for one run of one
//! exercise. The tracker never advances itself and never re-evaluates a
//! finalized note; the arbitration state machine drives it.

use crate::exercise::Exercise;
use crate::music::MusicalNote;
use crate::tuning;

/// Classification of one note within a run.
///
/// `Correct` and `Incorrect` are final for the rest of the run;
/// `Attempting` marks the current note after a mismatched attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteOutcome {
    #[default]
    Unset,
    Correct,
    Incorrect,
    Attempting,
}

impl NoteOutcome {
    pub fn is_final(self) -> bool {
        matches!(self, NoteOutcome::Correct | NoteOutcome::Incorrect)
    }
}

/// Mutable state of one exercise run.
///
/// The index runs from 0 to the note count inclusive; reaching the count
/// means the run is complete. It only moves forward, except on [`reset`].
///
/// [`reset`]: ProgressTracker::reset
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    notes: Vec<MusicalNote>,
    index: usize,
    correct: usize,
    outcomes: Vec<NoteOutcome>,
    tolerance_cents: f32,
}

impl ProgressTracker {
    pub fn new(exercise: &Exercise) -> ProgressTracker {
        ProgressTracker::with_tolerance(exercise, tuning::DEFAULT_TOLERANCE_CENTS)
    }

    pub fn with_tolerance(exercise: &Exercise, tolerance_cents: f32) -> ProgressTracker {
        ProgressTracker::from_notes(exercise.flattened_notes(), tolerance_cents)
    }

    /// Builds a tracker over an already-flattened note sequence.
    pub fn from_notes(notes: Vec<MusicalNote>, tolerance_cents: f32) -> ProgressTracker {
        let outcomes = vec![NoteOutcome::Unset; notes.len()];
        ProgressTracker {
            notes,
            index: 0,
            correct: 0,
            outcomes,
            tolerance_cents,
        }
    }

    /// The note at the current index, or `None` once the run is complete.
    pub fn current_note(&self) -> Option<&MusicalNote> {
        self.notes.get(self.index)
    }

    pub fn note_at(&self, index: usize) -> Option<&MusicalNote> {
        self.notes.get(index)
    }

    pub fn notes(&self) -> &[MusicalNote] {
        &self.notes
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total_notes(&self) -> usize {
        self.notes.len()
    }

    pub fn correct_count(&self) -> usize {
        self.correct
    }

    pub fn is_complete(&self) -> bool {
        self.index >= self.notes.len()
    }

    /// Moves to the next note, saturating at the note count.
    pub fn advance(&mut self) {
        if self.index < self.notes.len() {
            self.index += 1;
        }
    }

    /// Scores a detected frequency against the current note.
    ///
    /// Returns whether it matched within tolerance and bumps the correct
    /// count when it did. Rests and completed runs score `false` with no
    /// state change. The index is never advanced here; advancing is a
    /// separate, explicit action.
    pub fn record_match(&mut self, detected_frequency: f32) -> bool {
        let Some(note) = self.current_note() else {
            return false;
        };
        let Some(pitch) = &note.pitch else {
            return false;
        };
        let matched =
            tuning::notes_match(detected_frequency, pitch.frequency, self.tolerance_cents);
        if matched {
            self.correct += 1;
        }
        matched
    }

    /// Returns position and score to the start and clears all outcomes.
    pub fn reset(&mut self) {
        self.index = 0;
        self.correct = 0;
        self.outcomes.fill(NoteOutcome::Unset);
    }

    /// Completed fraction of the run as a percentage.
    pub fn progress_percent(&self) -> f32 {
        if self.notes.is_empty() {
            0.0
        } else {
            100.0 * self.index as f32 / self.notes.len() as f32
        }
    }

    pub fn outcome(&self, index: usize) -> NoteOutcome {
        self.outcomes.get(index).copied().unwrap_or_default()
    }

    pub fn outcomes(&self) -> &[NoteOutcome] {
        &self.outcomes
    }

    /// Classifies a note. A final outcome never changes for the rest of
    /// the run; later writes against it are dropped.
    pub fn set_outcome(&mut self, index: usize, outcome: NoteOutcome) {
        if let Some(slot) = self.outcomes.get_mut(index) {
            if !slot.is_final() {
                *slot = outcome;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::{Duration, DurationValue, MusicalNote, Pitch};
    use crate::music::{Accidental, NoteName};

    fn pitched(name: NoteName, octave: i32) -> MusicalNote {
        MusicalNote::pitched(
            "t",
            Pitch::new(name, Accidental::Natural, octave),
            Duration::new(DurationValue::Quarter),
        )
    }

    fn tracker_over(notes: Vec<MusicalNote>) -> ProgressTracker {
        ProgressTracker::from_notes(notes, tuning::DEFAULT_TOLERANCE_CENTS)
    }

    #[test]
    fn walks_the_sequence_and_saturates() {
        let mut tracker = tracker_over(vec![
            pitched(NoteName::E, 4),
            pitched(NoteName::B, 3),
        ]);
        assert_eq!(tracker.current_note().unwrap().label(), "E4");

        tracker.advance();
        assert_eq!(tracker.current_note().unwrap().label(), "B3");

        tracker.advance();
        assert!(tracker.is_complete());
        assert!(tracker.current_note().is_none());

        // Advancing past the end stays at the end.
        tracker.advance();
        assert_eq!(tracker.index(), 2);
    }

    #[test]
    fn record_match_scores_without_advancing() {
        let mut tracker = tracker_over(vec![pitched(NoteName::A, 4)]);
        assert!(tracker.record_match(441.0));
        assert_eq!(tracker.correct_count(), 1);
        assert_eq!(tracker.index(), 0);

        // A second evaluation of the same note scores again only through
        // record_match; the arbiter prevents that by finalizing.
        assert!(!tracker.record_match(330.0));
        assert_eq!(tracker.correct_count(), 1);
    }

    #[test]
    fn rests_and_completed_runs_never_match() {
        let mut tracker = tracker_over(vec![MusicalNote::rest(
            "r",
            Duration::new(DurationValue::Quarter),
        )]);
        assert!(!tracker.record_match(440.0));
        assert_eq!(tracker.correct_count(), 0);

        tracker.advance();
        assert!(tracker.is_complete());
        assert!(!tracker.record_match(440.0));
    }

    #[test]
    fn progress_percent_handles_empty_exercises() {
        let mut tracker = tracker_over(vec![]);
        assert_eq!(tracker.progress_percent(), 0.0);
        assert!(tracker.is_complete());

        let mut half = tracker_over(vec![pitched(NoteName::A, 4), pitched(NoteName::A, 3)]);
        half.advance();
        assert_eq!(half.progress_percent(), 50.0);

        tracker.reset();
        assert_eq!(tracker.progress_percent(), 0.0);
    }

    #[test]
    fn final_outcomes_are_immutable() {
        let mut tracker = tracker_over(vec![pitched(NoteName::A, 4)]);
        tracker.set_outcome(0, NoteOutcome::Attempting);
        assert_eq!(tracker.outcome(0), NoteOutcome::Attempting);

        tracker.set_outcome(0, NoteOutcome::Correct);
        assert_eq!(tracker.outcome(0), NoteOutcome::Correct);

        // Once finalized, later writes are dropped.
        tracker.set_outcome(0, NoteOutcome::Incorrect);
        assert_eq!(tracker.outcome(0), NoteOutcome::Correct);
    }

    #[test]
    fn reset_restores_everything() {
        let mut tracker = tracker_over(vec![pitched(NoteName::A, 4), pitched(NoteName::E, 2)]);
        assert!(tracker.record_match(440.0));
        tracker.set_outcome(0, NoteOutcome::Correct);
        tracker.advance();

        tracker.reset();
        assert_eq!(tracker.index(), 0);
        assert_eq!(tracker.correct_count(), 0);
        assert_eq!(tracker.outcome(0), NoteOutcome::Unset);
        assert_eq!(tracker.outcome(1), NoteOutcome::Unset);
    }

    #[test]
    fn out_of_range_outcome_indices_are_ignored() {
        let mut tracker = tracker_over(vec![pitched(NoteName::A, 4)]);
        tracker.set_outcome(5, NoteOutcome::Correct);
        assert_eq!(tracker.outcome(5), NoteOutcome::Unset);
    }
}
