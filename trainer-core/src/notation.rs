//! # Notation Boundary Module
//!
//! The payload handed to an external notation renderer: the flattened note
//! list, signatures, the current note index, and which notes to color
//! correct, incorrect, or attempting. Classification is a pure projection
//! of the tracker's state, recomputed on every transition; the core never
//! reads anything back from the renderer.

use std::collections::BTreeSet;

use crate::exercise::Exercise;
use crate::music::{KeySignature, MusicalNote, TimeSignature};
use crate::progress::{NoteOutcome, ProgressTracker};

/// Index sets for per-note coloring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteClassifications {
    pub correct: BTreeSet<usize>,
    pub incorrect: BTreeSet<usize>,
    pub attempting: BTreeSet<usize>,
}

/// Projects the tracker's per-note outcomes into renderer index sets.
pub fn classify(tracker: &ProgressTracker) -> NoteClassifications {
    let mut classifications = NoteClassifications::default();
    for (index, outcome) in tracker.outcomes().iter().enumerate() {
        match outcome {
            NoteOutcome::Correct => {
                classifications.correct.insert(index);
            }
            NoteOutcome::Incorrect => {
                classifications.incorrect.insert(index);
            }
            NoteOutcome::Attempting => {
                classifications.attempting.insert(index);
            }
            NoteOutcome::Unset => {}
        }
    }
    classifications
}

/// Everything a notation renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct StaffModel<'a> {
    pub notes: &'a [MusicalNote],
    pub key_signature: KeySignature,
    pub time_signature: TimeSignature,
    pub current_index: usize,
    pub classifications: NoteClassifications,
}

/// Assembles the renderer payload for the current state of a run.
pub fn staff_model<'a>(exercise: &Exercise, tracker: &'a ProgressTracker) -> StaffModel<'a> {
    StaffModel {
        notes: tracker.notes(),
        key_signature: exercise.key_signature,
        time_signature: exercise.time_signature,
        current_index: tracker.index(),
        classifications: classify(tracker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::exercise_by_id;
    use crate::tuning::DEFAULT_TOLERANCE_CENTS;

    #[test]
    fn classification_mirrors_tracker_outcomes() {
        let exercise = exercise_by_id("c-major-scale").unwrap();
        let mut tracker =
            ProgressTracker::with_tolerance(exercise, DEFAULT_TOLERANCE_CENTS);
        tracker.set_outcome(0, NoteOutcome::Correct);
        tracker.set_outcome(1, NoteOutcome::Incorrect);
        tracker.set_outcome(2, NoteOutcome::Attempting);

        let classifications = classify(&tracker);
        assert!(classifications.correct.contains(&0));
        assert!(classifications.incorrect.contains(&1));
        assert!(classifications.attempting.contains(&2));
        assert_eq!(classifications.correct.len(), 1);
        // Unset notes appear in no set.
        assert!(!classifications.correct.contains(&3));
        assert!(!classifications.incorrect.contains(&3));
    }

    #[test]
    fn staff_model_carries_the_exercise_context() {
        let exercise = exercise_by_id("g-major-intro").unwrap();
        let mut tracker =
            ProgressTracker::with_tolerance(exercise, DEFAULT_TOLERANCE_CENTS);
        tracker.advance();

        let model = staff_model(exercise, &tracker);
        assert_eq!(model.notes.len(), 8);
        assert_eq!(model.current_index, 1);
        assert_eq!(model.key_signature.sharps, 1);
        assert_eq!(model.time_signature.numerator, 4);
    }
}
