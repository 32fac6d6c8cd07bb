//! # Exercise Catalogue Module
//!
//! The built-in exercise content: ordered measures of notes with their
//! signatures, category, difficulty, and fretboard position. Exercises are
//! immutable data; a run's mutable state lives in the progress tracker.
//!
//! The catalogue is computed once at startup. Note ids are assigned from
//! measure ids so renderers get stable keys.

use once_cell::sync::Lazy;

use crate::guitar::{GuitarTuning, PositionConstraint, POSITIONS, STANDARD_TUNING};
use crate::music::{
    Accidental, Duration, DurationValue, KeySignature, MusicalNote, NoteName, Pitch,
    TimeSignature,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseCategory {
    SingleNotes,
    Scales,
    Intervals,
    Melodies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// One bar of an exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub id: String,
    pub notes: Vec<MusicalNote>,
}

impl Measure {
    /// Builds a measure and stamps each note with an id derived from the
    /// measure id and its slot.
    pub fn new(id: &str, mut notes: Vec<MusicalNote>) -> Measure {
        for (slot, note) in notes.iter_mut().enumerate() {
            note.id = format!("{}-{}", id, slot);
        }
        Measure {
            id: id.to_string(),
            notes,
        }
    }
}

/// A complete exercise: content plus its musical and guitar context.
#[derive(Debug, Clone, PartialEq)]
pub struct Exercise {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub category: ExerciseCategory,
    pub difficulty: Difficulty,
    pub time_signature: TimeSignature,
    pub key_signature: KeySignature,
    /// Suggested practice tempo in BPM. Rhythm is not graded; this only
    /// informs the display.
    pub tempo: u16,
    pub measures: Vec<Measure>,
    pub position: PositionConstraint,
    pub tuning: GuitarTuning,
}

impl Exercise {
    /// All notes of the exercise in performance order.
    pub fn flattened_notes(&self) -> Vec<MusicalNote> {
        self.measures
            .iter()
            .flat_map(|measure| measure.notes.iter().cloned())
            .collect()
    }

    /// Number of notes that participate in matching (rests excluded).
    pub fn pitched_note_count(&self) -> usize {
        self.measures
            .iter()
            .flat_map(|measure| measure.notes.iter())
            .filter(|note| !note.is_rest())
            .count()
    }
}

// Catalogue builder helpers. Ids are assigned by Measure::new.

fn note(name: NoteName, octave: i32, value: DurationValue) -> MusicalNote {
    MusicalNote::pitched(
        "",
        Pitch::new(name, Accidental::Natural, octave),
        Duration::new(value),
    )
}

fn sharp(name: NoteName, octave: i32, value: DurationValue) -> MusicalNote {
    MusicalNote::pitched(
        "",
        Pitch::new(name, Accidental::Sharp, octave),
        Duration::new(value),
    )
}

fn rest(value: DurationValue) -> MusicalNote {
    MusicalNote::rest("", Duration::new(value))
}

const COMMON_TIME: TimeSignature = TimeSignature {
    numerator: 4,
    denominator: 4,
};

/// The built-in exercise catalogue, flattened from the original content
/// set: open strings, first- and second-position single notes, scales,
/// and short melodies.
pub static EXERCISES: Lazy<Vec<Exercise>> = Lazy::new(|| {
    use DurationValue::{Half, Quarter};
    use NoteName::{A, B, C, D, E, F, G};

    vec![
        Exercise {
            id: "open-strings",
            title: "Open Strings",
            description: "Practice identifying the six open string notes: E, A, D, G, B, E",
            category: ExerciseCategory::SingleNotes,
            difficulty: Difficulty::Beginner,
            time_signature: COMMON_TIME,
            key_signature: KeySignature::major(C, 0, 0),
            tempo: 60,
            measures: vec![
                Measure::new(
                    "m1",
                    vec![
                        note(E, 4, Quarter), // High E string
                        note(B, 3, Quarter),
                        note(G, 3, Quarter),
                        note(D, 3, Quarter),
                    ],
                ),
                Measure::new(
                    "m2",
                    vec![
                        note(A, 2, Quarter),
                        note(E, 2, Quarter),
                        note(A, 2, Quarter),
                        note(D, 3, Quarter),
                    ],
                ),
            ],
            position: POSITIONS[0],
            tuning: *STANDARD_TUNING,
        },
        Exercise {
            id: "first-position-e",
            title: "First Position - E String",
            description: "Notes on the high E string: E, F, G",
            category: ExerciseCategory::SingleNotes,
            difficulty: Difficulty::Beginner,
            time_signature: COMMON_TIME,
            key_signature: KeySignature::major(C, 0, 0),
            tempo: 60,
            measures: vec![
                Measure::new(
                    "m1",
                    vec![
                        note(E, 4, Quarter),
                        note(F, 4, Quarter),
                        note(G, 4, Quarter),
                        note(F, 4, Quarter),
                    ],
                ),
                Measure::new(
                    "m2",
                    vec![
                        note(E, 4, Quarter),
                        note(G, 4, Quarter),
                        note(F, 4, Quarter),
                        note(E, 4, Quarter),
                    ],
                ),
            ],
            position: POSITIONS[0],
            tuning: *STANDARD_TUNING,
        },
        Exercise {
            id: "first-position-b",
            title: "First Position - B String",
            description: "Notes on the B string: B, C, D",
            category: ExerciseCategory::SingleNotes,
            difficulty: Difficulty::Beginner,
            time_signature: COMMON_TIME,
            key_signature: KeySignature::major(C, 0, 0),
            tempo: 60,
            measures: vec![
                Measure::new(
                    "m1",
                    vec![
                        note(B, 3, Quarter),
                        note(C, 4, Quarter),
                        note(D, 4, Quarter),
                        note(C, 4, Quarter),
                    ],
                ),
                Measure::new(
                    "m2",
                    vec![
                        note(B, 3, Quarter),
                        note(D, 4, Quarter),
                        note(C, 4, Quarter),
                        note(B, 3, Quarter),
                    ],
                ),
            ],
            position: POSITIONS[0],
            tuning: *STANDARD_TUNING,
        },
        Exercise {
            id: "first-position-g",
            title: "First Position - G String",
            description: "Notes on the G string: G, A",
            category: ExerciseCategory::SingleNotes,
            difficulty: Difficulty::Beginner,
            time_signature: COMMON_TIME,
            key_signature: KeySignature::major(C, 0, 0),
            tempo: 60,
            measures: vec![
                Measure::new(
                    "m1",
                    vec![
                        note(G, 3, Quarter),
                        note(A, 3, Quarter),
                        note(G, 3, Quarter),
                        note(A, 3, Quarter),
                    ],
                ),
                Measure::new(
                    "m2",
                    vec![
                        note(A, 3, Quarter),
                        note(G, 3, Quarter),
                        note(A, 3, Quarter),
                        note(G, 3, Quarter),
                    ],
                ),
            ],
            position: POSITIONS[0],
            tuning: *STANDARD_TUNING,
        },
        Exercise {
            id: "c-major-scale",
            title: "C Major Scale",
            description: "Practice the C major scale in first position",
            category: ExerciseCategory::Scales,
            difficulty: Difficulty::Beginner,
            time_signature: COMMON_TIME,
            key_signature: KeySignature::major(C, 0, 0),
            tempo: 60,
            measures: vec![
                Measure::new(
                    "m1",
                    vec![
                        note(C, 3, Quarter),
                        note(D, 3, Quarter),
                        note(E, 3, Quarter),
                        note(F, 3, Quarter),
                    ],
                ),
                Measure::new(
                    "m2",
                    vec![
                        note(G, 3, Quarter),
                        note(A, 3, Quarter),
                        note(B, 3, Quarter),
                        note(C, 4, Quarter),
                    ],
                ),
            ],
            position: POSITIONS[0],
            tuning: *STANDARD_TUNING,
        },
        Exercise {
            id: "mary-lamb",
            title: "Mary Had a Little Lamb",
            description: "A simple melody using E, D, and C",
            category: ExerciseCategory::Melodies,
            difficulty: Difficulty::Beginner,
            time_signature: COMMON_TIME,
            key_signature: KeySignature::major(C, 0, 0),
            tempo: 80,
            measures: vec![
                Measure::new(
                    "m1",
                    vec![
                        note(E, 4, Quarter),
                        note(D, 4, Quarter),
                        note(C, 4, Quarter),
                        note(D, 4, Quarter),
                    ],
                ),
                Measure::new(
                    "m2",
                    vec![note(E, 4, Quarter), note(E, 4, Quarter), note(E, 4, Half)],
                ),
            ],
            position: POSITIONS[0],
            tuning: *STANDARD_TUNING,
        },
        Exercise {
            id: "g-major-intro",
            title: "G Major Introduction",
            description: "Practice notes in G major with F#",
            category: ExerciseCategory::SingleNotes,
            difficulty: Difficulty::Beginner,
            time_signature: COMMON_TIME,
            key_signature: KeySignature::major(G, 1, 0),
            tempo: 60,
            measures: vec![
                Measure::new(
                    "m1",
                    vec![
                        note(G, 3, Quarter),
                        note(A, 3, Quarter),
                        note(B, 3, Quarter),
                        note(A, 3, Quarter),
                    ],
                ),
                Measure::new(
                    "m2",
                    vec![
                        note(G, 3, Quarter),
                        sharp(F, 3, Quarter),
                        note(G, 3, Quarter),
                        note(A, 3, Quarter),
                    ],
                ),
            ],
            position: POSITIONS[0],
            tuning: *STANDARD_TUNING,
        },
        Exercise {
            id: "phrases-with-rests",
            title: "Phrases with Rests",
            description: "Short phrases separated by quarter rests",
            category: ExerciseCategory::Melodies,
            difficulty: Difficulty::Beginner,
            time_signature: COMMON_TIME,
            key_signature: KeySignature::major(C, 0, 0),
            tempo: 60,
            measures: vec![
                Measure::new(
                    "m1",
                    vec![
                        note(C, 4, Quarter),
                        note(E, 4, Quarter),
                        rest(Quarter),
                        note(G, 4, Quarter),
                    ],
                ),
                Measure::new(
                    "m2",
                    vec![
                        rest(Quarter),
                        note(E, 4, Quarter),
                        note(D, 4, Quarter),
                        note(C, 4, Quarter),
                    ],
                ),
            ],
            position: POSITIONS[0],
            tuning: *STANDARD_TUNING,
        },
        Exercise {
            id: "low-strings",
            title: "Low Strings",
            description: "Practice notes on the A and E strings",
            category: ExerciseCategory::SingleNotes,
            difficulty: Difficulty::Beginner,
            time_signature: COMMON_TIME,
            key_signature: KeySignature::major(C, 0, 0),
            tempo: 60,
            measures: vec![
                Measure::new(
                    "m1",
                    vec![
                        note(E, 2, Quarter),
                        note(F, 2, Quarter),
                        note(G, 2, Quarter),
                        note(A, 2, Quarter),
                    ],
                ),
                Measure::new(
                    "m2",
                    vec![
                        note(A, 2, Quarter),
                        note(B, 2, Quarter),
                        note(C, 3, Quarter),
                        note(A, 2, Quarter),
                    ],
                ),
            ],
            position: POSITIONS[0],
            tuning: *STANDARD_TUNING,
        },
        Exercise {
            id: "a-major-scale-2nd",
            title: "A Major Scale (2nd Position)",
            description: "Practice the A major scale in second position",
            category: ExerciseCategory::Scales,
            difficulty: Difficulty::Intermediate,
            time_signature: COMMON_TIME,
            key_signature: KeySignature::major(A, 3, 0),
            tempo: 60,
            measures: vec![
                Measure::new(
                    "m1",
                    vec![
                        note(A, 3, Quarter),
                        note(B, 3, Quarter),
                        sharp(C, 4, Quarter),
                        note(D, 4, Quarter),
                    ],
                ),
                Measure::new(
                    "m2",
                    vec![
                        note(E, 4, Quarter),
                        sharp(F, 4, Quarter),
                        sharp(G, 4, Quarter),
                        note(A, 4, Quarter),
                    ],
                ),
            ],
            position: POSITIONS[2],
            tuning: *STANDARD_TUNING,
        },
        Exercise {
            id: "second-position-melody",
            title: "Second Position Melody",
            description: "A simple melody using notes in 2nd position",
            category: ExerciseCategory::Melodies,
            difficulty: Difficulty::Intermediate,
            time_signature: COMMON_TIME,
            key_signature: KeySignature::major(D, 2, 0),
            tempo: 72,
            measures: vec![
                Measure::new(
                    "m1",
                    vec![
                        note(D, 4, Quarter),
                        note(E, 4, Quarter),
                        sharp(F, 4, Quarter),
                        note(D, 4, Quarter),
                    ],
                ),
                Measure::new(
                    "m2",
                    vec![note(A, 4, Half), sharp(F, 4, Quarter), note(E, 4, Quarter)],
                ),
                Measure::new(
                    "m3",
                    vec![
                        note(D, 4, Quarter),
                        sharp(C, 4, Quarter),
                        note(B, 3, Quarter),
                        note(A, 3, Quarter),
                    ],
                ),
                Measure::new("m4", vec![note(D, 4, Half), note(D, 4, Half)]),
            ],
            position: POSITIONS[2],
            tuning: *STANDARD_TUNING,
        },
    ]
});

/// Looks up an exercise by its id.
pub fn exercise_by_id(id: &str) -> Option<&'static Exercise> {
    EXERCISES.iter().find(|exercise| exercise.id == id)
}

pub fn exercises_by_difficulty(difficulty: Difficulty) -> Vec<&'static Exercise> {
    EXERCISES
        .iter()
        .filter(|exercise| exercise.difficulty == difficulty)
        .collect()
}

pub fn exercises_by_category(category: ExerciseCategory) -> Vec<&'static Exercise> {
    EXERCISES
        .iter()
        .filter(|exercise| exercise.category == category)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::{MAX_FREQUENCY, MIN_FREQUENCY};

    #[test]
    fn catalogue_ids_are_unique() {
        let mut ids: Vec<&str> = EXERCISES.iter().map(|exercise| exercise.id).collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert!(total >= 8);
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn flattening_preserves_performance_order() {
        let exercise = exercise_by_id("c-major-scale").unwrap();
        let labels: Vec<String> = exercise
            .flattened_notes()
            .iter()
            .map(|note| note.label())
            .collect();
        assert_eq!(labels, ["C3", "D3", "E3", "F3", "G3", "A3", "B3", "C4"]);
    }

    #[test]
    fn note_ids_are_stamped_per_measure() {
        let exercise = exercise_by_id("open-strings").unwrap();
        let notes = exercise.flattened_notes();
        assert_eq!(notes[0].id, "m1-0");
        assert_eq!(notes[4].id, "m2-0");
    }

    #[test]
    fn every_pitched_note_is_detectable() {
        for exercise in EXERCISES.iter() {
            for note in exercise.flattened_notes() {
                if let Some(pitch) = note.pitch {
                    assert!(
                        pitch.frequency > MIN_FREQUENCY && pitch.frequency < MAX_FREQUENCY,
                        "{} in '{}' is outside the detector band",
                        note.label(),
                        exercise.id
                    );
                }
            }
        }
    }

    #[test]
    fn rests_are_not_counted_as_pitched() {
        let exercise = exercise_by_id("phrases-with-rests").unwrap();
        assert_eq!(exercise.flattened_notes().len(), 8);
        assert_eq!(exercise.pitched_note_count(), 6);
    }

    #[test]
    fn lookups_filter_the_catalogue() {
        assert!(exercise_by_id("does-not-exist").is_none());
        assert!(!exercises_by_difficulty(Difficulty::Beginner).is_empty());
        assert!(
            exercises_by_category(ExerciseCategory::Scales)
                .iter()
                .all(|exercise| exercise.category == ExerciseCategory::Scales)
        );
    }
}
