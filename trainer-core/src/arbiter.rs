//! # Answer Arbitration Module
//!
//! Turns the stream of per-window frequency estimates into note-correctness
//! decisions: evaluate, count attempts, finalize, wait out the feedback
//! delay, advance, and filter the decay of the previous string out of the
//! next note's detection window.
//!
//! ## Timing model
//!
//! Every deferred action is an explicit `Instant` deadline owned by the
//! machine: the scheduled advance after a finalized note, and the cooldown
//! window after a match or mismatch. Callers pass `now` into every
//! operation, so the machine never reads the clock itself, a pending
//! deadline is cancelled by plain assignment, and tests drive it on a
//! synthetic timeline. All transitions happen on the caller's single
//! logical thread; classification and score updates for one reading are
//! committed together before the call returns.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::exercise::Exercise;
use crate::progress::{NoteOutcome, ProgressTracker};
use crate::tuning;

/// Arbitration timing and matching parameters.
///
/// Global defaults for every exercise; nothing here varies per note.
#[derive(Debug, Clone)]
pub struct ArbitrationConfig {
    /// Matching tolerance handed to the comparator.
    pub tolerance_cents: f32,
    /// How long "correct"/"incorrect" feedback stays visible on a
    /// finalized note before the run advances.
    pub advance_delay: Duration,
    /// Window after an advance during which the previous string's decay
    /// is filtered out of the new note's input.
    pub post_advance_cooldown: Duration,
    /// Window after a mismatched attempt during which a sustained wrong
    /// pluck cannot score duplicate attempts.
    pub mismatch_cooldown: Duration,
    /// Mismatched attempts before a note auto-finalizes as incorrect.
    /// Zero means unlimited: only a match or an explicit skip finalizes.
    pub max_attempts: u32,
    /// Relative band around the last matched frequency treated as
    /// ringing of that same string (0.2 accepts 0.8x to 1.2x).
    pub ring_ratio_tolerance: f32,
}

impl Default for ArbitrationConfig {
    fn default() -> ArbitrationConfig {
        ArbitrationConfig {
            tolerance_cents: tuning::DEFAULT_TOLERANCE_CENTS,
            advance_delay: Duration::from_millis(800),
            post_advance_cooldown: Duration::from_millis(150),
            mismatch_cooldown: Duration::from_millis(200),
            max_attempts: 3,
            ring_ratio_tolerance: 0.2,
        }
    }
}

/// Final score of a completed (or abandoned) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub correct: usize,
    pub total: usize,
}

impl RunSummary {
    pub fn accuracy_percent(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.correct as f32 / self.total as f32
        }
    }
}

/// The arbitration state machine for one exercise run.
///
/// Owns the progress tracker and the transient per-note matching state.
/// Consumes one frequency estimate per call and applies at most one
/// transition decision for it.
#[derive(Debug)]
pub struct NoteArbiter {
    config: ArbitrationConfig,
    tracker: ProgressTracker,
    /// Mismatched attempts on the current note. Reset on every advance.
    attempts: u32,
    /// Whether the current note's outcome is committed and the machine is
    /// waiting out the display delay.
    finalized: bool,
    cooldown_until: Option<Instant>,
    pending_advance: Option<Instant>,
    /// Frequency of the most recent correct match. Survives the advance
    /// so the next note can recognize the old string still ringing;
    /// cleared only by reset.
    last_matched: Option<f32>,
}

impl NoteArbiter {
    pub fn new(exercise: &Exercise) -> NoteArbiter {
        NoteArbiter::with_config(exercise, ArbitrationConfig::default())
    }

    pub fn with_config(exercise: &Exercise, config: ArbitrationConfig) -> NoteArbiter {
        let tracker = ProgressTracker::with_tolerance(exercise, config.tolerance_cents);
        let mut arbiter = NoteArbiter {
            config,
            tracker,
            attempts: 0,
            finalized: false,
            cooldown_until: None,
            pending_advance: None,
            last_matched: None,
        };
        arbiter.step_over_rests();
        arbiter
    }

    pub fn config(&self) -> &ArbitrationConfig {
        &self.config
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Mismatched attempts recorded on the current note.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_complete(&self) -> bool {
        self.tracker.is_complete()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            correct: self.tracker.correct_count(),
            total: self.tracker.total_notes(),
        }
    }

    /// Fires the scheduled advance if its deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        if let Some(due) = self.pending_advance {
            if now >= due {
                self.pending_advance = None;
                self.advance_with_cooldown(now);
            }
        }
    }

    /// Consumes one frequency estimate.
    ///
    /// `None` means silence or an inconclusive window; that is the
    /// expected signal between notes and causes no transition.
    pub fn handle_reading(&mut self, frequency: Option<f32>, now: Instant) {
        self.tick(now);

        if self.tracker.is_complete() {
            return;
        }
        let Some(frequency) = frequency else {
            return;
        };
        // The outcome is committed; input during the display delay is
        // leftover sound of the answer that was just scored.
        if self.finalized {
            return;
        }
        // Rests are stepped over on advance, so the current note carries
        // a pitch whenever the run is live.
        let Some(target) = self
            .tracker
            .current_note()
            .and_then(|note| note.pitch.as_ref())
            .map(|pitch| pitch.frequency)
        else {
            return;
        };

        if self.cooldown_active(now) {
            match self.last_matched {
                // Within the ratio band of the previous match: the old
                // string is still ringing, not a new attempt.
                Some(last) if self.is_ringing(frequency, last) => return,
                // A distinctly different pitch ends the window early.
                Some(_) => self.cooldown_until = None,
                // A mismatch cooldown runs to its deadline.
                None => return,
            }
        }

        self.evaluate(frequency, target, now);
    }

    /// Finalizes the current note as incorrect regardless of attempts and
    /// advances immediately. Cancels the scheduled advance first so a
    /// stale deadline can never fire against the next note.
    pub fn skip(&mut self, now: Instant) {
        if self.tracker.is_complete() {
            return;
        }
        self.pending_advance = None;
        let index = self.tracker.index();
        self.tracker.set_outcome(index, NoteOutcome::Incorrect);
        eprintln!("[ARBITER] Note {} skipped", index);
        self.advance_with_cooldown(now);
    }

    /// Returns the run to its starting state: all deadlines cancelled,
    /// attempts and ring state cleared, tracker back to index 0.
    pub fn reset(&mut self) {
        self.pending_advance = None;
        self.cooldown_until = None;
        self.last_matched = None;
        self.attempts = 0;
        self.finalized = false;
        self.tracker.reset();
        self.step_over_rests();
        eprintln!("[ARBITER] Run reset");
    }

    fn cooldown_active(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    fn is_ringing(&self, frequency: f32, last_matched: f32) -> bool {
        let ratio = frequency / last_matched;
        ratio >= 1.0 - self.config.ring_ratio_tolerance
            && ratio <= 1.0 + self.config.ring_ratio_tolerance
    }

    fn evaluate(&mut self, frequency: f32, target: f32, now: Instant) {
        let index = self.tracker.index();
        if tuning::notes_match(frequency, target, self.config.tolerance_cents) {
            self.tracker.record_match(frequency);
            self.tracker.set_outcome(index, NoteOutcome::Correct);
            self.finalized = true;
            self.last_matched = Some(frequency);
            self.pending_advance = Some(now + self.config.advance_delay);
            eprintln!("[ARBITER] Note {} correct at {:.1} Hz", index, frequency);
        } else {
            self.attempts += 1;
            if self.config.max_attempts > 0 && self.attempts >= self.config.max_attempts {
                self.tracker.set_outcome(index, NoteOutcome::Incorrect);
                self.finalized = true;
                self.pending_advance = Some(now + self.config.advance_delay);
                eprintln!(
                    "[ARBITER] Note {} incorrect after {} attempts",
                    index, self.attempts
                );
            } else {
                self.tracker.set_outcome(index, NoteOutcome::Attempting);
                self.cooldown_until = Some(now + self.config.mismatch_cooldown);
            }
        }
    }

    /// Moves to the next note and opens the post-advance cooldown so the
    /// string that just sounded is not scored against the new note.
    fn advance_with_cooldown(&mut self, now: Instant) {
        self.tracker.advance();
        self.attempts = 0;
        self.finalized = false;
        self.step_over_rests();

        if self.tracker.is_complete() {
            self.cooldown_until = None;
            let summary = self.summary();
            eprintln!(
                "[ARBITER] Run complete: {}/{} correct",
                summary.correct, summary.total
            );
        } else {
            self.cooldown_until = Some(now + self.config.post_advance_cooldown);
        }
    }

    /// Rests never participate in matching; they are stepped over without
    /// an outcome whenever one becomes current.
    fn step_over_rests(&mut self) {
        while self
            .tracker
            .current_note()
            .is_some_and(|note| note.is_rest())
        {
            self.tracker.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::{Difficulty, ExerciseCategory, Measure};
    use crate::guitar::{POSITIONS, STANDARD_TUNING};
    use crate::music::{
        Accidental, Duration as NoteDuration, DurationValue, KeySignature, MusicalNote,
        NoteName, Pitch, TimeSignature,
    };

    const MS: Duration = Duration::from_millis(1);

    fn pitched(name: NoteName, octave: i32) -> MusicalNote {
        MusicalNote::pitched(
            "t",
            Pitch::new(name, Accidental::Natural, octave),
            NoteDuration::new(DurationValue::Quarter),
        )
    }

    fn rest() -> MusicalNote {
        MusicalNote::rest("r", NoteDuration::new(DurationValue::Quarter))
    }

    fn exercise_of(notes: Vec<MusicalNote>) -> Exercise {
        Exercise {
            id: "test",
            title: "Test",
            description: "",
            category: ExerciseCategory::SingleNotes,
            difficulty: Difficulty::Beginner,
            time_signature: TimeSignature { numerator: 4, denominator: 4 },
            key_signature: KeySignature::major(NoteName::C, 0, 0),
            tempo: 60,
            measures: vec![Measure::new("m1", notes)],
            position: POSITIONS[0],
            tuning: *STANDARD_TUNING,
        }
    }

    fn target_frequency(arbiter: &NoteArbiter) -> f32 {
        arbiter
            .tracker()
            .current_note()
            .and_then(|note| note.pitch.as_ref())
            .map(|pitch| pitch.frequency)
            .unwrap()
    }

    #[test]
    fn playing_every_note_completes_with_full_score() {
        let exercise = exercise_of(vec![
            pitched(NoteName::E, 4),
            pitched(NoteName::B, 3),
            pitched(NoteName::G, 3),
        ]);
        let mut arbiter = NoteArbiter::new(&exercise);
        let start = Instant::now();

        for step in 0..3 {
            let t = start + 2000 * step * MS;
            let target = target_frequency(&arbiter);
            arbiter.handle_reading(Some(target), t);
            assert_eq!(
                arbiter.tracker().outcome(arbiter.tracker().index()),
                NoteOutcome::Correct
            );
            // The advance waits out the display delay.
            arbiter.tick(t + 799 * MS);
            assert_eq!(arbiter.tracker().index() as u32, step);
            arbiter.tick(t + 801 * MS);
        }

        assert!(arbiter.is_complete());
        assert_eq!(arbiter.summary(), RunSummary { correct: 3, total: 3 });
    }

    #[test]
    fn skipping_every_note_completes_with_zero_score() {
        let exercise = exercise_of(vec![
            pitched(NoteName::E, 4),
            pitched(NoteName::B, 3),
            pitched(NoteName::G, 3),
        ]);
        let mut arbiter = NoteArbiter::new(&exercise);
        let start = Instant::now();

        for step in 0..3 {
            arbiter.skip(start + step * MS);
        }

        assert!(arbiter.is_complete());
        assert_eq!(arbiter.summary(), RunSummary { correct: 0, total: 3 });
        assert!(
            arbiter
                .tracker()
                .outcomes()
                .iter()
                .all(|&outcome| outcome == NoteOutcome::Incorrect)
        );
    }

    #[test]
    fn sustained_wrong_pluck_counts_one_attempt() {
        let exercise = exercise_of(vec![pitched(NoteName::A, 4)]);
        let mut arbiter = NoteArbiter::with_config(
            &exercise,
            ArbitrationConfig { max_attempts: 0, ..ArbitrationConfig::default() },
        );
        let start = Instant::now();

        arbiter.handle_reading(Some(330.0), start);
        assert_eq!(arbiter.attempts(), 1);
        assert_eq!(arbiter.tracker().outcome(0), NoteOutcome::Attempting);

        // The same wrong frequency inside the mismatch cooldown is the
        // same pluck still sounding.
        arbiter.handle_reading(Some(330.0), start + 100 * MS);
        assert_eq!(arbiter.attempts(), 1);

        // After the window expires it counts again.
        arbiter.handle_reading(Some(330.0), start + 250 * MS);
        assert_eq!(arbiter.attempts(), 2);
    }

    #[test]
    fn ringing_of_the_matched_string_is_not_an_attempt_on_the_next_note() {
        let exercise = exercise_of(vec![pitched(NoteName::A, 4), pitched(NoteName::A, 4)]);
        let mut arbiter = NoteArbiter::new(&exercise);
        let start = Instant::now();

        arbiter.handle_reading(Some(440.0), start);
        arbiter.tick(start + 801 * MS);
        assert_eq!(arbiter.tracker().index(), 1);

        // Within the post-advance cooldown, the same frequency is decay
        // of the previous string even though it matches the new target.
        arbiter.handle_reading(Some(440.0), start + 850 * MS);
        assert_eq!(arbiter.tracker().outcome(1), NoteOutcome::Unset);
        assert_eq!(arbiter.tracker().correct_count(), 1);

        // A fresh pluck after the window scores normally.
        arbiter.handle_reading(Some(440.0), start + 1000 * MS);
        assert_eq!(arbiter.tracker().outcome(1), NoteOutcome::Correct);
        assert_eq!(arbiter.tracker().correct_count(), 2);
    }

    #[test]
    fn a_distinctly_different_pitch_ends_the_cooldown_early() {
        let exercise = exercise_of(vec![pitched(NoteName::A, 4), pitched(NoteName::A, 4)]);
        let mut arbiter = NoteArbiter::with_config(
            &exercise,
            ArbitrationConfig { max_attempts: 0, ..ArbitrationConfig::default() },
        );
        let start = Instant::now();

        arbiter.handle_reading(Some(440.0), start);
        arbiter.tick(start + 801 * MS);
        assert_eq!(arbiter.tracker().index(), 1);

        // 25% above the last match: clearly a new pluck, evaluated at
        // once against the new target even though the cooldown is open.
        arbiter.handle_reading(Some(550.0), start + 850 * MS);
        assert_eq!(arbiter.attempts(), 1);
        assert_eq!(arbiter.tracker().outcome(1), NoteOutcome::Attempting);
    }

    #[test]
    fn reset_cancels_pending_advance_and_clears_state() {
        let exercise = exercise_of(vec![pitched(NoteName::A, 4), pitched(NoteName::B, 3)]);
        let mut arbiter = NoteArbiter::new(&exercise);
        let start = Instant::now();

        arbiter.handle_reading(Some(440.0), start);
        assert_eq!(arbiter.tracker().correct_count(), 1);

        // Reset lands mid display delay; the scheduled advance must die
        // with it.
        arbiter.reset();
        assert_eq!(arbiter.tracker().index(), 0);
        assert_eq!(arbiter.tracker().correct_count(), 0);
        assert_eq!(arbiter.tracker().outcome(0), NoteOutcome::Unset);

        arbiter.tick(start + 900 * MS);
        assert_eq!(arbiter.tracker().index(), 0);

        // The ring reference is gone too: a frequency near the old match
        // is evaluated normally after reset.
        arbiter.handle_reading(Some(440.0), start + 950 * MS);
        assert_eq!(arbiter.tracker().outcome(0), NoteOutcome::Correct);
    }

    #[test]
    fn unlimited_attempts_never_auto_finalize() {
        let exercise = exercise_of(vec![pitched(NoteName::A, 4)]);
        let mut arbiter = NoteArbiter::with_config(
            &exercise,
            ArbitrationConfig { max_attempts: 0, ..ArbitrationConfig::default() },
        );
        let start = Instant::now();

        for step in 0..10 {
            arbiter.handle_reading(Some(330.0), start + 300 * step * MS);
        }
        assert_eq!(arbiter.attempts(), 10);
        assert_eq!(arbiter.tracker().outcome(0), NoteOutcome::Attempting);
        assert!(!arbiter.is_complete());

        // Only a match (or skip) can finalize it.
        arbiter.handle_reading(Some(440.0), start + 4000 * MS);
        assert_eq!(arbiter.tracker().outcome(0), NoteOutcome::Correct);
    }

    #[test]
    fn attempt_limit_finalizes_incorrect_and_advances() {
        let exercise = exercise_of(vec![pitched(NoteName::A, 4), pitched(NoteName::B, 3)]);
        let mut arbiter = NoteArbiter::with_config(
            &exercise,
            ArbitrationConfig { max_attempts: 2, ..ArbitrationConfig::default() },
        );
        let start = Instant::now();

        arbiter.handle_reading(Some(330.0), start);
        assert_eq!(arbiter.tracker().outcome(0), NoteOutcome::Attempting);

        arbiter.handle_reading(Some(330.0), start + 300 * MS);
        assert_eq!(arbiter.tracker().outcome(0), NoteOutcome::Incorrect);
        assert_eq!(arbiter.tracker().correct_count(), 0);

        // Advancement follows the same display delay as a match.
        arbiter.tick(start + 1200 * MS);
        assert_eq!(arbiter.tracker().index(), 1);
    }

    #[test]
    fn further_input_is_ignored_while_finalized() {
        let exercise = exercise_of(vec![pitched(NoteName::A, 4), pitched(NoteName::B, 3)]);
        let mut arbiter = NoteArbiter::new(&exercise);
        let start = Instant::now();

        arbiter.handle_reading(Some(440.0), start);
        assert_eq!(arbiter.tracker().correct_count(), 1);

        // Still inside the display delay: nothing more may be scored.
        arbiter.handle_reading(Some(440.0), start + 100 * MS);
        arbiter.handle_reading(Some(330.0), start + 200 * MS);
        assert_eq!(arbiter.tracker().correct_count(), 1);
        assert_eq!(arbiter.tracker().index(), 0);
        assert_eq!(arbiter.attempts(), 0);
    }

    #[test]
    fn silence_causes_no_transition() {
        let exercise = exercise_of(vec![pitched(NoteName::A, 4)]);
        let mut arbiter = NoteArbiter::new(&exercise);
        let start = Instant::now();

        arbiter.handle_reading(None, start);
        arbiter.handle_reading(None, start + 500 * MS);
        assert_eq!(arbiter.attempts(), 0);
        assert_eq!(arbiter.tracker().outcome(0), NoteOutcome::Unset);
        assert!(!arbiter.is_complete());
    }

    #[test]
    fn skip_cancels_a_scheduled_advance_instead_of_double_advancing() {
        let exercise = exercise_of(vec![
            pitched(NoteName::A, 4),
            pitched(NoteName::B, 3),
            pitched(NoteName::G, 3),
        ]);
        let mut arbiter = NoteArbiter::new(&exercise);
        let start = Instant::now();

        arbiter.handle_reading(Some(440.0), start);
        // The user skips before the scheduled advance fires.
        arbiter.skip(start + 100 * MS);
        assert_eq!(arbiter.tracker().index(), 1);

        // The stale deadline must not fire a second advance.
        arbiter.tick(start + 900 * MS);
        assert_eq!(arbiter.tracker().index(), 1);
        // The first note's match survives; skip could not overwrite it.
        assert_eq!(arbiter.tracker().outcome(0), NoteOutcome::Correct);
    }

    #[test]
    fn rests_are_stepped_over_without_outcomes() {
        let exercise = exercise_of(vec![
            rest(),
            pitched(NoteName::C, 4),
            rest(),
            rest(),
            pitched(NoteName::E, 4),
        ]);
        let mut arbiter = NoteArbiter::new(&exercise);
        // The leading rest is skipped at construction.
        assert_eq!(arbiter.tracker().index(), 1);
        let start = Instant::now();

        arbiter.handle_reading(Some(261.63), start);
        arbiter.tick(start + 801 * MS);
        // Both middle rests are stepped over in one advance.
        assert_eq!(arbiter.tracker().index(), 4);

        arbiter.handle_reading(Some(329.63), start + 1200 * MS);
        arbiter.tick(start + 2100 * MS);
        assert!(arbiter.is_complete());

        let summary = arbiter.summary();
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.total, 5);
        assert_eq!(arbiter.tracker().outcome(0), NoteOutcome::Unset);
        assert_eq!(arbiter.tracker().outcome(2), NoteOutcome::Unset);
    }

    #[test]
    fn accuracy_percent_of_summary() {
        let summary = RunSummary { correct: 3, total: 4 };
        assert_eq!(summary.accuracy_percent(), 75.0);
        let empty = RunSummary { correct: 0, total: 0 };
        assert_eq!(empty.accuracy_percent(), 0.0);
    }
}
