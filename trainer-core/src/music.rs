//! # Music Data Model
//!
//! Core musical types shared by the exercise catalogue, the progress
//! tracker, and the notation boundary: pitches with their derived MIDI
//! number and frequency, note durations, and the note/measure containers
//! exercises are built from.
//!
//! All types here are plain immutable data. A `Pitch` is fully determined
//! by (letter, accidental, octave); its frequency and MIDI number are
//! computed once at construction and never change.

/// The seven note letters of the diatonic alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    /// Semitone offset of the natural letter above C.
    pub fn semitone(self) -> i32 {
        match self {
            NoteName::C => 0,
            NoteName::D => 2,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::G => 7,
            NoteName::A => 9,
            NoteName::B => 11,
        }
    }

    pub fn letter(self) -> char {
        match self {
            NoteName::C => 'C',
            NoteName::D => 'D',
            NoteName::E => 'E',
            NoteName::F => 'F',
            NoteName::G => 'G',
            NoteName::A => 'A',
            NoteName::B => 'B',
        }
    }
}

/// Accidental applied to a note letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Accidental {
    #[default]
    Natural,
    Sharp,
    Flat,
}

impl Accidental {
    /// Semitone shift relative to the natural letter.
    pub fn offset(self) -> i32 {
        match self {
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
        }
    }

    /// Suffix used when spelling a note name, e.g. the "#" in "F#4".
    pub fn suffix(self) -> &'static str {
        match self {
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
        }
    }
}

/// A concrete pitch: spelling plus its derived MIDI number and frequency.
///
/// Created only through [`Pitch::new`], which derives the MIDI number from
/// the spelling and the frequency from equal temperament around A4 = 440 Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pitch {
    pub name: NoteName,
    pub accidental: Accidental,
    pub octave: i32,
    /// MIDI note number (A4 = 69).
    pub midi: i32,
    /// Equal-temperament frequency in Hz.
    pub frequency: f32,
}

impl Pitch {
    /// Builds a pitch from its spelling.
    ///
    /// The MIDI number follows the usual convention where C4 (middle C) is
    /// 60, so `midi = (octave + 1) * 12 + semitone`. The frequency is
    /// `440 * 2^((midi - 69) / 12)`.
    pub fn new(name: NoteName, accidental: Accidental, octave: i32) -> Pitch {
        let semitone = name.semitone() + accidental.offset();
        let midi = (octave + 1) * 12 + semitone;
        let frequency = 440.0 * 2.0_f32.powf((midi - 69) as f32 / 12.0);
        Pitch {
            name,
            accidental,
            octave,
            midi,
            frequency,
        }
    }

    /// Display spelling, e.g. "E2", "F#4", "Bb3".
    pub fn label(&self) -> String {
        format!("{}{}{}", self.name.letter(), self.accidental.suffix(), self.octave)
    }
}

/// Base note value of a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

/// A note value plus augmentation dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Duration {
    pub value: DurationValue,
    pub dots: u8,
}

impl Duration {
    pub fn new(value: DurationValue) -> Duration {
        Duration { value, dots: 0 }
    }

    pub fn dotted(value: DurationValue, dots: u8) -> Duration {
        Duration { value, dots }
    }
}

/// One entry of an exercise: either a pitched note or a rest.
///
/// A rest is represented by `pitch: None`. Rests never participate in
/// pitch matching; the tracker and the arbiter treat them as unscored.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicalNote {
    /// Stable identifier, unique within one exercise. Used by renderers
    /// as a keying handle; the core itself only relies on note indices.
    pub id: String,
    pub pitch: Option<Pitch>,
    pub duration: Duration,
}

impl MusicalNote {
    pub fn pitched(id: impl Into<String>, pitch: Pitch, duration: Duration) -> MusicalNote {
        MusicalNote {
            id: id.into(),
            pitch: Some(pitch),
            duration,
        }
    }

    pub fn rest(id: impl Into<String>, duration: Duration) -> MusicalNote {
        MusicalNote {
            id: id.into(),
            pitch: None,
            duration,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }

    /// Display spelling of the note, or "rest".
    pub fn label(&self) -> String {
        match &self.pitch {
            Some(pitch) => pitch.label(),
            None => "rest".to_string(),
        }
    }
}

/// Time signature consumed by the notation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Major,
    Minor,
}

/// Key signature consumed by the notation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySignature {
    pub root: NoteName,
    pub mode: Mode,
    pub sharps: u8,
    pub flats: u8,
}

impl KeySignature {
    pub fn major(root: NoteName, sharps: u8, flats: u8) -> KeySignature {
        KeySignature {
            root,
            mode: Mode::Major,
            sharps,
            flats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_midi_69_at_440() {
        let a4 = Pitch::new(NoteName::A, Accidental::Natural, 4);
        assert_eq!(a4.midi, 69);
        assert!((a4.frequency - 440.0).abs() < 0.01);
        assert_eq!(a4.label(), "A4");
    }

    #[test]
    fn low_e_string_frequency() {
        let e2 = Pitch::new(NoteName::E, Accidental::Natural, 2);
        assert_eq!(e2.midi, 40);
        assert!((e2.frequency - 82.41).abs() < 0.01);
    }

    #[test]
    fn middle_c() {
        let c4 = Pitch::new(NoteName::C, Accidental::Natural, 4);
        assert_eq!(c4.midi, 60);
        assert!((c4.frequency - 261.63).abs() < 0.01);
    }

    #[test]
    fn accidentals_shift_by_one_semitone() {
        let f4 = Pitch::new(NoteName::F, Accidental::Natural, 4);
        let f_sharp = Pitch::new(NoteName::F, Accidental::Sharp, 4);
        let g_flat = Pitch::new(NoteName::G, Accidental::Flat, 4);
        assert_eq!(f_sharp.midi, f4.midi + 1);
        assert_eq!(g_flat.midi, f_sharp.midi);
        assert_eq!(f_sharp.label(), "F#4");
        assert_eq!(g_flat.label(), "Gb4");
    }

    #[test]
    fn rests_have_no_pitch() {
        let rest = MusicalNote::rest("r1", Duration::new(DurationValue::Quarter));
        assert!(rest.is_rest());
        assert_eq!(rest.label(), "rest");

        let a4 = Pitch::new(NoteName::A, Accidental::Natural, 4);
        let note = MusicalNote::pitched("n1", a4, Duration::new(DurationValue::Half));
        assert!(!note.is_rest());
        assert_eq!(note.label(), "A4");
    }
}
