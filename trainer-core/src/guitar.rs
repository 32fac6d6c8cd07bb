//! # Guitar Model Module
//!
//! Standard tuning, fretboard positions, and the position windows used to
//! constrain exercise content to one area of the neck.

use once_cell::sync::Lazy;

use crate::music::{Accidental, NoteName, Pitch};

/// Highest fret considered when locating a pitch on the neck.
pub const MAX_FRET: u8 = 24;

/// A place to play a note: string number (1 = high E, 6 = low E) and fret
/// (0 = open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FretPosition {
    pub string: u8,
    pub fret: u8,
}

/// Open-string pitches of a tuning, ordered from string 1 to string 6.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuitarTuning {
    pub name: &'static str,
    pub strings: [Pitch; 6],
}

/// Standard EADGBE tuning.
pub static STANDARD_TUNING: Lazy<GuitarTuning> = Lazy::new(|| GuitarTuning {
    name: "Standard",
    strings: [
        Pitch::new(NoteName::E, Accidental::Natural, 4), // String 1, high E
        Pitch::new(NoteName::B, Accidental::Natural, 3),
        Pitch::new(NoteName::G, Accidental::Natural, 3),
        Pitch::new(NoteName::D, Accidental::Natural, 3),
        Pitch::new(NoteName::A, Accidental::Natural, 2),
        Pitch::new(NoteName::E, Accidental::Natural, 2), // String 6, low E
    ],
});

/// A fret window an exercise is played in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionConstraint {
    pub name: &'static str,
    pub min_fret: u8,
    pub max_fret: u8,
}

/// Common left-hand positions.
pub const POSITIONS: [PositionConstraint; 6] = [
    PositionConstraint { name: "Open Position", min_fret: 0, max_fret: 4 },
    PositionConstraint { name: "First Position", min_fret: 1, max_fret: 4 },
    PositionConstraint { name: "Second Position", min_fret: 2, max_fret: 5 },
    PositionConstraint { name: "Fifth Position", min_fret: 5, max_fret: 8 },
    PositionConstraint { name: "Seventh Position", min_fret: 7, max_fret: 10 },
    PositionConstraint { name: "Ninth Position", min_fret: 9, max_fret: 12 },
];

/// All fretboard positions where a pitch can be played in a tuning.
pub fn positions_for_pitch(pitch: &Pitch, tuning: &GuitarTuning) -> Vec<FretPosition> {
    let mut positions = Vec::new();
    for (index, open_string) in tuning.strings.iter().enumerate() {
        let fret = pitch.midi - open_string.midi;
        if (0..=MAX_FRET as i32).contains(&fret) {
            positions.push(FretPosition {
                string: (index + 1) as u8,
                fret: fret as u8,
            });
        }
    }
    positions
}

/// Positions for a pitch restricted to one fret window.
pub fn positions_in_constraint(
    pitch: &Pitch,
    constraint: &PositionConstraint,
    tuning: &GuitarTuning,
) -> Vec<FretPosition> {
    positions_for_pitch(pitch, tuning)
        .into_iter()
        .filter(|position| {
            position.fret >= constraint.min_fret && position.fret <= constraint.max_fret
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_tuning_open_strings() {
        let labels: Vec<String> = STANDARD_TUNING
            .strings
            .iter()
            .map(|pitch| pitch.label())
            .collect();
        assert_eq!(labels, ["E4", "B3", "G3", "D3", "A2", "E2"]);
    }

    #[test]
    fn high_e_has_two_playable_spots_in_open_position() {
        let e4 = Pitch::new(NoteName::E, Accidental::Natural, 4);
        let positions = positions_in_constraint(&e4, &POSITIONS[0], &STANDARD_TUNING);
        // Open first string and fourth fret on the B string.
        assert!(positions.contains(&FretPosition { string: 1, fret: 0 }));
        assert!(positions.contains(&FretPosition { string: 2, fret: 4 }));
    }

    #[test]
    fn low_e_is_only_the_open_sixth_string() {
        let e2 = Pitch::new(NoteName::E, Accidental::Natural, 2);
        let positions = positions_for_pitch(&e2, &STANDARD_TUNING);
        assert_eq!(positions, vec![FretPosition { string: 6, fret: 0 }]);
    }

    #[test]
    fn notes_below_the_instrument_have_no_positions() {
        let c2 = Pitch::new(NoteName::C, Accidental::Natural, 2);
        assert!(positions_for_pitch(&c2, &STANDARD_TUNING).is_empty());
    }
}
