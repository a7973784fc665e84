//! Note-name to frequency conversion.
//!
//! Names are a letter, an optional `#` or `b`, and an octave in scientific
//! pitch notation (`C4` is middle C, `A4` is 440 Hz).

use std::str::FromStr;
use thiserror::Error;

/// Concert pitch, 12-TET, octave 4 (C4 through B4).
const OCTAVE_4_HZ: [f64; 12] = [
    261.625_565, // C
    277.182_631, // C#
    293.664_768, // D
    311.126_984, // D#
    329.627_557, // E
    349.228_231, // F
    369.994_423, // F#
    391.995_436, // G
    415.304_698, // G#
    440.0,       // A
    466.163_762, // A#
    493.883_301, // B
];

const MIN_OCTAVE: i32 = 0;
const MAX_OCTAVE: i32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PitchError {
    #[error("empty pitch name")]
    Empty,
    #[error("unknown note letter `{0}` in `{1}`")]
    UnknownLetter(char, String),
    #[error("missing or invalid octave in `{0}`")]
    BadOctave(String),
    #[error("octave out of range in `{0}`")]
    OutOfRange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitch {
    midi: i32,
}

impl Pitch {
    pub fn parse(name: &str) -> Result<Self, PitchError> {
        let trimmed = name.trim();
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or(PitchError::Empty)?;

        let semitone = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            other => return Err(PitchError::UnknownLetter(other, name.to_string())),
        };

        let rest = chars.as_str();
        let (accidental, octave_str) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        let octave: i32 = octave_str
            .parse()
            .map_err(|_| PitchError::BadOctave(name.to_string()))?;
        if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
            return Err(PitchError::OutOfRange(name.to_string()));
        }

        Ok(Self {
            midi: (octave + 1) * 12 + semitone + accidental,
        })
    }

    pub fn midi(&self) -> i32 {
        self.midi
    }

    pub fn frequency(&self) -> f64 {
        let index = self.midi.rem_euclid(12) as usize;
        // C4 is midi 60
        let octave_shift = self.midi.div_euclid(12) - 5;
        OCTAVE_4_HZ[index] * 2f64.powi(octave_shift)
    }
}

impl FromStr for Pitch {
    type Err = PitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

pub fn frequency_of(name: &str) -> Result<f64, PitchError> {
    Pitch::parse(name).map(|p| p.frequency())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn concert_a_is_440() {
        assert_eq!(frequency_of("A4").unwrap(), 440.0);
        assert_eq!(Pitch::parse("A4").unwrap().midi(), 69);
    }

    #[test]
    fn octaves_double_the_frequency() {
        assert!(close(frequency_of("A5").unwrap(), 880.0));
        assert!(close(frequency_of("A3").unwrap(), 220.0));
        assert!(close(frequency_of("C5").unwrap(), 2.0 * frequency_of("C4").unwrap()));
    }

    #[test]
    fn accidentals_shift_by_a_semitone() {
        assert!(close(frequency_of("C#4").unwrap(), 277.1826));
        assert!(close(frequency_of("Db4").unwrap(), frequency_of("C#4").unwrap()));
        assert!(close(frequency_of("Bb3").unwrap(), 233.0819));
    }

    #[test]
    fn accidentals_can_cross_octave_boundaries() {
        assert_eq!(Pitch::parse("Cb4").unwrap(), Pitch::parse("B3").unwrap());
        assert_eq!(Pitch::parse("B#3").unwrap(), Pitch::parse("C4").unwrap());
        assert!(close(frequency_of("Cb4").unwrap(), 246.9417));
    }

    #[test]
    fn lowercase_letters_are_accepted() {
        assert_eq!(Pitch::parse("e4").unwrap(), Pitch::parse("E4").unwrap());
    }

    #[test]
    fn unresolvable_names_are_errors() {
        assert_eq!(
            Pitch::parse("H4"),
            Err(PitchError::UnknownLetter('H', "H4".into()))
        );
        assert_eq!(Pitch::parse(""), Err(PitchError::Empty));
        assert!(matches!(Pitch::parse("C"), Err(PitchError::BadOctave(_))));
        assert!(matches!(Pitch::parse("C#x"), Err(PitchError::BadOctave(_))));
        assert!(matches!(Pitch::parse("C9"), Err(PitchError::OutOfRange(_))));
    }
}
