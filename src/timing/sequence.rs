use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One note of a melody, positioned in beats from the start of playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelodyNote {
    /// Note name such as `C4`, `F#3` or `Bb5`
    pub pitch: String,
    pub start_beat: f64,
    pub duration_beats: f64,
    /// 0.0 -> 1.0, player default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
}

impl MelodyNote {
    pub fn new(pitch: impl Into<String>, start_beat: f64, duration_beats: f64) -> Self {
        Self {
            pitch: pitch.into(),
            start_beat,
            duration_beats,
            velocity: None,
        }
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn end_beat(&self) -> f64 {
        self.start_beat + self.duration_beats
    }
}

/// Beat of the last note release, regardless of input order.
pub fn melody_end_beat(notes: &[MelodyNote]) -> f64 {
    notes.iter().map(MelodyNote::end_beat).fold(0.0, f64::max)
}

pub fn seconds_per_beat(tempo_bpm: f64) -> f64 {
    60.0 / tempo_bpm
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeSignatureError {
    #[error("time signature `{0}` is not of the form N/D")]
    Malformed(String),
    #[error("time signature `{0}` must have positive numbers")]
    Zero(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats_per_measure: u32,
    pub beat_unit: u32,
}

impl TimeSignature {
    pub const COMMON: TimeSignature = TimeSignature {
        beats_per_measure: 4,
        beat_unit: 4,
    };

    pub fn beats_per_measure(&self) -> u32 {
        self.beats_per_measure
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::COMMON
    }
}

impl FromStr for TimeSignature {
    type Err = TimeSignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TimeSignatureError::Malformed(s.to_string());
        let (num, den) = s.trim().split_once('/').ok_or_else(malformed)?;
        let beats_per_measure: u32 = num.trim().parse().map_err(|_| malformed())?;
        let beat_unit: u32 = den.trim().parse().map_err(|_| malformed())?;

        if beats_per_measure == 0 || beat_unit == 0 {
            return Err(TimeSignatureError::Zero(s.to_string()));
        }
        Ok(Self {
            beats_per_measure,
            beat_unit,
        })
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats_per_measure, self.beat_unit)
    }
}
