//! Transport-level players built on one `EventScheduler` each.
//!
//! Both players share the same state machine: `start` moves idle -> running,
//! `stop` (or natural completion) moves back; redundant calls are no-ops.

mod melody;
mod metronome;

use crate::timing::MelodyNote;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub use melody::MelodyPlayer;
pub use metronome::{ClickSounds, MetronomePlayer};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidTempo(f64),
    #[error("beats per measure must be at least 1")]
    InvalidMeter,
    #[error("lead-in must be a non-negative number of beats, got {0}")]
    InvalidLeadIn(f64),
}

pub(crate) fn validate_tempo(tempo_bpm: f64) -> Result<f64, PlaybackError> {
    if tempo_bpm.is_finite() && tempo_bpm > 0.0 {
        Ok(tempo_bpm)
    } else {
        Err(PlaybackError::InvalidTempo(tempo_bpm))
    }
}

/// What a practice run sounds.
///
/// Whenever the click plays, one measure of count-in precedes the melody.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackMode {
    /// Count-in and click only; the melody is followed silently
    ClickOnly,
    #[default]
    ClickAndScore,
    /// Melody alone from beat 0, no click
    PitchOnly,
}

impl PlaybackMode {
    pub fn has_clicks(self) -> bool {
        self != PlaybackMode::PitchOnly
    }

    pub fn has_pitches(self) -> bool {
        self != PlaybackMode::ClickOnly
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown playback mode {0:?}, expected click-only, click-and-score or pitch-only")]
pub struct UnknownMode(pub String);

impl FromStr for PlaybackMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "click-only" => Ok(PlaybackMode::ClickOnly),
            "click-and-score" => Ok(PlaybackMode::ClickAndScore),
            "pitch-only" => Ok(PlaybackMode::PitchOnly),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlaybackMode::ClickOnly => "click-only",
            PlaybackMode::ClickAndScore => "click-and-score",
            PlaybackMode::PitchOnly => "pitch-only",
        })
    }
}

/// Melody position reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// 0.0 -> 100.0
    pub percent: f64,
    /// Loaded index of the note that just fired; `None` once playback is over
    pub note_index: Option<usize>,
}

impl Progress {
    /// Position after the note at `note_index` fired, counted in load order.
    pub fn playing(note_index: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            (note_index + 1) as f64 / total as f64 * 100.0
        };
        Self {
            percent,
            note_index: Some(note_index),
        }
    }

    /// The "not playing" sentinel sent after the last note.
    pub fn idle() -> Self {
        Self {
            percent: 0.0,
            note_index: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.note_index.is_none()
    }
}

pub type NoteCallback = Arc<dyn Fn(&MelodyNote, usize) + Send + Sync>;
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;
pub type BeatCallback = Arc<dyn Fn(u64, bool) + Send + Sync>;
