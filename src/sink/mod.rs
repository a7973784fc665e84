//! Audio output sinks.
//!
//! A sink accepts fully-described voices (oscillator + gain curve + start and
//! stop times) and renders them on its own schedule. Once handed over a voice
//! cannot be recalled; `silence_all` is the only way to cut sound short.

mod cpal_backend;
mod recording;

use crate::audio::{GainAutomation, Layer, Waveform};
use crate::timing::AudioClock;
use std::sync::Arc;
use thiserror::Error;

pub use cpal_backend::{CpalSink, OutputStream};
pub use recording::{RecordedCommand, RecordingSink};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("audio output is suspended")]
    Suspended,
    #[error("voice queue is full")]
    QueueFull,
    #[error("audio device error: {0}")]
    Device(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

/// Everything the sink needs to render one tone.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub frequency: f64,
    pub waveform: Waveform,
    /// Detuned second oscillator under the same gain curve
    pub layer: Option<Layer>,
    /// Audio-clock seconds
    pub start: f64,
    /// Audio-clock seconds
    pub stop: f64,
    pub gain: GainAutomation,
}

impl Voice {
    pub fn is_sounding_at(&self, t: f64) -> bool {
        t >= self.start && t < self.stop
    }
}

pub trait OutputSink: Send + Sync {
    /// The device clock every scheduler feeding this sink runs on.
    fn clock(&self) -> Arc<dyn AudioClock>;

    fn schedule_voice(&self, voice: Voice) -> Result<VoiceId, SinkError>;

    /// Ramp every sounding or pending voice to silence starting at `at`.
    fn silence_all(&self, at: f64) -> Result<(), SinkError>;
}
