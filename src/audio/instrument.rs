use super::ToneEnvelope;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Sample at `phase` in cycles, wrapped into [0, 1).
    pub fn sample(&self, phase: f64) -> f64 {
        let phase = phase.rem_euclid(1.0);
        match self {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => phase * 2.0 - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

/// Second oscillator mixed under the main one, detuned in cents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layer {
    pub waveform: Waveform,
    pub detune_cents: f64,
    /// Mix level relative to the main oscillator
    pub gain: f64,
}

impl Layer {
    /// Multiplier applied to the main oscillator's frequency.
    pub fn frequency_ratio(&self) -> f64 {
        2f64.powf(self.detune_cents / 1200.0)
    }
}

/// A named oscillator stack plus its envelope.
///
/// Decay and release are fractions of the note, like `ToneEnvelope`: the
/// keyboard timings over a two-second reference note, capped at half of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentPreset {
    pub id: u32,
    pub name: &'static str,
    pub waveform: Waveform,
    pub layer: Option<Layer>,
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

const fn layer(waveform: Waveform, detune_cents: f64, gain: f64) -> Option<Layer> {
    Some(Layer {
        waveform,
        detune_cents,
        gain,
    })
}

pub static PRESETS: [InstrumentPreset; 8] = [
    InstrumentPreset {
        id: 0,
        name: "Acoustic Piano",
        waveform: Waveform::Triangle,
        layer: layer(Waveform::Sine, 2.0, 0.3),
        attack: 0.005,
        decay: 0.15,
        sustain: 0.4,
        release: 0.25,
    },
    InstrumentPreset {
        id: 1,
        name: "Bright Piano",
        waveform: Waveform::Triangle,
        layer: layer(Waveform::Sawtooth, 1.0, 0.15),
        attack: 0.002,
        decay: 0.1,
        sustain: 0.5,
        release: 0.2,
    },
    InstrumentPreset {
        id: 2,
        name: "Electric Piano",
        waveform: Waveform::Sine,
        layer: layer(Waveform::Triangle, 5.0, 0.4),
        attack: 0.01,
        decay: 0.25,
        sustain: 0.3,
        release: 0.4,
    },
    InstrumentPreset {
        id: 3,
        name: "Honky-tonk",
        waveform: Waveform::Triangle,
        layer: layer(Waveform::Triangle, 15.0, 0.5),
        attack: 0.005,
        decay: 0.125,
        sustain: 0.35,
        release: 0.2,
    },
    InstrumentPreset {
        id: 4,
        name: "Organ",
        waveform: Waveform::Sine,
        layer: layer(Waveform::Sine, 1200.0, 0.5),
        attack: 0.05,
        decay: 0.05,
        sustain: 0.9,
        release: 0.05,
    },
    InstrumentPreset {
        id: 5,
        name: "Church Organ",
        waveform: Waveform::Sine,
        layer: layer(Waveform::Triangle, 1200.0, 0.6),
        attack: 0.1,
        decay: 0.1,
        sustain: 0.85,
        release: 0.15,
    },
    InstrumentPreset {
        id: 6,
        name: "Strings",
        waveform: Waveform::Sawtooth,
        layer: layer(Waveform::Sawtooth, 7.0, 0.5),
        attack: 0.2,
        decay: 0.15,
        sustain: 0.7,
        release: 0.25,
    },
    InstrumentPreset {
        id: 7,
        name: "Violin",
        waveform: Waveform::Sawtooth,
        layer: None,
        attack: 0.1,
        decay: 0.1,
        sustain: 0.8,
        release: 0.15,
    },
];

impl InstrumentPreset {
    /// Look a preset up by id. Unknown ids fall back to the acoustic piano.
    pub fn by_id(id: u32) -> &'static InstrumentPreset {
        PRESETS.iter().find(|p| p.id == id).unwrap_or_else(|| {
            warn!(id, "unknown instrument, using {}", PRESETS[0].name);
            &PRESETS[0]
        })
    }

    /// This preset's ADSR; floor and stop padding come from `base`.
    pub fn envelope(&self, base: &ToneEnvelope) -> ToneEnvelope {
        ToneEnvelope {
            attack: self.attack,
            decay: self.decay,
            sustain: self.sustain,
            release: self.release,
            ..base.clone()
        }
    }
}
