mod envelope;
mod instrument;
mod pitch;
mod synth;

pub use envelope::{GainAutomation, GainPoint, ToneEnvelope, click_shape};
pub use instrument::{InstrumentPreset, Layer, PRESETS, Waveform};
pub use pitch::{Pitch, PitchError, frequency_of};
pub use synth::{SynthError, ToneSynthesizer};
