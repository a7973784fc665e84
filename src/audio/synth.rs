use super::{
    GainAutomation, InstrumentPreset, Layer, PitchError, ToneEnvelope, Waveform, click_shape,
    frequency_of,
};
use crate::sink::{OutputSink, SinkError, Voice, VoiceId};
use std::sync::Arc;
use thiserror::Error;
use tracing::{trace, warn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    #[error(transparent)]
    Pitch(#[from] PitchError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("invalid frequency {0} Hz")]
    InvalidFrequency(f64),
}

/// Programs enveloped oscillator voices on a shared output sink.
///
/// The `play_*` methods never fail: a bad pitch or an unavailable device is
/// logged and that single tone is skipped. `try_play_*` return the error.
#[derive(Clone)]
pub struct ToneSynthesizer {
    sink: Arc<dyn OutputSink>,
    envelope: ToneEnvelope,
    waveform: Waveform,
    layer: Option<Layer>,
    volume: f64,
}

impl ToneSynthesizer {
    pub fn new(sink: Arc<dyn OutputSink>, envelope: ToneEnvelope) -> Self {
        Self {
            sink,
            envelope,
            waveform: Waveform::default(),
            layer: None,
            volume: 1.0,
        }
    }

    pub fn with_waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }

    /// Take waveform, second oscillator and ADSR from `preset`.
    pub fn with_preset(mut self, preset: &InstrumentPreset) -> Self {
        self.set_preset(preset);
        self
    }

    pub fn set_preset(&mut self, preset: &InstrumentPreset) {
        self.waveform = preset.waveform;
        self.layer = preset.layer;
        self.envelope = preset.envelope(&self.envelope);
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.set_volume(volume);
        self
    }

    /// Master volume, 0.0 -> 1.0
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn layer(&self) -> Option<Layer> {
        self.layer
    }

    pub fn envelope(&self) -> &ToneEnvelope {
        &self.envelope
    }

    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }

    pub fn try_play_tone(
        &self,
        frequency: f64,
        start: f64,
        duration: f64,
        velocity: f64,
    ) -> Result<VoiceId, SynthError> {
        let gain = self.envelope.shape(start, duration, self.peak(velocity));
        let stop = self.envelope.stop_time(start, duration);
        self.submit(frequency, self.layer, start, stop, gain)
    }

    pub fn try_play_note(
        &self,
        pitch: &str,
        start: f64,
        duration: f64,
        velocity: f64,
    ) -> Result<VoiceId, SynthError> {
        let frequency = frequency_of(pitch)?;
        self.try_play_tone(frequency, start, duration, velocity)
    }

    pub fn play_tone(&self, frequency: f64, start: f64, duration: f64, velocity: f64) -> Option<VoiceId> {
        self.try_play_tone(frequency, start, duration, velocity)
            .map_err(|e| warn!(frequency, start, error = %e, "tone skipped"))
            .ok()
    }

    pub fn play_note(&self, pitch: &str, start: f64, duration: f64, velocity: f64) -> Option<VoiceId> {
        self.try_play_note(pitch, start, duration, velocity)
            .map_err(|e| warn!(pitch, start, error = %e, "note skipped"))
            .ok()
    }

    /// Short percussive tone with a fixed exponential decay.
    /// A zero peak (velocity or volume) programs nothing.
    pub fn play_click(&self, frequency: f64, start: f64, duration: f64, velocity: f64) -> Option<VoiceId> {
        let peak = self.peak(velocity);
        if peak <= 0.0 {
            trace!(frequency, start, "silent click skipped");
            return None;
        }
        let gain = click_shape(start, duration, peak);
        let stop = start + duration.max(0.0) + self.envelope.stop_padding;
        self.submit(frequency, None, start, stop, gain)
            .map_err(|e| warn!(frequency, start, error = %e, "click skipped"))
            .ok()
    }

    fn peak(&self, velocity: f64) -> f64 {
        velocity.clamp(0.0, 1.0) * self.volume
    }

    fn submit(
        &self,
        frequency: f64,
        layer: Option<Layer>,
        start: f64,
        stop: f64,
        gain: GainAutomation,
    ) -> Result<VoiceId, SynthError> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(SynthError::InvalidFrequency(frequency));
        }
        let id = self.sink.schedule_voice(Voice {
            frequency,
            waveform: self.waveform,
            layer,
            start,
            stop,
            gain,
        })?;
        trace!(?id, frequency, start, stop, "voice programmed");
        Ok(id)
    }
}
