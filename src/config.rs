use crate::audio::{InstrumentPreset, ToneEnvelope, ToneSynthesizer, Waveform};
use crate::player::ClickSounds;
use crate::sink::OutputSink;
use crate::timing::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid RON: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("could not serialize: {0}")]
    Serialize(#[from] ron::Error),
}

impl ConfigError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Tunables shared by both players. Every field has a default, so a config
/// file only needs the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub scheduler: SchedulerConfig,
    pub envelope: ToneEnvelope,
    pub waveform: Waveform,
    /// Preset id; when set it replaces `waveform` and the envelope's ADSR
    pub instrument: Option<u32>,
    /// 0.0 -> 1.0, applied on top of each note's velocity
    pub master_volume: f64,
    /// Velocity for notes that carry none
    pub default_velocity: f64,
    pub tempo_bpm: f64,
    pub metronome: ClickSounds,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            envelope: ToneEnvelope::default(),
            waveform: Waveform::default(),
            instrument: None,
            master_volume: 0.5,
            default_velocity: 0.8,
            tempo_bpm: 120.0,
            metronome: ClickSounds::default(),
        }
    }
}

impl PlaybackConfig {
    /// Defaults with a host-driven scheduler; nothing spawns a thread.
    pub fn host_driven() -> Self {
        Self {
            scheduler: SchedulerConfig::host_driven(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::from_ron_str(&text)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn synthesizer(&self, sink: Arc<dyn OutputSink>) -> ToneSynthesizer {
        let synth = ToneSynthesizer::new(sink, self.envelope.clone())
            .with_waveform(self.waveform)
            .with_volume(self.master_volume);
        match self.instrument {
            Some(id) => synth.with_preset(InstrumentPreset::by_id(id)),
            None => synth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TickDriver;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = PlaybackConfig::from_ron_str(
            "(master_volume: 0.9, scheduler: (driver: Host), metronome: (beat_hz: 600.0))",
        )
        .unwrap();

        assert_eq!(config.master_volume, 0.9);
        assert_eq!(config.scheduler.driver, TickDriver::Host);
        assert_eq!(config.scheduler.lookahead_ms, 25);
        assert_eq!(config.metronome.beat_hz, 600.0);
        assert_eq!(config.metronome.downbeat_hz, 1200.0);
        assert_eq!(config.default_velocity, 0.8);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = PlaybackConfig::from_ron_str("()").unwrap();
        assert_eq!(config.tempo_bpm, 120.0);
        assert_eq!(config.scheduler.schedule_ahead, 0.1);
    }

    #[test]
    fn pretty_output_reads_back() {
        let mut config = PlaybackConfig::default();
        config.waveform = Waveform::Triangle;
        let text = config.to_ron_string().unwrap();
        let back = PlaybackConfig::from_ron_str(&text).unwrap();
        assert_eq!(back.waveform, Waveform::Triangle);
    }

    #[test]
    fn malformed_ron_is_a_parse_error() {
        assert!(matches!(
            PlaybackConfig::from_ron_str("(master_volume: )"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = PlaybackConfig::load(Path::new("/nonexistent/playback.ron")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/playback.ron"));
    }

    #[test]
    fn synthesizer_uses_configured_voice() {
        let sink = Arc::new(crate::sink::RecordingSink::new(0.0));
        let config = PlaybackConfig {
            master_volume: 0.25,
            waveform: Waveform::Square,
            ..PlaybackConfig::default()
        };
        let synth = config.synthesizer(sink);
        assert_eq!(synth.volume(), 0.25);
        assert_eq!(synth.waveform(), Waveform::Square);
    }

    #[test]
    fn instrument_preset_overrides_the_voice() {
        let sink = Arc::new(crate::sink::RecordingSink::new(0.0));
        let config = PlaybackConfig::from_ron_str("(instrument: Some(6), waveform: Square)").unwrap();
        let synth = config.synthesizer(sink.clone());
        assert_eq!(synth.waveform(), Waveform::Sawtooth);
        assert_eq!(synth.layer().unwrap().detune_cents, 7.0);
        assert_eq!(synth.envelope().attack, 0.2);

        let unknown = PlaybackConfig {
            instrument: Some(42),
            ..PlaybackConfig::default()
        };
        let synth = unknown.synthesizer(sink);
        assert_eq!(synth.waveform(), Waveform::Triangle);
        assert_eq!(synth.layer().unwrap().detune_cents, 2.0);
    }
}
