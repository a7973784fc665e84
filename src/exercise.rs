use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::{
    config::ConfigError,
    player::PlaybackMode,
    timing::{MelodyNote, TimeSignature, TimeSignatureError, melody_end_beat, seconds_per_beat},
};

/// A sight-singing exercise as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub title: String,
    pub tempo_bpm: f64,
    /// `N/D`, e.g. `3/4`
    #[serde(default = "default_time_signature")]
    pub time_signature: String,
    pub notes: Vec<MelodyNote>,
    #[serde(default)]
    pub mode: PlaybackMode,
}

fn default_time_signature() -> String {
    TimeSignature::COMMON.to_string()
}

impl Exercise {
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| ConfigError::io(dir, e))?;
        }
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string).map_err(|e| ConfigError::io(path, e))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_string = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let exercise: Exercise = ron::from_str(&ron_string)?;
        Ok(exercise)
    }

    pub fn time_signature(&self) -> Result<TimeSignature, TimeSignatureError> {
        self.time_signature.parse()
    }

    /// Length of the melody in beats, measured to the last release.
    pub fn length_beats(&self) -> f64 {
        melody_end_beat(&self.notes)
    }

    pub fn length_seconds(&self) -> f64 {
        self.length_beats() * seconds_per_beat(self.tempo_bpm)
    }
}
