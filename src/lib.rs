//! Sample-accurate playback for sight-singing practice.
//!
//! A coarse timer repeatedly looks a short way ahead on the audio clock and
//! programs every tone falling inside that window directly on the output sink.
//! Melodies and the metronome are both built on that one scheduler.

pub mod audio;
pub mod config;
pub mod events;
pub mod exercise;
pub mod player;
pub mod session;
pub mod sink;
pub mod timing;

pub use audio::{
    InstrumentPreset, Pitch, ToneEnvelope, ToneSynthesizer, Waveform, frequency_of,
};
pub use config::{ConfigError, PlaybackConfig};
pub use events::{EventId, EventKind};
pub use exercise::Exercise;
pub use player::{
    ClickSounds, MelodyPlayer, MetronomePlayer, PlaybackError, PlaybackMode, Progress,
};
pub use session::{SessionCommand, SessionHandle, SessionUpdate, spawn_session};
pub use sink::{CpalSink, OutputSink, OutputStream, RecordingSink, SinkError};
pub use timing::{
    AudioClock, EventScheduler, MelodyNote, SchedulerConfig, TickDriver, TimeSignature,
};
