use super::{NoteCallback, Progress, ProgressCallback, PlaybackError, validate_tempo};
use crate::PlaybackConfig;
use crate::audio::ToneSynthesizer;
use crate::events::EventKind;
use crate::sink::{OutputSink, SinkError};
use crate::timing::{EventScheduler, MelodyNote, melody_end_beat, seconds_per_beat};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Plays a beat-relative melody through the synthesizer.
///
/// `start` converts every note to an absolute audio-clock time once; a tempo
/// change afterwards only affects the next `start`.
pub struct MelodyPlayer {
    scheduler: EventScheduler,
    synth: ToneSynthesizer,
    notes: Vec<MelodyNote>,
    tempo_bpm: f64,
    /// Tempo the current schedule was computed with
    scheduled_tempo: f64,
    /// Beats between `start` and beat 0 of the melody
    lead_in_beats: f64,
    /// Events still fire but no tone reaches the synthesizer
    muted: bool,
    default_velocity: f64,
    on_note: Option<NoteCallback>,
    on_progress: Option<ProgressCallback>,
}

impl MelodyPlayer {
    pub fn new(sink: Arc<dyn OutputSink>, config: &PlaybackConfig) -> Self {
        let scheduler = EventScheduler::new(sink.clock(), config.scheduler.clone());
        Self {
            scheduler,
            synth: config.synthesizer(sink),
            notes: Vec::new(),
            tempo_bpm: config.tempo_bpm,
            scheduled_tempo: config.tempo_bpm,
            lead_in_beats: 0.0,
            muted: false,
            default_velocity: config.default_velocity,
            on_note: None,
            on_progress: None,
        }
    }

    pub fn on_note<F>(&mut self, callback: F)
    where
        F: Fn(&MelodyNote, usize) + Send + Sync + 'static,
    {
        self.on_note = Some(Arc::new(callback));
    }

    pub fn on_progress<F>(&mut self, callback: F)
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
    }

    /// Replace the melody. Nothing is scheduled until `start`.
    pub fn load_melody(&mut self, notes: Vec<MelodyNote>) {
        debug!(notes = notes.len(), "melody loaded");
        self.notes = notes;
    }

    pub fn notes(&self) -> &[MelodyNote] {
        &self.notes
    }

    /// Tempo for the next `play`; a running melody keeps its timing.
    pub fn set_tempo(&mut self, tempo_bpm: f64) -> Result<(), PlaybackError> {
        self.tempo_bpm = validate_tempo(tempo_bpm)?;
        Ok(())
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    /// Follow the melody without sounding it. Takes effect at the next `start`.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Start at the tempo last given to `set_tempo` (or the configured default).
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        self.start(self.tempo_bpm)
    }

    pub fn start(&mut self, tempo_bpm: f64) -> Result<(), PlaybackError> {
        self.start_with_lead_in(tempo_bpm, 0.0)
    }

    /// Start with beat 0 of the melody `lead_in_beats` after now, leaving room
    /// for a count-in measure on the metronome.
    pub fn start_with_lead_in(
        &mut self,
        tempo_bpm: f64,
        lead_in_beats: f64,
    ) -> Result<(), PlaybackError> {
        let tempo = validate_tempo(tempo_bpm)?;
        if !lead_in_beats.is_finite() || lead_in_beats < 0.0 {
            return Err(PlaybackError::InvalidLeadIn(lead_in_beats));
        }
        if self.scheduler.is_running() {
            debug!("melody already playing");
            return Ok(());
        }
        self.tempo_bpm = tempo;
        self.scheduled_tempo = tempo;
        self.lead_in_beats = lead_in_beats;

        self.scheduler.start();
        let spb = seconds_per_beat(tempo);
        let reference = self.scheduler.epoch() + lead_in_beats * spb;
        let total = self.notes.len();
        let muted = self.muted;

        for (index, note) in self.notes.iter().enumerate() {
            let time = reference + note.start_beat * spb;
            let duration = note.duration_beats * spb;
            let velocity = note.velocity.unwrap_or(self.default_velocity);

            let note = note.clone();
            let synth = self.synth.clone();
            let on_note = self.on_note.clone();
            let on_progress = self.on_progress.clone();

            self.scheduler.schedule_event(time, EventKind::Note, move || {
                if !muted {
                    synth.play_note(&note.pitch, time, duration, velocity);
                }
                if let Some(callback) = &on_note {
                    callback(&note, index);
                }
                if let Some(callback) = &on_progress {
                    callback(Progress::playing(index, total));
                }
            });
        }

        let end = reference + melody_end_beat(&self.notes) * spb;
        let scheduler = self.scheduler.clone();
        let on_progress = self.on_progress.clone();
        self.scheduler.schedule_event(end, EventKind::Marker, move || {
            // Idle before the listener hears about it
            scheduler.stop();
            info!("melody finished");
            if let Some(callback) = &on_progress {
                callback(Progress::idle());
            }
        });

        info!(notes = total, tempo, reference, muted, "melody started");
        Ok(())
    }

    /// Drop every unfired note. Notes already handed to the sink ring out.
    pub fn stop(&mut self) {
        if self.scheduler.is_running() {
            self.scheduler.stop();
            info!("melody stopped");
        }
    }

    /// Cut everything on the output sink short, including other players' voices.
    pub fn silence_now(&self) -> Result<(), SinkError> {
        let now = self.scheduler.clock().now();
        self.synth
            .sink()
            .silence_all(now)
            .inspect_err(|e| warn!(error = %e, "could not silence output"))
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Seconds since `start`, 0 while idle.
    pub fn current_time(&self) -> f64 {
        self.scheduler.current_time()
    }

    /// Melody beat at the tempo it was scheduled with. Negative during a lead-in.
    pub fn current_beat(&self) -> Option<f64> {
        self.is_running().then(|| {
            self.current_time() / seconds_per_beat(self.scheduled_tempo) - self.lead_in_beats
        })
    }

    /// Drive one lookahead pass from the host loop (`TickDriver::Host`).
    pub fn tick(&self) -> usize {
        self.scheduler.tick()
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }
}

impl Drop for MelodyPlayer {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}
