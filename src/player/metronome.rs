use super::{BeatCallback, PlaybackError, validate_tempo};
use crate::PlaybackConfig;
use crate::audio::ToneSynthesizer;
use crate::events::EventKind;
use crate::sink::{OutputSink, SinkError};
use crate::timing::{EventScheduler, TimeSignature, seconds_per_beat};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Click voicing: accented downbeat, plain other beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickSounds {
    pub downbeat_hz: f64,
    pub beat_hz: f64,
    /// Seconds
    pub click_duration: f64,
    pub downbeat_velocity: f64,
    pub beat_velocity: f64,
}

impl Default for ClickSounds {
    fn default() -> Self {
        Self {
            downbeat_hz: 1200.0,
            beat_hz: 800.0,
            click_duration: 0.1,
            downbeat_velocity: 0.6,
            beat_velocity: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct MetronomeSession {
    seconds_per_beat: f64,
    beats_per_measure: u32,
    next_note_time: f64,
    /// Beats fired so far in this run
    beat: u64,
}

/// Everything one run's click events need; every click schedules the next.
struct ClickChain {
    scheduler: EventScheduler,
    synth: ToneSynthesizer,
    sounds: ClickSounds,
    session: Arc<Mutex<MetronomeSession>>,
    on_beat: Option<BeatCallback>,
    generation: u64,
}

impl ClickChain {
    fn schedule(self: Arc<Self>, time: f64) {
        let scheduler = self.scheduler.clone();
        scheduler.schedule_event(time, EventKind::MetronomeClick, move || self.fire(time));
    }

    fn fire(self: Arc<Self>, time: f64) {
        // A click left over from an earlier run must not restart the chain
        if !self.scheduler.is_current(self.generation) {
            return;
        }

        let (beat, downbeat, next) = {
            let mut session = self.session.lock();
            let beat = session.beat;
            let downbeat = beat % u64::from(session.beats_per_measure.max(1)) == 0;
            session.beat += 1;
            // Chained from the scheduled time, never from the clock
            session.next_note_time = time + session.seconds_per_beat;
            (beat, downbeat, session.next_note_time)
        };
        // Queue the next beat before any user code can run
        Arc::clone(&self).schedule(next);

        let (frequency, velocity) = if downbeat {
            (self.sounds.downbeat_hz, self.sounds.downbeat_velocity)
        } else {
            (self.sounds.beat_hz, self.sounds.beat_velocity)
        };
        self.synth
            .play_click(frequency, time, self.sounds.click_duration, velocity);
        if let Some(callback) = &self.on_beat {
            callback(beat, downbeat);
        }
        debug!(beat, downbeat, time, "metronome beat");
    }
}

/// Open-ended click track with a drift-free beat grid.
pub struct MetronomePlayer {
    scheduler: EventScheduler,
    synth: ToneSynthesizer,
    sounds: ClickSounds,
    session: Arc<Mutex<MetronomeSession>>,
    on_beat: Option<BeatCallback>,
    tempo_bpm: f64,
    beats_per_measure: u32,
}

impl MetronomePlayer {
    pub fn new(sink: Arc<dyn OutputSink>, config: &PlaybackConfig) -> Self {
        let scheduler = EventScheduler::new(sink.clock(), config.scheduler.clone());
        let beats_per_measure = TimeSignature::COMMON.beats_per_measure;
        Self {
            scheduler,
            synth: config.synthesizer(sink),
            sounds: config.metronome.clone(),
            session: Arc::new(Mutex::new(MetronomeSession {
                seconds_per_beat: seconds_per_beat(config.tempo_bpm),
                beats_per_measure,
                next_note_time: 0.0,
                beat: 0,
            })),
            on_beat: None,
            tempo_bpm: config.tempo_bpm,
            beats_per_measure,
        }
    }

    /// Called with the zero-based beat number and whether it opens a measure.
    pub fn on_beat<F>(&mut self, callback: F)
    where
        F: Fn(u64, bool) + Send + Sync + 'static,
    {
        self.on_beat = Some(Arc::new(callback));
    }

    pub fn start(&mut self, tempo_bpm: f64, beats_per_measure: u32) -> Result<(), PlaybackError> {
        let tempo = validate_tempo(tempo_bpm)?;
        if beats_per_measure == 0 {
            return Err(PlaybackError::InvalidMeter);
        }
        if self.scheduler.is_running() {
            debug!("metronome already running");
            return Ok(());
        }
        self.tempo_bpm = tempo;
        self.beats_per_measure = beats_per_measure;

        self.scheduler.start();
        let first = self.scheduler.epoch();
        *self.session.lock() = MetronomeSession {
            seconds_per_beat: seconds_per_beat(tempo),
            beats_per_measure,
            next_note_time: first,
            beat: 0,
        };

        let chain = Arc::new(ClickChain {
            scheduler: self.scheduler.clone(),
            synth: self.synth.clone(),
            sounds: self.sounds.clone(),
            session: self.session.clone(),
            on_beat: self.on_beat.clone(),
            generation: self.scheduler.generation(),
        });
        chain.schedule(first);

        info!(tempo, beats_per_measure, first, "metronome started");
        Ok(())
    }

    pub fn start_with_time_signature(
        &mut self,
        tempo_bpm: f64,
        time_signature: TimeSignature,
    ) -> Result<(), PlaybackError> {
        self.start(tempo_bpm, time_signature.beats_per_measure)
    }

    pub fn stop(&mut self) {
        if self.scheduler.is_running() {
            self.scheduler.stop();
            info!(beats = self.session.lock().beat, "metronome stopped");
        }
    }

    /// Applies from the next unscheduled beat; the one already queued keeps its time.
    pub fn set_tempo(&mut self, tempo_bpm: f64) -> Result<(), PlaybackError> {
        let tempo = validate_tempo(tempo_bpm)?;
        self.tempo_bpm = tempo;
        self.session.lock().seconds_per_beat = seconds_per_beat(tempo);
        debug!(tempo, "metronome tempo changed");
        Ok(())
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn beats_per_measure(&self) -> u32 {
        self.beats_per_measure
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn current_time(&self) -> f64 {
        self.scheduler.current_time()
    }

    /// Number of the last beat that fired in this run.
    pub fn current_beat(&self) -> Option<u64> {
        if !self.is_running() {
            return None;
        }
        self.session.lock().beat.checked_sub(1)
    }

    pub fn beats_fired(&self) -> u64 {
        self.session.lock().beat
    }

    /// Audio-clock time of the next click, while running.
    pub fn next_beat_time(&self) -> Option<f64> {
        self.is_running().then(|| self.session.lock().next_note_time)
    }

    pub fn silence_now(&self) -> Result<(), SinkError> {
        let now = self.scheduler.clock().now();
        self.synth
            .sink()
            .silence_all(now)
            .inspect_err(|e| warn!(error = %e, "could not silence output"))
    }

    /// Drive one lookahead pass from the host loop (`TickDriver::Host`).
    pub fn tick(&self) -> usize {
        self.scheduler.tick()
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }
}

impl Drop for MetronomePlayer {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}
