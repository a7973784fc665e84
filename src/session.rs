//! Practice session engine: melody plus metronome behind a command channel.

use crate::{
    Exercise, PlaybackConfig,
    player::{MelodyPlayer, MetronomePlayer, PlaybackMode, Progress},
    sink::OutputSink,
    timing::{TickDriver, TimeSignature},
};
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub enum SessionCommand {
    Load(Exercise),
    Play,
    Stop,
    /// Takes effect at the next `Play`. A running melody and its click keep
    /// the tempo they started with so they never drift apart.
    SetTempo(f64),
    /// Takes effect at the next `Play`; disabling also stops a running click.
    SetMetronome(bool),
    /// Overrides the loaded exercise's mode from the next `Play`.
    SetMode(PlaybackMode),
    Silence,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    ExerciseLoaded { title: String, notes: usize },
    PlaybackState { playing: bool },
    NoteStarted { index: usize, pitch: String },
    Progress(Progress),
    Beat { beat: u64, downbeat: bool },
    Finished,
    Error { message: String },
}

/// Dropping the handle shuts the session down.
pub struct SessionHandle {
    pub command_tx: Sender<SessionCommand>,
    pub update_rx: Receiver<SessionUpdate>,
}

pub fn spawn_session(
    sink: Arc<dyn OutputSink>,
    config: PlaybackConfig,
) -> std::io::Result<SessionHandle> {
    let (command_tx, command_rx) = channel::unbounded();
    let (update_tx, update_rx) = channel::unbounded();

    thread::Builder::new()
        .name("practice-session".into())
        .spawn(move || session_thread(sink, config, command_rx, update_tx))?;

    Ok(SessionHandle {
        command_tx,
        update_rx,
    })
}

struct SessionState {
    melody: MelodyPlayer,
    metronome: MetronomePlayer,
    exercise: Option<Exercise>,
    tempo_bpm: f64,
    mode: PlaybackMode,
    metronome_enabled: bool,
    playing: bool,
    updates: Sender<SessionUpdate>,
}

fn session_thread(
    sink: Arc<dyn OutputSink>,
    config: PlaybackConfig,
    command_rx: Receiver<SessionCommand>,
    update_tx: Sender<SessionUpdate>,
) {
    let (done_tx, done_rx) = channel::unbounded();
    let mut state = SessionState::new(sink, &config, update_tx, done_tx);

    let ticker = match config.scheduler.driver {
        TickDriver::Host => channel::tick(config.scheduler.lookahead()),
        TickDriver::Background => channel::never(),
    };

    loop {
        channel::select! {
            recv(command_rx) -> command => match command {
                Ok(command) => state.handle(command),
                Err(channel::RecvError) => break,
            },
            recv(done_rx) -> _ => state.finished(),
            recv(ticker) -> _ => {
                state.melody.tick();
                state.metronome.tick();
            }
        }
    }
    debug!("session thread exiting");
}

impl SessionState {
    fn new(
        sink: Arc<dyn OutputSink>,
        config: &PlaybackConfig,
        updates: Sender<SessionUpdate>,
        done: Sender<()>,
    ) -> Self {
        let mut melody = MelodyPlayer::new(sink.clone(), config);
        let mut metronome = MetronomePlayer::new(sink, config);

        let note_tx = updates.clone();
        melody.on_note(move |note, index| {
            let _ = note_tx.send(SessionUpdate::NoteStarted {
                index,
                pitch: note.pitch.clone(),
            });
        });

        let progress_tx = updates.clone();
        melody.on_progress(move |progress| {
            let _ = progress_tx.send(SessionUpdate::Progress(progress));
            if progress.is_idle() {
                let _ = done.send(());
            }
        });

        let beat_tx = updates.clone();
        metronome.on_beat(move |beat, downbeat| {
            let _ = beat_tx.send(SessionUpdate::Beat { beat, downbeat });
        });

        Self {
            melody,
            metronome,
            exercise: None,
            tempo_bpm: config.tempo_bpm,
            mode: PlaybackMode::default(),
            metronome_enabled: true,
            playing: false,
            updates,
        }
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Load(exercise) => self.load(exercise),
            SessionCommand::Play => self.play(),
            SessionCommand::Stop => self.stop(),
            SessionCommand::SetTempo(tempo) => match self.melody.set_tempo(tempo) {
                Ok(()) => {
                    self.tempo_bpm = tempo;
                    if self.playing {
                        debug!(tempo, "tempo change deferred to the next play");
                    }
                }
                Err(e) => self.error(e.to_string()),
            },
            SessionCommand::SetMetronome(enabled) => {
                self.metronome_enabled = enabled;
                if !enabled {
                    self.metronome.stop();
                }
            }
            SessionCommand::SetMode(mode) => {
                debug!(%mode, "playback mode set");
                self.mode = mode;
            }
            SessionCommand::Silence => {
                if let Err(e) = self.melody.silence_now() {
                    self.error(e.to_string());
                }
            }
        }
    }

    fn load(&mut self, exercise: Exercise) {
        if self.playing {
            self.stop();
        }
        if let Err(e) = self.melody.set_tempo(exercise.tempo_bpm) {
            self.error(format!("Failed to load exercise: {}", e));
            return;
        }
        self.tempo_bpm = exercise.tempo_bpm;
        self.mode = exercise.mode;
        self.melody.load_melody(exercise.notes.clone());

        info!(title = %exercise.title, notes = exercise.notes.len(), "exercise loaded");
        self.send(SessionUpdate::ExerciseLoaded {
            title: exercise.title.clone(),
            notes: exercise.notes.len(),
        });
        self.exercise = Some(exercise);
    }

    fn play(&mut self) {
        if self.playing {
            return;
        }
        let Some(exercise) = &self.exercise else {
            self.error("no exercise loaded".into());
            return;
        };
        let meter = exercise.time_signature().unwrap_or_else(|e| {
            warn!(error = %e, "falling back to 4/4");
            TimeSignature::COMMON
        });

        let clicks = self.metronome_enabled && self.mode.has_clicks();
        let lead_in = if clicks {
            f64::from(meter.beats_per_measure)
        } else {
            0.0
        };

        self.melody.set_muted(!self.mode.has_pitches());
        if let Err(e) = self.melody.start_with_lead_in(self.tempo_bpm, lead_in) {
            self.error(format!("Failed to start melody: {}", e));
            return;
        }
        if clicks {
            if let Err(e) = self
                .metronome
                .start_with_time_signature(self.tempo_bpm, meter)
            {
                self.error(format!("Failed to start metronome: {}", e));
            }
        }

        self.playing = true;
        info!(mode = %self.mode, tempo = self.tempo_bpm, lead_in, "playing");
        self.send(SessionUpdate::PlaybackState { playing: true });
    }

    fn stop(&mut self) {
        self.melody.stop();
        self.metronome.stop();
        if self.playing {
            self.playing = false;
            self.send(SessionUpdate::PlaybackState { playing: false });
            self.send(SessionUpdate::Progress(Progress::idle()));
        }
    }

    /// The melody reached its end marker on its own.
    fn finished(&mut self) {
        // A completion queued before a Stop/Play pair belongs to the old run
        if self.melody.is_running() {
            debug!("ignoring completion from a previous run");
            return;
        }
        self.metronome.stop();
        if self.playing {
            self.playing = false;
            self.send(SessionUpdate::PlaybackState { playing: false });
            self.send(SessionUpdate::Finished);
        }
    }

    fn error(&self, message: String) {
        warn!(%message, "session error");
        self.send(SessionUpdate::Error { message });
    }

    fn send(&self, update: SessionUpdate) {
        let _ = self.updates.send(update);
    }
}
