//! Lookahead event scheduler.
//!
//! A coarse repeating timer only *checks* the queue; every check fires the
//! events that fall inside `now + schedule_ahead` on the audio clock. Sound is
//! therefore programmed slightly before it is heard, and timer jitter never
//! reaches the audible timing.

use super::{AudioClock, EventQueue};
use crate::events::{EventId, EventKind, ScheduledEvent};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Who calls `tick()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TickDriver {
    /// A dedicated thread ticks every `lookahead_ms`.
    #[default]
    Background,
    /// Nothing is spawned; the host loop calls `tick()` itself.
    Host,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Milliseconds between queue checks
    pub lookahead_ms: u64,
    /// Seconds of audio-clock time programmed ahead of each check
    pub schedule_ahead: f64,
    pub driver: TickDriver,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_ms: 25,
            schedule_ahead: 0.1,
            driver: TickDriver::Background,
        }
    }
}

impl SchedulerConfig {
    pub fn host_driven() -> Self {
        Self {
            driver: TickDriver::Host,
            ..Self::default()
        }
    }

    pub fn lookahead(&self) -> Duration {
        Duration::from_millis(self.lookahead_ms.max(1))
    }
}

#[derive(Default)]
struct SchedulerState {
    queue: EventQueue,
    running: bool,
    epoch: f64,
    /// Bumped on every start so a stale tick thread can tell it is stale
    generation: u64,
    next_id: u64,
    stop_tx: Option<Sender<()>>,
}

struct Shared {
    clock: Arc<dyn AudioClock>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
}

/// Cloneable handle; all clones drive the same queue.
///
/// The state lock is never held while a callback runs, so callbacks may
/// schedule, cancel or stop on the scheduler that fired them.
#[derive(Clone)]
pub struct EventScheduler {
    shared: Arc<Shared>,
}

impl EventScheduler {
    pub fn new(clock: Arc<dyn AudioClock>, config: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                clock,
                config,
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    pub fn start(&self) {
        let mut state = self.shared.state.lock();
        if state.running {
            return;
        }
        state.running = true;
        state.epoch = self.shared.clock.now();
        state.generation += 1;
        let generation = state.generation;
        let epoch = state.epoch;

        let stop_rx = if self.shared.config.driver == TickDriver::Background {
            let (stop_tx, stop_rx) = channel::bounded(1);
            state.stop_tx = Some(stop_tx);
            Some(stop_rx)
        } else {
            None
        };
        drop(state);

        if let Some(stop_rx) = stop_rx {
            self.spawn_ticker(generation, stop_rx);
        }
        info!(epoch, generation, "scheduler started");
    }

    /// Stops ticking and drops every queued event. Tones already handed to the
    /// output sink keep playing.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if !state.running {
            return;
        }
        state.running = false;
        // Dropping the sender disconnects the tick thread's stop channel
        state.stop_tx = None;
        let stale = std::mem::take(&mut state.queue);
        drop(state);

        info!(discarded = stale.len(), "scheduler stopped");
        drop(stale);
    }

    /// Enqueue `callback` to run once the lookahead window reaches `time`.
    /// Times already in the past fire on the next tick.
    pub fn schedule_event<F>(&self, time: f64, kind: EventKind, callback: F) -> EventId
    where
        F: FnOnce() + Send + 'static,
    {
        // NaN would never compare due and would block everything behind it
        let time = if time.is_nan() {
            warn!(?kind, "event time is NaN, firing on the next tick");
            f64::NEG_INFINITY
        } else {
            time
        };
        let mut state = self.shared.state.lock();
        state.next_id += 1;
        let id = EventId(state.next_id);
        state.queue.push(ScheduledEvent {
            id,
            time,
            kind,
            callback: Box::new(callback),
        });
        trace!(?id, ?kind, time, "event scheduled");
        id
    }

    pub fn cancel_event(&self, id: EventId) -> bool {
        let removed = self.shared.state.lock().queue.remove(id);
        if removed {
            trace!(?id, "event cancelled");
        }
        removed
    }

    /// One lookahead pass. Returns how many callbacks ran.
    pub fn tick(&self) -> usize {
        let generation = {
            let state = self.shared.state.lock();
            if !state.running {
                return 0;
            }
            state.generation
        };
        self.tick_run(generation).unwrap_or(0)
    }

    /// `None` once the run identified by `generation` is over.
    fn tick_run(&self, generation: u64) -> Option<usize> {
        let due = {
            let mut state = self.shared.state.lock();
            if !state.running || state.generation != generation {
                return None;
            }
            let horizon = self.shared.clock.now() + self.shared.config.schedule_ahead;
            state.queue.drain_due(horizon)
        };

        let mut fired = 0;
        for event in due {
            if !self.is_current(generation) {
                debug!("scheduler stopped mid-tick, dropping the rest of the batch");
                break;
            }
            let (id, kind, time) = (event.id, event.kind, event.time);
            trace!(?id, ?kind, time, "firing event");
            if panic::catch_unwind(AssertUnwindSafe(|| event.fire())).is_err() {
                error!(?id, ?kind, time, "event callback panicked");
            }
            fired += 1;
        }
        Some(fired)
    }

    fn spawn_ticker(&self, generation: u64, stop_rx: Receiver<()>) {
        let scheduler = self.clone();
        let interval = self.shared.config.lookahead();

        let spawned = thread::Builder::new()
            .name("event-scheduler".into())
            .spawn(move || {
                let ticker = channel::tick(interval);
                loop {
                    channel::select! {
                        recv(ticker) -> _ => {
                            if scheduler.tick_run(generation).is_none() {
                                break;
                            }
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                debug!(generation, "tick loop exited");
            });

        if let Err(e) = spawned {
            error!(error = %e, "could not spawn tick thread, host must call tick()");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    pub(crate) fn generation(&self) -> u64 {
        self.shared.state.lock().generation
    }

    /// True while the run started as `generation` is still active.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        let state = self.shared.state.lock();
        state.running && state.generation == generation
    }

    /// Audio-clock time captured by the last `start()`.
    pub fn epoch(&self) -> f64 {
        self.shared.state.lock().epoch
    }

    /// Seconds since `start()`, 0 while stopped.
    pub fn current_time(&self) -> f64 {
        let state = self.shared.state.lock();
        if !state.running {
            return 0.0;
        }
        self.shared.clock.now() - state.epoch
    }

    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn next_event_time(&self) -> Option<f64> {
        self.shared.state.lock().queue.peek().map(|e| e.time)
    }

    pub fn is_pending(&self, id: EventId) -> bool {
        self.shared.state.lock().queue.contains(id)
    }

    pub fn clock(&self) -> Arc<dyn AudioClock> {
        self.shared.clock.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }
}
