//! Time-sorted queue of pending events.

use crate::events::{EventId, ScheduledEvent};

/// Pending events kept sorted ascending by time.
///
/// Events sharing a timestamp stay in insertion order, so draining is
/// deterministic for chords and for a click landing on a note onset.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<ScheduledEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: ScheduledEvent) {
        // Insert after every event at the same time (FIFO tie-break)
        let pos = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(pos, event);
    }

    /// Remove a pending event. Returns false if it already fired or never existed.
    pub fn remove(&mut self, id: EventId) -> bool {
        match self.events.iter().position(|e| e.id == id) {
            Some(idx) => {
                self.events.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Take every event with `time <= horizon`, earliest first.
    pub fn drain_due(&mut self, horizon: f64) -> Vec<ScheduledEvent> {
        let due = self.events.partition_point(|e| e.time <= horizon);
        self.events.drain(..due).collect()
    }

    pub fn peek(&self) -> Option<&ScheduledEvent> {
        self.events.first()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.events.iter().any(|e| e.id == id)
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.events.iter().map(|e| e.time)
    }
}
