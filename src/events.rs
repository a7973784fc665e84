use std::fmt;

/// Handle returned by `EventScheduler::schedule_event`, only good for cancelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Note,
    MetronomeClick,
    Marker,
}

pub type EventCallback = Box<dyn FnOnce() + Send + 'static>;

pub struct ScheduledEvent {
    pub id: EventId,
    /// Absolute audio-clock seconds
    pub time: f64,
    pub kind: EventKind,
    pub callback: EventCallback,
}

impl ScheduledEvent {
    pub fn fire(self) {
        (self.callback)()
    }
}

impl fmt::Debug for ScheduledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledEvent")
            .field("id", &self.id)
            .field("time", &self.time)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
