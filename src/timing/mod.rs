mod clock;
mod queue;
mod scheduler;
mod sequence;

pub use clock::{AudioClock, ManualClock, SampleClock};
pub use queue::EventQueue;
pub use scheduler::{EventScheduler, SchedulerConfig, TickDriver};
pub use sequence::{
    MelodyNote, TimeSignature, TimeSignatureError, melody_end_beat, seconds_per_beat,
};
