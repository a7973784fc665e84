use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic time source owned by the audio device, in seconds.
pub trait AudioClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Clock advanced explicitly by its owner. Used for tests and offline rendering.
#[derive(Debug, Default)]
pub struct ManualClock {
    seconds: AtomicU64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            seconds: AtomicU64::new(start.to_bits()),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.seconds.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::Relaxed))
    }
}

/// Clock derived from a rendered-sample counter.
#[derive(Debug)]
pub struct SampleClock {
    samples: AtomicU64,
    sample_rate: u32,
}

impl SampleClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: AtomicU64::new(0),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn position(&self) -> u64 {
        self.samples.load(Ordering::Acquire)
    }

    pub fn advance(&self, frames: u64) {
        self.samples.fetch_add(frames, Ordering::Release);
    }
}

impl AudioClock for SampleClock {
    fn now(&self) -> f64 {
        self.position() as f64 / self.sample_rate as f64
    }
}
