use super::{OutputSink, SinkError, Voice, VoiceId};
use crate::timing::{AudioClock, ManualClock};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    Voice(VoiceId, Voice),
    SilenceAll { at: f64 },
}

/// Sink that records programmed voices instead of rendering them.
///
/// Its clock only moves when the owner advances it, which makes lookahead
/// behavior reproducible.
pub struct RecordingSink {
    clock: Arc<ManualClock>,
    commands: Mutex<Vec<RecordedCommand>>,
    suspended: AtomicBool,
}

impl RecordingSink {
    pub fn new(start: f64) -> Self {
        Self {
            clock: Arc::new(ManualClock::new(start)),
            commands: Mutex::new(Vec::new()),
            suspended: AtomicBool::new(false),
        }
    }

    pub fn manual_clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn advance(&self, seconds: f64) {
        self.clock.advance(seconds);
    }

    /// Reject every command until `resume`, like a device locked before a user gesture.
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.suspended.store(false, Ordering::Relaxed);
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().clone()
    }

    pub fn voices(&self) -> Vec<Voice> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::Voice(_, voice) => Some(voice.clone()),
                RecordedCommand::SilenceAll { .. } => None,
            })
            .collect()
    }

    pub fn voice_count(&self) -> usize {
        self.voices().len()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }
}

impl OutputSink for RecordingSink {
    fn clock(&self) -> Arc<dyn AudioClock> {
        self.clock.clone()
    }

    fn schedule_voice(&self, voice: Voice) -> Result<VoiceId, SinkError> {
        if self.suspended.load(Ordering::Relaxed) {
            return Err(SinkError::Suspended);
        }
        let mut commands = self.commands.lock();
        let id = VoiceId(commands.len() as u64 + 1);
        commands.push(RecordedCommand::Voice(id, voice));
        Ok(id)
    }

    fn silence_all(&self, at: f64) -> Result<(), SinkError> {
        if self.suspended.load(Ordering::Relaxed) {
            return Err(SinkError::Suspended);
        }
        self.commands.lock().push(RecordedCommand::SilenceAll { at });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{GainAutomation, Waveform};

    fn voice(start: f64) -> Voice {
        Voice {
            frequency: 440.0,
            waveform: Waveform::Sine,
            layer: None,
            start,
            stop: start + 1.0,
            gain: GainAutomation::new().set(0.5, start),
        }
    }

    #[test]
    fn records_voices_in_order() {
        let sink = RecordingSink::new(0.0);
        let a = sink.schedule_voice(voice(1.0)).unwrap();
        let b = sink.schedule_voice(voice(2.0)).unwrap();
        sink.silence_all(2.5).unwrap();

        assert_ne!(a, b);
        assert_eq!(sink.voice_count(), 2);
        assert_eq!(sink.voices()[1].start, 2.0);
        assert_eq!(
            sink.commands().last(),
            Some(&RecordedCommand::SilenceAll { at: 2.5 })
        );
    }

    #[test]
    fn suspended_sink_rejects_commands() {
        let sink = RecordingSink::new(0.0);
        sink.suspend();
        assert_eq!(sink.schedule_voice(voice(0.0)), Err(SinkError::Suspended));
        assert_eq!(sink.silence_all(0.0), Err(SinkError::Suspended));
        assert_eq!(sink.voice_count(), 0);

        sink.resume();
        assert!(sink.schedule_voice(voice(0.0)).is_ok());
    }

    #[test]
    fn clock_is_shared_with_schedulers() {
        let sink = RecordingSink::new(3.0);
        let clock = sink.clock();
        sink.advance(0.5);
        assert_eq!(clock.now(), 3.5);
    }
}
