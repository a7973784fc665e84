//! CPAL-based audio output.
//!
//! Voices cross to the audio callback through a ring buffer; the callback owns
//! the active voice list and the sample counter that serves as audio clock.

use super::{OutputSink, SinkError, Voice, VoiceId};
use crate::timing::{AudioClock, SampleClock};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Producer, Split},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

const COMMAND_CAPACITY: usize = 1024;
const MAX_VOICES: usize = 64;
/// Seconds to fade out after `silence_all`
const SILENCE_FADE: f64 = 0.02;

enum SinkCommand {
    Play(VoiceId, Voice),
    SilenceAll { at: f64 },
}

struct ActiveVoice {
    voice: Voice,
    phase: f64,
    layer_phase: f64,
    cutoff: Option<f64>,
}

impl ActiveVoice {
    fn new(voice: Voice) -> Self {
        Self {
            voice,
            phase: 0.0,
            layer_phase: 0.0,
            cutoff: None,
        }
    }

    fn render(&mut self, t: f64, dt: f64) -> f64 {
        if !self.voice.is_sounding_at(t) {
            return 0.0;
        }
        let mut gain = self.voice.gain.value_at(t);
        if let Some(at) = self.cutoff {
            if t >= at {
                gain *= (1.0 - (t - at) / SILENCE_FADE).max(0.0);
            }
        }
        let mut sample = self.voice.waveform.sample(self.phase);
        self.phase = (self.phase + self.voice.frequency * dt).fract();
        if let Some(layer) = &self.voice.layer {
            sample += layer.waveform.sample(self.layer_phase) * layer.gain;
            let frequency = self.voice.frequency * layer.frequency_ratio();
            self.layer_phase = (self.layer_phase + frequency * dt).fract();
        }
        sample * gain
    }

    fn finished(&self, t: f64) -> bool {
        t >= self.voice.stop || self.cutoff.is_some_and(|at| t >= at + SILENCE_FADE)
    }
}

struct RenderState {
    consumer: HeapCons<SinkCommand>,
    voices: Vec<ActiveVoice>,
    clock: Arc<SampleClock>,
    channels: usize,
}

fn render(data: &mut [f32], state: &mut RenderState) {
    while let Some(command) = state.consumer.try_pop() {
        match command {
            SinkCommand::Play(id, voice) => {
                if state.voices.len() < MAX_VOICES {
                    state.voices.push(ActiveVoice::new(voice));
                } else {
                    warn!(?id, "voice limit reached, dropping voice");
                }
            }
            SinkCommand::SilenceAll { at } => {
                for voice in &mut state.voices {
                    voice.cutoff = Some(voice.cutoff.map_or(at, |c| c.min(at)));
                }
            }
        }
    }

    let channels = state.channels.max(1);
    let frames = data.len() / channels;
    let start = state.clock.position();
    let dt = 1.0 / state.clock.sample_rate() as f64;

    for (i, frame) in data.chunks_mut(channels).enumerate() {
        let t = (start + i as u64) as f64 * dt;
        let mixed: f64 = state.voices.iter_mut().map(|v| v.render(t, dt)).sum();
        frame.fill((mixed as f32).clamp(-1.0, 1.0));
    }

    let end = (start + frames as u64) as f64 * dt;
    state.voices.retain(|v| !v.finished(end));
    state.clock.advance(frames as u64);
}

/// Default-device output sink.
pub struct CpalSink {
    clock: Arc<SampleClock>,
    producer: Mutex<HeapProd<SinkCommand>>,
    next_id: AtomicU64,
}

/// Keeps the device stream alive; rendering stops when this is dropped.
pub struct OutputStream {
    _stream: cpal::Stream,
}

impl CpalSink {
    pub fn open() -> Result<(Self, OutputStream), SinkError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SinkError::Device("no output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| SinkError::Device(e.to_string()))?;
        let stream_config: cpal::StreamConfig = config.into();

        let channels = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate;

        let (producer, consumer) = HeapRb::<SinkCommand>::new(COMMAND_CAPACITY).split();
        let clock = Arc::new(SampleClock::new(sample_rate));

        let mut state = RenderState {
            consumer,
            voices: Vec::with_capacity(MAX_VOICES),
            clock: clock.clone(),
            channels,
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render(data, &mut state),
                |err| error!(error = %err, "audio stream error"),
                None,
            )
            .map_err(|e| SinkError::Device(e.to_string()))?;
        stream.play().map_err(|e| SinkError::Device(e.to_string()))?;

        info!(channels, sample_rate, "audio output opened");

        let sink = Self {
            clock,
            producer: Mutex::new(producer),
            next_id: AtomicU64::new(1),
        };
        Ok((sink, OutputStream { _stream: stream }))
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    fn push(&self, command: SinkCommand) -> Result<(), SinkError> {
        self.producer
            .lock()
            .try_push(command)
            .map_err(|_| SinkError::QueueFull)
    }
}

impl OutputSink for CpalSink {
    fn clock(&self) -> Arc<dyn AudioClock> {
        self.clock.clone()
    }

    fn schedule_voice(&self, voice: Voice) -> Result<VoiceId, SinkError> {
        let id = VoiceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.push(SinkCommand::Play(id, voice))?;
        Ok(id)
    }

    fn silence_all(&self, at: f64) -> Result<(), SinkError> {
        self.push(SinkCommand::SilenceAll { at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{GainAutomation, Layer, Waveform};

    const RATE: u32 = 1_000;

    fn render_state() -> (HeapProd<SinkCommand>, RenderState) {
        let (producer, consumer) = HeapRb::<SinkCommand>::new(16).split();
        let state = RenderState {
            consumer,
            voices: Vec::new(),
            clock: Arc::new(SampleClock::new(RATE)),
            channels: 2,
        };
        (producer, state)
    }

    fn square(start: f64, stop: f64) -> Voice {
        Voice {
            frequency: 10.0,
            waveform: Waveform::Square,
            layer: None,
            start,
            stop,
            gain: GainAutomation::new().set(0.5, start),
        }
    }

    #[test]
    fn voice_is_silent_until_its_start_time() {
        let (mut producer, mut state) = render_state();
        assert!(producer.try_push(SinkCommand::Play(VoiceId(1), square(0.0105, 1.0))).is_ok());

        // 20 frames of stereo = 0.02s
        let mut buffer = vec![0.0f32; 40];
        render(&mut buffer, &mut state);

        assert!(buffer[..22].iter().all(|s| *s == 0.0));
        assert!(buffer[22..].iter().all(|s| *s == 0.5));
        assert_eq!(state.clock.position(), 20);
    }

    #[test]
    fn finished_voices_are_dropped() {
        let (mut producer, mut state) = render_state();
        assert!(producer.try_push(SinkCommand::Play(VoiceId(1), square(0.0, 0.005))).is_ok());

        let mut buffer = vec![0.0f32; 20];
        render(&mut buffer, &mut state);
        assert!(state.voices.is_empty());
        assert!(buffer[12..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn silence_all_fades_sounding_voices() {
        let (mut producer, mut state) = render_state();
        assert!(producer.try_push(SinkCommand::Play(VoiceId(1), square(0.0, 10.0))).is_ok());
        assert!(producer.try_push(SinkCommand::SilenceAll { at: 0.0 }).is_ok());

        // 0.05s, longer than the fade
        let mut buffer = vec![0.0f32; 100];
        render(&mut buffer, &mut state);
        assert!(buffer[0].abs() > 0.0);
        assert_eq!(*buffer.last().unwrap(), 0.0);
        assert!(state.voices.is_empty());
    }

    #[test]
    fn layer_mixes_under_the_main_oscillator() {
        let (mut producer, mut state) = render_state();
        let mut voice = square(0.0, 1.0);
        voice.layer = Some(Layer {
            waveform: Waveform::Square,
            detune_cents: 0.0,
            gain: 0.5,
        });
        assert!(producer.try_push(SinkCommand::Play(VoiceId(1), voice)).is_ok());

        // Both squares are high for the first half cycle (0.05s at 10 Hz)
        let mut buffer = vec![0.0f32; 20];
        render(&mut buffer, &mut state);
        assert!(buffer.iter().all(|s| (*s - 0.75).abs() < 1e-6));
    }
}
