use serde::{Deserialize, Serialize};

/// One gain automation command, with Web Audio `AudioParam` semantics:
/// ramps start from the previous point's time and value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainPoint {
    Set { value: f64, time: f64 },
    LinearRamp { value: f64, end: f64 },
    ExponentialRamp { value: f64, end: f64 },
}

impl GainPoint {
    pub fn time(&self) -> f64 {
        match *self {
            GainPoint::Set { time, .. } => time,
            GainPoint::LinearRamp { end, .. } | GainPoint::ExponentialRamp { end, .. } => end,
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            GainPoint::Set { value, .. }
            | GainPoint::LinearRamp { value, .. }
            | GainPoint::ExponentialRamp { value, .. } => value,
        }
    }
}

/// Gain curve for one voice, in audio-clock seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GainAutomation {
    points: Vec<GainPoint>,
}

impl GainAutomation {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn set(mut self, value: f64, time: f64) -> Self {
        self.points.push(GainPoint::Set { value, time });
        self
    }

    pub fn linear_to(mut self, value: f64, end: f64) -> Self {
        self.points.push(GainPoint::LinearRamp { value, end });
        self
    }

    pub fn exponential_to(mut self, value: f64, end: f64) -> Self {
        self.points.push(GainPoint::ExponentialRamp { value, end });
        self
    }

    pub fn points(&self) -> &[GainPoint] {
        &self.points
    }

    /// Time of the last automation point.
    pub fn end_time(&self) -> Option<f64> {
        self.points.last().map(GainPoint::time)
    }

    pub fn peak(&self) -> f64 {
        self.points.iter().map(GainPoint::value).fold(0.0, f64::max)
    }

    /// Gain at audio-clock time `t`. Zero before the first point.
    pub fn value_at(&self, t: f64) -> f64 {
        let mut value = 0.0;
        let mut from: Option<f64> = None;

        for point in &self.points {
            match *point {
                GainPoint::Set { value: v, time } => {
                    if t < time {
                        return value;
                    }
                    value = v;
                    from = Some(time);
                }
                GainPoint::LinearRamp { value: v, end } => {
                    if t < end {
                        let Some(t0) = from else { return value };
                        let span = end - t0;
                        if span <= 0.0 {
                            return v;
                        }
                        let frac = ((t - t0) / span).clamp(0.0, 1.0);
                        return value + (v - value) * frac;
                    }
                    value = v;
                    from = Some(end);
                }
                GainPoint::ExponentialRamp { value: v, end } => {
                    if t < end {
                        let Some(t0) = from else { return value };
                        let span = end - t0;
                        if span <= 0.0 {
                            return v;
                        }
                        // Undefined for zero or sign changes; hold like AudioParam does
                        if value <= 0.0 || v <= 0.0 {
                            return value;
                        }
                        let frac = ((t - t0) / span).clamp(0.0, 1.0);
                        return value * (v / value).powf(frac);
                    }
                    value = v;
                    from = Some(end);
                }
            }
        }
        value
    }
}

/// Attack/decay/sustain/release shape applied to every synthesized tone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneEnvelope {
    /// Seconds
    pub attack: f64,
    /// Fraction of the note duration
    pub decay: f64,
    /// 0.0 -> 1.0 of the peak
    pub sustain: f64,
    /// Fraction of the note duration
    pub release: f64,
    /// Level the exponential release ends on
    pub floor: f64,
    /// Seconds the oscillator runs past the end of the release
    pub stop_padding: f64,
}

impl Default for ToneEnvelope {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.2,
            sustain: 0.6,
            release: 0.25,
            floor: 0.001,
            stop_padding: 0.05,
        }
    }
}

impl ToneEnvelope {
    /// Gain curve for a tone of `duration` seconds starting at `start`.
    ///
    /// The release always lands on `floor` exactly at `start + duration`;
    /// attack and decay shrink to fit in front of it for short notes.
    pub fn shape(&self, start: f64, duration: f64, peak: f64) -> GainAutomation {
        let duration = duration.max(0.0);
        let end = start + duration;
        if peak <= self.floor {
            return GainAutomation::new().set(0.0, start);
        }

        let release = (duration * self.release).clamp(0.0, duration);
        let release_start = end - release;
        let attack_end = start + self.attack.clamp(0.0, (release_start - start).max(0.0));
        let decay_room = (release_start - attack_end).max(0.0);
        let decay_end = attack_end + (duration * self.decay).clamp(0.0, decay_room);
        let sustain = (peak * self.sustain.clamp(0.0, 1.0)).max(self.floor);

        GainAutomation::new()
            .set(0.0, start)
            .linear_to(peak, attack_end)
            .linear_to(sustain, decay_end)
            .set(sustain, release_start)
            .exponential_to(self.floor, end)
    }

    /// Oscillator stop time for a tone of `duration` seconds starting at `start`.
    pub fn stop_time(&self, start: f64, duration: f64) -> f64 {
        start + duration.max(0.0) + self.stop_padding
    }
}

/// Percussive click: near-instant rise, exponential fall to 0.01.
///
/// Never ends louder than it peaked; a zero peak is flat silence.
pub fn click_shape(start: f64, duration: f64, peak: f64) -> GainAutomation {
    if peak <= 0.0 {
        return GainAutomation::new().set(0.0, start);
    }
    GainAutomation::new()
        .set(0.0, start)
        .linear_to(peak, start + 0.001)
        .exponential_to(CLICK_TAIL.min(peak), start + duration.max(0.002))
}

const CLICK_TAIL: f64 = 0.01;
