use std::f32::consts::TAU;

use super::ToneGenerator;

pub struct SineGenerator {
    phase: f32,
    phase_advance: f32,
    amplitude: f32,
    output: f32,
}

impl SineGenerator {
    pub fn new(freq_hz: f32, rate_hz: f32, amplitude: f32) -> Self {
        Self {
            phase: 0.0,
            phase_advance: TAU * freq_hz / rate_hz,
            amplitude,
            output: 0.0,
        }
    }
}

impl ToneGenerator for SineGenerator {
    fn output(&self) -> f32 {
        self.output
    }

    fn advance(&mut self) {
        self.output = self.phase.sin() * self.amplitude;
        self.phase = (self.phase + self.phase_advance) % TAU;
    }
}

/// One tone per channel, scaled to `nbytes` wide samples.
///
/// Channel `n` plays `base_hz * (n + 1)` at a level that drops 6 dB per
/// channel, so each one is easy to tell apart on a level meter.
pub struct ChannelTones {
    tones: Vec<SineGenerator>,
    full_scale: f32,
}

impl ChannelTones {
    pub fn new(channels: usize, base_hz: f32, rate_hz: f32, nbytes: usize) -> Self {
        let tones = (0..channels)
            .map(|n| SineGenerator::new(base_hz * (n + 1) as f32, rate_hz, 0.5f32.powi(n as i32)))
            .collect();
        Self {
            tones,
            full_scale: ((1u64 << (8 * nbytes - 1)) - 1) as f32,
        }
    }

    /// Next frame of samples.
    pub fn next_frame(&mut self) -> Vec<i32> {
        self.tones.iter_mut()
            .map(|tone| {
                tone.advance();
                (tone.output() * self.full_scale).round() as i32
            })
            .collect()
    }
}
