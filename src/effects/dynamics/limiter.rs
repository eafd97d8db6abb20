use crate::config::LimiterConfig;

/// An instantaneous-attack, slow-release peak limiter.
///
/// The gain recovers toward unity through a one-pole filter and drops
/// immediately to whatever keeps the current sample at the ceiling. There
/// is no look-ahead. Gain always stays in `(0, 1]` for finite input.
pub struct PeakLimiter {
    ceiling: f32,
    release_seconds: f32,
    slew: f32,
    gain: f32,
}

impl PeakLimiter {
    /// Creates a new PeakLimiter.
    ///
    /// # Arguments
    /// * `config` - Ceiling and release time.
    pub fn new(config: LimiterConfig) -> Self {
        PeakLimiter {
            ceiling: config.ceiling,
            release_seconds: config.release_seconds,
            slew: 1.0,
            gain: 1.0,
        }
    }

    /// Recomputes the release slew for a new sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.slew = 1.0 / (self.release_seconds * sample_rate + 1.0);
    }

    /// Returns the current gain.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Returns the output ceiling.
    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Returns the per-sample release slew.
    pub fn slew(&self) -> f32 {
        self.slew
    }

    /// Restores unity gain.
    pub fn reset(&mut self) {
        self.gain = 1.0;
    }

    /// Limits one sample.
    #[inline]
    pub fn tick(&mut self, x: f32) -> f32 {
        self.gain += (1.0 - self.gain) * self.slew;
        let mut y = x * self.gain;
        if y.abs() > self.ceiling {
            self.gain = self.ceiling / x.abs();
            y = x * self.gain;
        }
        y
    }

    /// Limits a block of samples and narrows them to 16-bit PCM.
    ///
    /// Narrowing truncates toward zero.
    pub fn process_to_pcm(&mut self, input: &[f32], output: &mut [i16]) {
        for (out, &x) in output.iter_mut().zip(input.iter()) {
            *out = self.tick(x) as i16;
        }
    }
}
