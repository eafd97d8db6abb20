use crate::config::LimiterConfig;
use crate::core::denormals::DenormalGuard;
use crate::core::engine::StretchEngine;
use crate::effects::dynamics::limiter::PeakLimiter;
use crate::error::EngineError;
use alloc::vec;
use alloc::vec::Vec;

/// Bridges 16-bit PCM blocks to a floating point [`StretchEngine`].
///
/// Samples are widened without rescaling, so the engine sees the full
/// ±32768 range. Engine output passes through a [`PeakLimiter`] before
/// being narrowed back to 16 bits. Both scratch buffers are sized once by
/// [`prepare`](StretchAdapter::prepare); processing never allocates.
pub struct StretchAdapter<E> {
    engine: E,
    buffer_in: Vec<f32>,
    buffer_out: Vec<f32>,
    limiter: PeakLimiter,
}

impl<E: StretchEngine> StretchAdapter<E> {
    pub fn new(engine: E, limiter: LimiterConfig) -> Self {
        StretchAdapter {
            engine,
            buffer_in: Vec::new(),
            buffer_out: Vec::new(),
            limiter: PeakLimiter::new(limiter),
        }
    }

    /// Allocates scratch buffers and resets the limiter for a new stream format.
    pub fn prepare(&mut self, sample_rate: f32, max_block_length: usize, limiter: LimiterConfig) {
        self.buffer_in = vec![0.0; max_block_length];
        self.buffer_out = vec![0.0; max_block_length];
        self.limiter = PeakLimiter::new(limiter);
        self.limiter.set_sample_rate(sample_rate);
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn limiter(&self) -> &PeakLimiter {
        &self.limiter
    }

    /// Capacity of the scratch buffers.
    pub fn capacity(&self) -> usize {
        self.buffer_in.len()
    }

    /// Processes `input` into `output`. Both must have the same length,
    /// no longer than [`capacity`](StretchAdapter::capacity).
    ///
    /// On error `output` is left untouched.
    pub fn process(&mut self, input: &[i16], output: &mut [i16]) -> Result<(), EngineError> {
        let _denormals = DenormalGuard::new();
        let len = input.len();
        self.widen(input);
        self.run(len)?;
        self.limiter.process_to_pcm(&self.buffer_out[..len], output);
        Ok(())
    }

    /// Processes `block` in place. On error `block` is left untouched.
    pub fn process_in_place(&mut self, block: &mut [i16]) -> Result<(), EngineError> {
        let _denormals = DenormalGuard::new();
        let len = block.len();
        self.widen(block);
        self.run(len)?;
        self.limiter.process_to_pcm(&self.buffer_out[..len], block);
        Ok(())
    }

    /// Clears engine state and restores unity limiter gain.
    ///
    /// The limiter is reset even if the engine reports an error.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.limiter.reset();
        self.engine.reset()
    }

    fn widen(&mut self, input: &[i16]) {
        for (dst, &src) in self.buffer_in.iter_mut().zip(input.iter()) {
            *dst = src as f32;
        }
    }

    fn run(&mut self, len: usize) -> Result<(), EngineError> {
        self.engine
            .process(&self.buffer_in[..len], &mut self.buffer_out[..len])?;
        if self.buffer_out[..len].iter().all(|x| x.is_finite()) {
            Ok(())
        } else {
            Err(EngineError::NonFiniteOutput)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::denormals::flush_to_zero_enabled;

    /// Multiplies by a fixed gain, optionally failing every block.
    struct ScaleEngine {
        gain: f32,
        fail: bool,
        saw_flush: bool,
    }

    impl StretchEngine for ScaleEngine {
        fn configure(&mut self, _: usize, _: usize, _: usize, _: bool) -> Result<(), EngineError> {
            Ok(())
        }
        fn set_transpose_semitones(&mut self, _: f32, _: f32) {}
        fn set_formant_semitones(&mut self, _: f32, _: bool) {}
        fn set_formant_base(&mut self, _: f32) {}
        fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), EngineError> {
            self.saw_flush = flush_to_zero_enabled();
            if self.fail {
                return Err(EngineError::NotConfigured);
            }
            for (o, i) in output.iter_mut().zip(input) {
                *o = i * self.gain;
            }
            Ok(())
        }
        fn reset(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn adapter(gain: f32, fail: bool) -> StretchAdapter<ScaleEngine> {
        let mut a = StretchAdapter::new(ScaleEngine {
                gain,
                fail,
                saw_flush: false,
            }, LimiterConfig::default());
        a.prepare(44100.0, 64, LimiterConfig::default());
        a
    }

    #[test]
    fn test_widening_is_unscaled() {
        let mut a = adapter(1.0, false);
        let input = [i16::MIN + 8, -1, 0, 1, 32000];
        let mut output = [0i16; 5];
        a.process(&input, &mut output).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_output_limited() {
        let mut a = adapter(4.0, false);
        let input = [30000i16; 64];
        let mut output = [0i16; 64];
        a.process(&input, &mut output).unwrap();
        assert!(output.iter().all(|&s| s.unsigned_abs() <= 32760));
        assert!(output[0] >= 32759);
        assert!(a.limiter().gain() < 1.0);
    }

    #[test]
    fn test_error_leaves_block_untouched() {
        let mut a = adapter(2.0, true);
        let mut block = [5i16, 6, 7];
        assert!(a.process_in_place(&mut block).is_err());
        assert_eq!(block, [5, 6, 7]);
    }

    #[test]
    fn test_non_finite_output_is_an_error() {
        let mut a = adapter(f32::INFINITY, false);
        let mut out = [9i16; 2];
        assert_eq!(
            a.process(&[1, 2], &mut out),
            Err(EngineError::NonFiniteOutput)
        );
        assert_eq!(out, [9, 9]);
        assert_eq!(a.limiter().gain(), 1.0);
    }

    #[test]
    fn test_in_place_matches_out_of_place() {
        let input: [i16; 8] = [100, -200, 30000, -32768, 12, 0, 7, -7];

        let mut a = adapter(3.0, false);
        let mut out = [0i16; 8];
        a.process(&input, &mut out).unwrap();

        let mut b = adapter(3.0, false);
        let mut block = input;
        b.process_in_place(&mut block).unwrap();

        assert_eq!(out, block);
    }

    #[test]
    fn test_flush_mode_restored_after_engine_error() {
        let before = flush_to_zero_enabled();
        let mut a = adapter(1.0, true);

        let mut out = [0i16; 4];
        assert!(a.process(&[1, 2, 3, 4], &mut out).is_err());
        assert_eq!(flush_to_zero_enabled(), before);

        let mut block = [1i16, 2, 3, 4];
        assert!(a.process_in_place(&mut block).is_err());
        assert_eq!(flush_to_zero_enabled(), before);
        assert_eq!(
            a.engine().saw_flush,
            cfg!(any(target_arch = "x86_64", target_arch = "aarch64"))
        );
    }

    #[test]
    fn test_flush_mode_restored_after_non_finite_output() {
        let before = flush_to_zero_enabled();
        let mut a = adapter(f32::NAN, false);
        let mut out = [0i16; 2];
        assert_eq!(a.process(&[1, 2], &mut out), Err(EngineError::NonFiniteOutput));
        assert_eq!(flush_to_zero_enabled(), before);
    }
}
