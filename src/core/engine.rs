use crate::error::EngineError;
use alloc::boxed::Box;

/// The capability set of a time/pitch-stretch engine.
///
/// Engines are single-stream and stateful: phase and overlap state persist
/// between calls to [`process`](StretchEngine::process), so blocks from one
/// continuous stream must be delivered in order. Call
/// [`reset`](StretchEngine::reset) before feeding an unrelated stream.
pub trait StretchEngine {
    /// Configures the engine, discarding any accumulated state.
    ///
    /// # Arguments
    /// * `channels` - Number of channels.
    /// * `window_samples` - Analysis window length in samples.
    /// * `interval_samples` - Analysis interval (hop) in samples.
    /// * `exact_length` - Whether output length must always equal input length.
    fn configure(
        &mut self,
        channels: usize,
        window_samples: usize,
        interval_samples: usize,
        exact_length: bool,
    ) -> Result<(), EngineError>;

    /// Sets the pitch transpose in semitones.
    ///
    /// `smoothing_bound` limits how far the applied transpose may move per
    /// sample, in semitones.
    fn set_transpose_semitones(&mut self, semitones: f32, smoothing_bound: f32);

    /// Sets the formant shift in semitones.
    ///
    /// With `absolute` set, the spectral envelope is shifted by exactly this
    /// amount regardless of pitch. Otherwise the envelope follows the pitch
    /// transpose and this amount is applied on top.
    fn set_formant_semitones(&mut self, semitones: f32, absolute: bool);

    /// Sets the assumed voice fundamental, as a fraction of the sample rate.
    fn set_formant_base(&mut self, normalized_frequency: f32);

    /// Processes one block. Input and output lengths are given by the slices.
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), EngineError>;

    /// Clears all phase and overlap state.
    fn reset(&mut self) -> Result<(), EngineError>;

    /// Returns the latency of the engine in samples.
    fn latency_samples(&self) -> usize {
        0
    }

    /// Returns the name of the engine.
    fn name(&self) -> &str {
        "StretchEngine"
    }
}

impl<T: StretchEngine + ?Sized> StretchEngine for Box<T> {
    fn configure(
        &mut self,
        channels: usize,
        window_samples: usize,
        interval_samples: usize,
        exact_length: bool,
    ) -> Result<(), EngineError> {
        (**self).configure(channels, window_samples, interval_samples, exact_length)
    }

    fn set_transpose_semitones(&mut self, semitones: f32, smoothing_bound: f32) {
        (**self).set_transpose_semitones(semitones, smoothing_bound);
    }

    fn set_formant_semitones(&mut self, semitones: f32, absolute: bool) {
        (**self).set_formant_semitones(semitones, absolute);
    }

    fn set_formant_base(&mut self, normalized_frequency: f32) {
        (**self).set_formant_base(normalized_frequency);
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), EngineError> {
        (**self).process(input, output)
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        (**self).reset()
    }

    fn latency_samples(&self) -> usize {
        (**self).latency_samples()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
