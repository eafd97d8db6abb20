use crate::core::engine::StretchEngine;
use crate::core::fft::{self, MAX_FFT_SIZE};
use crate::effects::spectral::formant::SpectralEnvelope;
use crate::error::EngineError;
use alloc::vec;
use alloc::vec::Vec;
use core::f32::consts::PI;
use num_complex::Complex32;
use wide::f32x4;

const TWO_PI: f32 = 2.0 * PI;
const MIN_WINDOW: usize = 16;

/// Transpose and formant shifts are clamped to ten octaves either way.
/// Beyond that every bin maps outside the spectrum, and `exp2f` of the
/// ratio overflows well before `f32::MAX` semitones.
pub const MAX_SHIFT_SEMITONES: f32 = 120.0;

#[inline]
fn wrap_phase(phase: f32) -> f32 {
    phase - TWO_PI * libm::roundf(phase / TWO_PI)
}

/// A single-channel phase-vocoder pitch and formant shifter.
///
/// Input is collected into a sliding window; every `interval` samples the
/// window is analysed with a Hann window, the spectrum is whitened by its
/// envelope, remapped by the pitch ratio, re-coloured with a warped
/// envelope and overlap-added back. Output is delayed by
/// `window - interval` samples.
pub struct SpectralStretch {
    configured: bool,
    exact_length: bool,

    window_len: usize,
    hop: usize,
    fft_size: usize,
    bins: usize,
    latency: usize,
    rover: usize,

    window: Vec<f32>,
    output_gain: f32,
    expected_advance: f32,

    in_fifo: Vec<f32>,
    out_fifo: Vec<f32>,
    accumulator: Vec<f32>,
    frame: Vec<f32>,
    spectrum: Vec<Complex32>,

    last_phase: Vec<f32>,
    sum_phase: Vec<f32>,
    magnitudes: Vec<f32>,
    true_bins: Vec<f32>,
    synth_magnitudes: Vec<f32>,
    synth_bins: Vec<f32>,
    envelope: SpectralEnvelope,

    target_semitones: f32,
    current_semitones: f32,
    smoothing_bound: f32,
    formant_semitones: f32,
    formant_absolute: bool,
    formant_base: f32,
    primed: bool,
}

impl SpectralStretch {
    /// Creates an unconfigured SpectralStretch.
    pub fn new() -> Self {
        SpectralStretch {
            configured: false,
            exact_length: true,
            window_len: 0,
            hop: 0,
            fft_size: 0,
            bins: 0,
            latency: 0,
            rover: 0,
            window: Vec::new(),
            output_gain: 1.0,
            expected_advance: 0.0,
            in_fifo: Vec::new(),
            out_fifo: Vec::new(),
            accumulator: Vec::new(),
            frame: Vec::new(),
            spectrum: Vec::new(),
            last_phase: Vec::new(),
            sum_phase: Vec::new(),
            magnitudes: Vec::new(),
            true_bins: Vec::new(),
            synth_magnitudes: Vec::new(),
            synth_bins: Vec::new(),
            envelope: SpectralEnvelope::with_bins(0),
            target_semitones: 0.0,
            current_semitones: 0.0,
            smoothing_bound: 0.0,
            formant_semitones: 0.0,
            formant_absolute: true,
            formant_base: 0.0,
            primed: false,
        }
    }

    /// Analysis window length in samples.
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Analysis interval in samples.
    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// The transpose currently applied, which may lag the target while gliding.
    pub fn current_semitones(&self) -> f32 {
        self.current_semitones
    }

    fn advance_transpose(&mut self) {
        if !self.primed {
            self.current_semitones = self.target_semitones;
            self.primed = true;
            return;
        }
        let delta = self.target_semitones - self.current_semitones;
        if self.smoothing_bound > 0.0 && self.smoothing_bound.is_finite() {
            let step = self.smoothing_bound * self.hop as f32;
            self.current_semitones += delta.clamp(-step, step);
        } else {
            self.current_semitones = self.target_semitones;
        }
    }

    fn envelope_half_width(&self) -> usize {
        let width = libm::roundf(self.formant_base * self.fft_size as f32);
        if width.is_finite() && width >= 1.0 {
            (width as usize).min(self.bins / 4)
        } else {
            1
        }
    }

    fn analyse(&mut self) -> Result<(), EngineError> {
        let (frames, rest) = self.frame.as_chunks_mut::<4>();
        let (inputs, input_rest) = self.in_fifo.as_chunks::<4>();
        let (windows, window_rest) = self.window.as_chunks::<4>();
        for ((out, inp), win) in frames.iter_mut().zip(inputs).zip(windows) {
            *out = (f32x4::from(*inp) * f32x4::from(*win)).to_array();
        }
        for ((out, inp), win) in rest.iter_mut().zip(input_rest).zip(window_rest) {
            *out = inp * win;
        }

        for (i, bin) in self.spectrum.iter_mut().enumerate() {
            let re = if i < self.window_len { self.frame[i] } else { 0.0 };
            *bin = Complex32::new(re, 0.0);
        }
        fft::forward(&mut self.spectrum)?;

        for k in 0..self.bins {
            let c = self.spectrum[k];
            let phase = libm::atan2f(c.im, c.re);
            let advance = wrap_phase(phase - self.last_phase[k] - k as f32 * self.expected_advance);
            self.last_phase[k] = phase;
            self.magnitudes[k] = libm::sqrtf(c.re * c.re + c.im * c.im);
            self.true_bins[k] = k as f32 + advance / self.expected_advance;
        }
        Ok(())
    }

    fn shift(&mut self) {
        let ratio = libm::exp2f(self.current_semitones / 12.0);
        let formant_ratio = libm::exp2f(self.formant_semitones / 12.0);
        let envelope_ratio = if self.formant_absolute {
            formant_ratio
        } else {
            formant_ratio * ratio
        };

        let half_width = self.envelope_half_width();
        self.envelope.estimate(&self.magnitudes, half_width);

        self.synth_magnitudes.fill(0.0);
        self.synth_bins.fill(0.0);
        for k in 0..self.bins {
            let target = libm::roundf(k as f32 * ratio) as usize;
            if target < self.bins {
                self.synth_magnitudes[target] += self.magnitudes[k] / self.envelope.bin(k);
                self.synth_bins[target] = self.true_bins[k] * ratio;
            }
        }

        for j in 0..self.bins {
            let magnitude = self.synth_magnitudes[j] * self.envelope.at(j as f32 / envelope_ratio);
            self.sum_phase[j] = wrap_phase(self.sum_phase[j] + self.expected_advance * self.synth_bins[j]);
            self.spectrum[j] = Complex32::from_polar(magnitude, self.sum_phase[j]);
        }
        for j in self.bins..self.fft_size {
            self.spectrum[j] = self.spectrum[self.fft_size - j].conj();
        }
    }

    fn synthesise(&mut self) -> Result<(), EngineError> {
        fft::inverse(&mut self.spectrum)?;
        if self.spectrum[..self.window_len]
            .iter()
            .any(|c| !c.re.is_finite())
        {
            // A non-finite frame would stay in the running phase sums and
            // the overlap buffer; drop it so the next frame starts clean.
            self.discard_synthesis();
            return Err(EngineError::NonFiniteOutput);
        }

        for i in 0..self.window_len {
            self.accumulator[i] += self.spectrum[i].re * self.window[i] * self.output_gain;
        }

        self.out_fifo[..self.hop].copy_from_slice(&self.accumulator[..self.hop]);
        self.accumulator
            .copy_within(self.hop..self.hop + self.window_len, 0);
        Ok(())
    }

    fn process_frame(&mut self) -> Result<(), EngineError> {
        self.advance_transpose();
        self.analyse()?;
        self.in_fifo.copy_within(self.hop..self.window_len, 0);
        self.shift();
        self.synthesise()
    }

    fn discard_synthesis(&mut self) {
        self.sum_phase.fill(0.0);
        self.last_phase.fill(0.0);
        self.accumulator.fill(0.0);
        self.out_fifo.fill(0.0);
    }

    fn clear_state(&mut self) {
        self.in_fifo.fill(0.0);
        self.out_fifo.fill(0.0);
        self.accumulator.fill(0.0);
        self.frame.fill(0.0);
        self.spectrum.fill(Complex32::new(0.0, 0.0));
        self.last_phase.fill(0.0);
        self.sum_phase.fill(0.0);
        self.magnitudes.fill(0.0);
        self.true_bins.fill(0.0);
        self.synth_magnitudes.fill(0.0);
        self.synth_bins.fill(0.0);
        self.envelope.clear();
        self.rover = self.latency;
        self.current_semitones = self.target_semitones;
        self.primed = false;
    }
}

impl Default for SpectralStretch {
    fn default() -> Self {
        Self::new()
    }
}

impl StretchEngine for SpectralStretch {
    fn configure(
        &mut self,
        channels: usize,
        window_samples: usize,
        interval_samples: usize,
        exact_length: bool,
    ) -> Result<(), EngineError> {
        self.configured = false;

        if channels != 1 {
            return Err(EngineError::UnsupportedChannels(channels));
        }
        if window_samples < MIN_WINDOW {
            return Err(EngineError::InvalidWindow(window_samples));
        }
        if interval_samples == 0 || interval_samples > window_samples {
            return Err(EngineError::InvalidInterval {
                interval: interval_samples,
                window: window_samples,
            });
        }

        let (window_len, hop) = if window_samples > MAX_FFT_SIZE {
            let scaled = interval_samples as f64 * MAX_FFT_SIZE as f64 / window_samples as f64;
            let hop = (scaled as usize).clamp(1, MAX_FFT_SIZE);
            log::warn!(
                "window of {} samples exceeds {}, clamping (interval {} -> {})",
                window_samples,
                MAX_FFT_SIZE,
                interval_samples,
                hop
            );
            (MAX_FFT_SIZE, hop)
        } else {
            (window_samples, interval_samples)
        };

        let fft_size = fft::fft_size_for(window_len);
        let bins = fft_size / 2 + 1;

        let window: Vec<f32> = (0..window_len)
            .map(|i| 0.5 * (1.0 - libm::cosf(TWO_PI * i as f32 / window_len as f32)))
            .collect();
        let energy: f32 = window.iter().map(|w| w * w).sum();

        self.exact_length = exact_length;
        self.window_len = window_len;
        self.hop = hop;
        self.fft_size = fft_size;
        self.bins = bins;
        self.latency = window_len - hop;
        self.output_gain = hop as f32 / energy;
        self.expected_advance = TWO_PI * hop as f32 / fft_size as f32;
        self.window = window;

        self.in_fifo = vec![0.0; window_len];
        self.out_fifo = vec![0.0; window_len];
        self.accumulator = vec![0.0; window_len + hop];
        self.frame = vec![0.0; window_len];
        self.spectrum = vec![Complex32::new(0.0, 0.0); fft_size];
        self.last_phase = vec![0.0; bins];
        self.sum_phase = vec![0.0; bins];
        self.magnitudes = vec![0.0; bins];
        self.true_bins = vec![0.0; bins];
        self.synth_magnitudes = vec![0.0; bins];
        self.synth_bins = vec![0.0; bins];
        self.envelope = SpectralEnvelope::with_bins(bins);

        self.clear_state();
        self.configured = true;
        Ok(())
    }

    /// `smoothing_bound` is in semitones per sample and is applied once per
    /// analysis interval, so each frame moves at most `bound * hop`.
    /// Shifts are clamped to [`MAX_SHIFT_SEMITONES`].
    fn set_transpose_semitones(&mut self, semitones: f32, smoothing_bound: f32) {
        let semitones = semitones.clamp(-MAX_SHIFT_SEMITONES, MAX_SHIFT_SEMITONES);
        self.target_semitones = semitones;
        self.smoothing_bound = smoothing_bound;
        if !self.primed {
            self.current_semitones = semitones;
        }
    }

    fn set_formant_semitones(&mut self, semitones: f32, absolute: bool) {
        self.formant_semitones = semitones.clamp(-MAX_SHIFT_SEMITONES, MAX_SHIFT_SEMITONES);
        self.formant_absolute = absolute;
    }

    fn set_formant_base(&mut self, normalized_frequency: f32) {
        self.formant_base = normalized_frequency;
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), EngineError> {
        if !self.configured {
            return Err(EngineError::NotConfigured);
        }
        if self.exact_length && input.len() != output.len() {
            return Err(EngineError::LengthMismatch {
                input: input.len(),
                output: output.len(),
            });
        }

        let frames = input.len().min(output.len());
        for i in 0..frames {
            self.in_fifo[self.rover] = input[i];
            output[i] = self.out_fifo[self.rover - self.latency];
            self.rover += 1;

            if self.rover >= self.window_len {
                self.rover = self.latency;
                self.process_frame()?;
            }
        }
        output[frames..].fill(0.0);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        if !self.configured {
            return Err(EngineError::NotConfigured);
        }
        self.clear_state();
        Ok(())
    }

    fn latency_samples(&self) -> usize {
        if self.configured {
            self.latency
        } else {
            0
        }
    }

    fn name(&self) -> &str {
        "SpectralStretch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * libm::sinf(TWO_PI * freq * i as f32 / sample_rate))
            .collect()
    }

    fn dominant_bin(signal: &[f32], fft_size: usize) -> usize {
        let mut spectrum: Vec<Complex32> = signal[..fft_size]
            .iter()
            .map(|&x| Complex32::new(x, 0.0))
            .collect();
        fft::forward(&mut spectrum).unwrap();
        (1..fft_size / 2)
            .max_by(|&a, &b| spectrum[a].norm().total_cmp(&spectrum[b].norm()))
            .unwrap()
    }

    fn configured(sample_rate: f32) -> SpectralStretch {
        let mut engine = SpectralStretch::new();
        engine
            .configure(
                1,
                (sample_rate * 0.06) as usize,
                (sample_rate * 0.015) as usize,
                true,
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        let mut engine = SpectralStretch::new();
        assert_eq!(
            engine.configure(2, 2646, 661, true),
            Err(EngineError::UnsupportedChannels(2))
        );
        assert_eq!(
            engine.configure(1, 0, 0, true),
            Err(EngineError::InvalidWindow(0))
        );
        assert_eq!(
            engine.configure(1, 512, 1024, true),
            Err(EngineError::InvalidInterval {
                interval: 1024,
                window: 512
            })
        );
    }

    #[test]
    fn test_process_before_configure() {
        let mut engine = SpectralStretch::new();
        let mut out = [0.0; 4];
        assert_eq!(
            engine.process(&[0.0; 4], &mut out),
            Err(EngineError::NotConfigured)
        );
    }

    #[test]
    fn test_geometry() {
        let engine = configured(44100.0);
        assert_eq!(engine.window_len(), 2646);
        assert_eq!(engine.hop(), 661);
        assert_eq!(engine.fft_size(), 4096);
        assert_eq!(engine.latency_samples(), 2646 - 661);
    }

    #[test]
    fn test_large_window_clamped() {
        let engine = configured(96000.0);
        assert_eq!(engine.window_len(), MAX_FFT_SIZE);
        assert_eq!(engine.hop(), 1440 * 4096 / 5760);
    }

    #[test]
    fn test_exact_length_enforced() {
        let mut engine = configured(8000.0);
        let mut out = [0.0; 3];
        assert_eq!(
            engine.process(&[0.0; 4], &mut out),
            Err(EngineError::LengthMismatch {
                input: 4,
                output: 3
            })
        );
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut engine = configured(8000.0);
        engine.set_transpose_semitones(10.0, 6000.0 / 8000.0);
        engine.set_formant_semitones(2.0, true);
        engine.set_formant_base(100.0 / 8000.0);

        let input = [0.0; 2000];
        let mut output = [1.0; 2000];
        engine.process(&input, &mut output).unwrap();
        assert!(output.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_identity_preserves_pitch() {
        let sample_rate = 8000.0;
        let mut engine = configured(sample_rate);
        engine.set_transpose_semitones(0.0, 0.0);
        engine.set_formant_semitones(0.0, true);
        engine.set_formant_base(100.0 / sample_rate);

        let input = sine(500.0, sample_rate, 8000, 10000.0);
        let mut output = vec![0.0; 8000];
        engine.process(&input, &mut output).unwrap();

        let tail = &output[4000..];
        let peak = tail.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        assert!(peak > 5000.0 && peak < 15000.0);
        assert_eq!(dominant_bin(tail, 2048), dominant_bin(&input[4000..], 2048));
    }

    #[test]
    fn test_octave_up_doubles_frequency() {
        let sample_rate = 8000.0;
        let mut engine = configured(sample_rate);
        engine.set_transpose_semitones(12.0, 0.0);
        engine.set_formant_semitones(0.0, false);
        engine.set_formant_base(100.0 / sample_rate);

        let input = sine(500.0, sample_rate, 8000, 10000.0);
        let mut output = vec![0.0; 8000];
        engine.process(&input, &mut output).unwrap();

        let source = dominant_bin(&input[4000..], 2048) as i64;
        let shifted = dominant_bin(&output[4000..], 2048) as i64;
        assert!((shifted - 2 * source).abs() <= 2);
    }

    #[test]
    fn test_glide_is_bounded() {
        let mut engine = configured(8000.0);
        engine.set_transpose_semitones(0.0, 0.001);
        let mut out = vec![0.0; 480];
        engine.process(&[0.0; 480], &mut out).unwrap();

        engine.set_transpose_semitones(12.0, 0.001);
        engine.process(&[0.0; 480], &mut out).unwrap();

        let step = 0.001 * engine.hop() as f32;
        assert!(engine.current_semitones() > 0.0);
        assert!(engine.current_semitones() <= 4.0 * step + 1e-4);
    }

    #[test]
    fn test_extreme_shift_is_clamped() {
        let mut engine = configured(8000.0);
        engine.set_transpose_semitones(2000.0, 0.0);
        engine.set_formant_semitones(-5000.0, false);
        engine.set_formant_base(100.0 / 8000.0);

        let input = sine(300.0, 8000.0, 2400, 12000.0);
        let mut output = vec![0.0; 2400];
        engine.process(&input, &mut output).unwrap();
        assert_eq!(engine.current_semitones(), MAX_SHIFT_SEMITONES);
        assert!(output.iter().all(|x| x.is_finite()));

        engine.set_transpose_semitones(-2000.0, 0.0);
        engine.process(&input, &mut output).unwrap();
        assert_eq!(engine.current_semitones(), -MAX_SHIFT_SEMITONES);
        assert!(output.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_recovers_after_non_finite_frame() {
        let mut engine = configured(8000.0);
        let mut block = sine(400.0, 8000.0, 480, 10000.0);
        block[10] = f32::INFINITY;
        let mut output = vec![0.0; 480];
        assert_eq!(
            engine.process(&block, &mut output),
            Err(EngineError::NonFiniteOutput)
        );

        let input = sine(400.0, 8000.0, 480, 10000.0);
        let mut last = Err(EngineError::NotConfigured);
        for _ in 0..10 {
            last = engine.process(&input, &mut output);
        }
        assert_eq!(last, Ok(()));
        assert!(output.iter().all(|x| x.is_finite()));
        let peak = output.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        assert!(peak > 1000.0);
    }

    #[test]
    fn test_huge_window_clamp_does_not_overflow() {
        let mut engine = SpectralStretch::new();
        let window = (1e20f32 * 0.06) as usize;
        let interval = (1e20f32 * 0.015) as usize;
        engine.configure(1, window, interval, true).unwrap();
        assert_eq!(engine.window_len(), MAX_FFT_SIZE);
        assert!(engine.hop() >= 1 && engine.hop() <= engine.window_len());
        assert_eq!(engine.latency_samples(), engine.window_len() - engine.hop());
    }

    #[test]
    fn test_reset_matches_fresh_engine() {
        let input = sine(300.0, 8000.0, 1500, 8000.0);

        let mut fresh = configured(8000.0);
        fresh.set_transpose_semitones(5.0, 0.75);
        let mut expected = vec![0.0; 1500];
        fresh.process(&input, &mut expected).unwrap();

        let mut reused = configured(8000.0);
        reused.set_transpose_semitones(5.0, 0.75);
        let mut scratch = vec![0.0; 1500];
        reused.process(&sine(440.0, 8000.0, 1500, 12000.0), &mut scratch).unwrap();
        reused.reset().unwrap();
        let mut actual = vec![0.0; 1500];
        reused.process(&input, &mut actual).unwrap();

        assert_eq!(expected, actual);
    }
}
