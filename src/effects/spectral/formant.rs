use alloc::vec;
use alloc::vec::Vec;

const ENVELOPE_FLOOR: f32 = 1e-6;

/// Smoothed magnitude spectrum used to separate formants from harmonics.
///
/// The envelope is a moving average of the magnitude spectrum. With a
/// width of about one voice fundamental, individual harmonics are averaged
/// out and only the resonance shape remains.
pub struct SpectralEnvelope {
    envelope: Vec<f32>,
    prefix: Vec<f32>,
}

impl SpectralEnvelope {
    /// Creates an envelope for a spectrum of `bins` bins.
    pub fn with_bins(bins: usize) -> Self {
        SpectralEnvelope {
            envelope: vec![ENVELOPE_FLOOR; bins],
            prefix: vec![0.0; bins + 1],
        }
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.envelope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelope.is_empty()
    }

    /// Re-estimates the envelope from `magnitudes`.
    ///
    /// # Arguments
    /// * `magnitudes` - Magnitude spectrum, one value per bin.
    /// * `half_width` - Averaging half-width in bins.
    pub fn estimate(&mut self, magnitudes: &[f32], half_width: usize) {
        let bins = self.envelope.len().min(magnitudes.len());
        if bins == 0 {
            return;
        }

        self.prefix[0] = 0.0;
        for (i, &m) in magnitudes[..bins].iter().enumerate() {
            self.prefix[i + 1] = self.prefix[i] + m;
        }

        for (k, env) in self.envelope[..bins].iter_mut().enumerate() {
            let lo = k.saturating_sub(half_width);
            let hi = (k + half_width + 1).min(bins);
            let mean = (self.prefix[hi] - self.prefix[lo]) / (hi - lo) as f32;
            *env = mean.max(ENVELOPE_FLOOR);
        }
    }

    /// Envelope value at bin `k`.
    #[inline]
    pub fn bin(&self, k: usize) -> f32 {
        self.envelope[k]
    }

    /// Envelope value at a fractional bin position, linearly interpolated.
    ///
    /// Positions past the last bin return the last value.
    #[inline]
    pub fn at(&self, position: f32) -> f32 {
        let last = self.envelope.len() - 1;
        if position <= 0.0 {
            return self.envelope[0];
        }
        let idx_a = position as usize;
        if idx_a >= last {
            return self.envelope[last];
        }
        let frac = position - idx_a as f32;
        self.envelope[idx_a] * (1.0 - frac) + self.envelope[idx_a + 1] * frac
    }

    pub fn clear(&mut self) {
        self.envelope.fill(ENVELOPE_FLOOR);
        self.prefix.fill(0.0);
    }
}
