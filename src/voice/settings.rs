//! Translation from musical units to engine parameters.
//!
//! All sample-rate dependent unit conversion happens here, so the rest of
//! the processor only deals in semitones and Hz.

use crate::config::VoiceSettings;
use crate::core::engine::StretchEngine;

/// Numerator of the transpose smoothing bound, divided by the sample rate.
pub const SMOOTHING_RATIO: f32 = 6000.0;

/// Voice settings expressed in the engine's sample-rate relative units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParams {
    pub transpose_semitones: f32,
    pub smoothing_bound: f32,
    pub formant_semitones: f32,
    pub formant_absolute: bool,
    pub formant_base: f32,
}

impl EngineParams {
    /// Translates `settings` for an engine running at `sample_rate`.
    pub fn translate(settings: &VoiceSettings, sample_rate: f32) -> Self {
        EngineParams {
            transpose_semitones: settings.shift_semitones,
            smoothing_bound: SMOOTHING_RATIO / sample_rate,
            formant_semitones: settings.formant_semitones,
            formant_absolute: true,
            formant_base: settings.formant_base_hz / sample_rate,
        }
    }

    /// Pushes the parameters into `engine`.
    pub fn apply<E: StretchEngine + ?Sized>(&self, engine: &mut E) {
        engine.set_transpose_semitones(self.transpose_semitones, self.smoothing_bound);
        engine.set_formant_semitones(self.formant_semitones, self.formant_absolute);
        engine.set_formant_base(self.formant_base);
    }
}
