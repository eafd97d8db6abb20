//! Processor configuration.

use crate::error::ConfigError;

/// Musician-facing voice settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoiceSettings {
    /// Pitch transpose in semitones.
    pub shift_semitones: f32,
    /// Absolute formant (spectral envelope) shift in semitones.
    pub formant_semitones: f32,
    /// Assumed fundamental of the source voice, in Hz.
    pub formant_base_hz: f32,
}

impl VoiceSettings {
    /// Raises a typical male voice into a female register.
    pub const MALE_TO_FEMALE: VoiceSettings = VoiceSettings::new(10.0, 2.0, 100.0);

    /// Lowers a typical female voice into a male register.
    pub const FEMALE_TO_MALE: VoiceSettings = VoiceSettings::new(-10.0, -2.0, 200.0);

    pub const fn new(shift_semitones: f32, formant_semitones: f32, formant_base_hz: f32) -> Self {
        VoiceSettings {
            shift_semitones,
            formant_semitones,
            formant_base_hz,
        }
    }

    /// Returns true if every field is finite.
    pub fn is_finite(&self) -> bool {
        self.shift_semitones.is_finite()
            && self.formant_semitones.is_finite()
            && self.formant_base_hz.is_finite()
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self::MALE_TO_FEMALE
    }
}

/// Which settings a re-`configure` of an already configured processor applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReconfigurePolicy {
    /// Apply [`ProcessorConfig::default_settings`], discarding the last explicit settings.
    #[default]
    ApplyDefaults,
    /// Re-apply the last settings the processor held.
    KeepCurrent,
}

/// Output limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LimiterConfig {
    /// Output magnitude ceiling in 16-bit sample units.
    pub ceiling: f32,
    /// Gain recovery time constant in seconds.
    pub release_seconds: f32,
}

impl LimiterConfig {
    /// Headroom below `i16::MAX`.
    pub const DEFAULT_CEILING: f32 = 32760.0;
    pub const DEFAULT_RELEASE_SECONDS: f32 = 0.05;

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ceiling_ok = self.ceiling > 0.0 && self.ceiling <= i16::MAX as f32;
        let release_ok = self.release_seconds.is_finite() && self.release_seconds > 0.0;
        if ceiling_ok && release_ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidLimiter {
                ceiling: self.ceiling,
                release_seconds: self.release_seconds,
            })
        }
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        LimiterConfig {
            ceiling: Self::DEFAULT_CEILING,
            release_seconds: Self::DEFAULT_RELEASE_SECONDS,
        }
    }
}

/// Construction-time configuration of a [`VoiceProcessor`](crate::voice::processor::VoiceProcessor).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessorConfig {
    /// Settings applied by `configure`.
    pub default_settings: VoiceSettings,
    pub on_reconfigure: ReconfigurePolicy,
    pub limiter: LimiterConfig,
    /// Engine analysis window, as a fraction of one second.
    pub window_seconds: f32,
    /// Engine analysis interval, as a fraction of one second.
    pub interval_seconds: f32,
}

impl ProcessorConfig {
    pub fn with_default_settings(mut self, settings: VoiceSettings) -> Self {
        self.default_settings = settings;
        self
    }

    pub fn with_reconfigure_policy(mut self, policy: ReconfigurePolicy) -> Self {
        self.on_reconfigure = policy;
        self
    }

    pub fn with_limiter(mut self, limiter: LimiterConfig) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_window(mut self, window_seconds: f32, interval_seconds: f32) -> Self {
        self.window_seconds = window_seconds;
        self.interval_seconds = interval_seconds;
        self
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            default_settings: VoiceSettings::default(),
            on_reconfigure: ReconfigurePolicy::default(),
            limiter: LimiterConfig::default(),
            window_seconds: 0.06,
            interval_seconds: 0.015,
        }
    }
}
