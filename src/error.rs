//! Error types for voxshift-core.

use thiserror::Error;

/// Errors reported by a [`StretchEngine`](crate::core::engine::StretchEngine).
///
/// Only configuration-time engine errors ever reach a caller (wrapped in
/// [`ConfigError::Engine`]). Errors raised while processing a block are
/// absorbed by the processor, which passes the input through untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("unsupported channel count {0}, only mono is supported")]
    UnsupportedChannels(usize),

    #[error("invalid window length: {0} samples")]
    InvalidWindow(usize),

    #[error("invalid analysis interval: {interval} samples for a {window} sample window")]
    InvalidInterval { interval: usize, window: usize },

    #[error("engine used before configuration")]
    NotConfigured,

    #[error("input/output length mismatch: {input} in, {output} out")]
    LengthMismatch { input: usize, output: usize },

    #[error("engine produced a non-finite sample")]
    NonFiniteOutput,

    #[error("no FFT available for size {0}")]
    Fft(usize),
}

/// Reasons a call to `configure` was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("invalid sample rate: {0}. Must be in (0, 768000] Hz")]
    InvalidSampleRate(f32),

    #[error("invalid maximum block length: must be between 1 and 1048576 samples")]
    InvalidBlockLength,

    #[error("invalid limiter: ceiling {ceiling} must be in (0, 32767], release {release_seconds}s must be positive")]
    InvalidLimiter { ceiling: f32, release_seconds: f32 },

    #[error("engine rejected configuration: {0}")]
    Engine(#[from] EngineError),
}

/// Error type for processor and registry operations.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum Error {
    #[error("failed to configure voice processor: {0}")]
    Configuration(#[from] ConfigError),

    #[error("voice processor not configured")]
    NotConfigured,

    #[error("block of {length} samples exceeds configured maximum of {max}")]
    BufferTooLarge { length: usize, max: usize },

    #[error("input/output length mismatch: {input} in, {output} out")]
    LengthMismatch { input: usize, output: usize },

    #[error("voice settings must be finite")]
    InvalidSettings,

    #[error("unknown or destroyed processor handle")]
    UnknownHandle,

    #[error("empty audio block")]
    EmptyBlock,
}

pub type Result<T> = core::result::Result<T, Error>;
