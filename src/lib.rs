#![no_std]

//! Real-time voice timbre shifting for 16-bit PCM call audio.
//!
//! A [`VoiceProcessor`] takes fixed-length mono blocks, shifts pitch and
//! formants through a [`StretchEngine`](crate::core::engine::StretchEngine), and
//! returns peak-limited blocks of the same length. Steady-state processing
//! never allocates, so it is safe to call from an audio callback.
//!
//! ```
//! use voxshift_core::{VoiceProcessor, VoiceSettings};
//!
//! let mut processor = VoiceProcessor::new();
//! processor.configure(8000.0, 160).unwrap();
//! processor.set_settings(VoiceSettings::FEMALE_TO_MALE).unwrap();
//!
//! let packet = [0i16; 160];
//! let mut out = [0i16; 160];
//! processor.process(&packet, &mut out).unwrap();
//! ```

extern crate alloc;

pub mod config;
pub mod core;
pub mod effects;
pub mod error;
pub mod voice;

pub use crate::config::{LimiterConfig, ProcessorConfig, ReconfigurePolicy, VoiceSettings};
pub use crate::core::engine::StretchEngine;
pub use crate::error::{ConfigError, EngineError, Error, Result};
pub use crate::voice::processor::{ProcessorState, VoiceProcessor};
pub use crate::voice::registry::{ProcessorHandle, ProcessorRegistry};
