//! Handle-based ownership of processors for foreign callers.
//!
//! Callers across an FFI or RPC boundary hold a [`ProcessorHandle`] rather
//! than a pointer. Handles carry a generation, so a handle to a destroyed
//! processor is rejected even after its slot has been reused.

use crate::config::{ProcessorConfig, VoiceSettings};
use crate::core::engine::StretchEngine;
use crate::effects::spectral::stretch::SpectralStretch;
use crate::error::{Error, Result};
use crate::voice::processor::VoiceProcessor;
use alloc::vec;
use alloc::vec::Vec;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Generation-checked reference to a processor in a [`ProcessorRegistry`].
    pub struct ProcessorHandle;
}

/// Owns any number of independent [`VoiceProcessor`]s addressed by handle.
pub struct ProcessorRegistry<E: StretchEngine = SpectralStretch> {
    processors: SlotMap<ProcessorHandle, VoiceProcessor<E>>,
    config: ProcessorConfig,
}

impl<E: StretchEngine> ProcessorRegistry<E> {
    pub fn new() -> Self {
        Self::with_config(ProcessorConfig::default())
    }

    /// Creates a registry whose processors all use `config`.
    pub fn with_config(config: ProcessorConfig) -> Self {
        ProcessorRegistry {
            processors: SlotMap::with_key(),
            config,
        }
    }

    /// Registers an unconfigured processor around `engine`.
    pub fn create_with(&mut self, engine: E) -> ProcessorHandle {
        let handle = self
            .processors
            .insert(VoiceProcessor::with_config(engine, self.config));
        log::debug!("created processor {:?}", handle);
        handle
    }

    /// Drops the processor behind `handle`. Returns false if it did not exist.
    pub fn destroy(&mut self, handle: ProcessorHandle) -> bool {
        let removed = self.processors.remove(handle).is_some();
        if removed {
            log::debug!("destroyed processor {:?}", handle);
        }
        removed
    }

    pub fn get(&self, handle: ProcessorHandle) -> Option<&VoiceProcessor<E>> {
        self.processors.get(handle)
    }

    pub fn get_mut(&mut self, handle: ProcessorHandle) -> Option<&mut VoiceProcessor<E>> {
        self.processors.get_mut(handle)
    }

    fn lookup(&mut self, handle: ProcessorHandle) -> Result<&mut VoiceProcessor<E>> {
        self.processors.get_mut(handle).ok_or(Error::UnknownHandle)
    }

    pub fn configure(
        &mut self,
        handle: ProcessorHandle,
        sample_rate: f32,
        max_block_length: usize,
    ) -> Result<()> {
        self.lookup(handle)?.configure(sample_rate, max_block_length)
    }

    pub fn set_settings(
        &mut self,
        handle: ProcessorHandle,
        shift_semitones: f32,
        formant_semitones: f32,
        formant_base_hz: f32,
    ) -> Result<()> {
        self.lookup(handle)?.set_settings(VoiceSettings::new(
            shift_semitones,
            formant_semitones,
            formant_base_hz,
        ))
    }

    /// Processes `input` and returns a newly allocated output block.
    ///
    /// This allocates; real-time callers should prefer
    /// [`process_into`](ProcessorRegistry::process_into).
    pub fn process(&mut self, handle: ProcessorHandle, input: &[i16]) -> Result<Vec<i16>> {
        let processor = self.lookup(handle)?;
        if input.is_empty() {
            return Err(Error::EmptyBlock);
        }
        let mut output = vec![0; input.len()];
        processor.process(input, &mut output)?;
        Ok(output)
    }

    /// Processes `input` into a caller-provided `output` of the same length.
    pub fn process_into(
        &mut self,
        handle: ProcessorHandle,
        input: &[i16],
        output: &mut [i16],
    ) -> Result<()> {
        let processor = self.lookup(handle)?;
        if input.is_empty() {
            return Err(Error::EmptyBlock);
        }
        processor.process(input, output)
    }

    pub fn reset(&mut self, handle: ProcessorHandle) -> Result<()> {
        self.lookup(handle)?.reset();
        Ok(())
    }

    /// Returns false for unknown handles.
    pub fn is_configured(&self, handle: ProcessorHandle) -> bool {
        self.processors
            .get(handle)
            .is_some_and(VoiceProcessor::is_configured)
    }

    pub fn contains(&self, handle: ProcessorHandle) -> bool {
        self.processors.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl<E: StretchEngine + Default> ProcessorRegistry<E> {
    /// Registers an unconfigured processor with a default engine.
    pub fn create(&mut self) -> ProcessorHandle {
        self.create_with(E::default())
    }
}

impl<E: StretchEngine> Default for ProcessorRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_destroy() {
        let mut registry: ProcessorRegistry = ProcessorRegistry::new();
        let a = registry.create();
        let b = registry.create();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_configured(a));

        assert!(registry.destroy(a));
        assert!(!registry.destroy(a));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(b));
    }

    #[test]
    fn test_stale_handle_rejected_after_slot_reuse() {
        let mut registry: ProcessorRegistry = ProcessorRegistry::new();
        let stale = registry.create();
        registry.destroy(stale);
        let fresh = registry.create();
        assert_ne!(stale, fresh);

        assert_eq!(registry.configure(stale, 8000.0, 160), Err(Error::UnknownHandle));
        assert_eq!(registry.process(stale, &[0; 4]), Err(Error::UnknownHandle));
        assert_eq!(registry.reset(stale), Err(Error::UnknownHandle));
        assert!(!registry.is_configured(stale));
    }

    #[test]
    fn test_process_through_handle() {
        let mut registry: ProcessorRegistry = ProcessorRegistry::new();
        let handle = registry.create();

        assert_eq!(registry.process(handle, &[0; 4]), Err(Error::NotConfigured));
        assert_eq!(
            registry.set_settings(handle, 10.0, 2.0, 100.0),
            Err(Error::NotConfigured)
        );

        registry.configure(handle, 8000.0, 160).unwrap();
        registry.set_settings(handle, -10.0, -2.0, 200.0).unwrap();
        assert_eq!(registry.process(handle, &[]), Err(Error::EmptyBlock));

        let output = registry.process(handle, &[0; 160]).unwrap();
        assert_eq!(output.len(), 160);

        let mut into = [1i16; 160];
        registry.process_into(handle, &[0; 160], &mut into).unwrap();
        assert!(into.iter().all(|&s| s == 0));

        registry.reset(handle).unwrap();
        assert!(registry.is_configured(handle));
    }

    #[test]
    fn test_instances_are_independent() {
        let mut registry: ProcessorRegistry = ProcessorRegistry::new();
        let a = registry.create();
        let b = registry.create();
        registry.configure(a, 8000.0, 160).unwrap();

        assert!(registry.is_configured(a));
        assert!(!registry.is_configured(b));
        assert_eq!(
            registry.get(a).map(VoiceProcessor::max_block_length),
            Some(160)
        );
    }
}
