use crate::config::{ProcessorConfig, ReconfigurePolicy, VoiceSettings};
use crate::core::engine::StretchEngine;
use crate::effects::spectral::stretch::SpectralStretch;
use crate::error::{ConfigError, EngineError, Error, Result};
use crate::voice::adapter::StretchAdapter;
use crate::voice::settings::EngineParams;

/// Highest sample rate accepted by [`VoiceProcessor::configure`].
pub const MAX_SAMPLE_RATE: f32 = 768_000.0;

/// Largest block length accepted by [`VoiceProcessor::configure`].
pub const MAX_BLOCK_LENGTH: usize = 1 << 20;

/// Lifecycle state of a [`VoiceProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Unconfigured,
    Configured,
}

/// Real-time voice timbre processor for one mono 16-bit stream.
///
/// A processor starts [`Unconfigured`](ProcessorState::Unconfigured). A
/// successful [`configure`](VoiceProcessor::configure) sizes all buffers
/// and applies default settings; from then on
/// [`process`](VoiceProcessor::process) can run on an audio thread without
/// allocating. Calls must be serialized by the owner.
///
/// If the engine fails while processing a block, the block is passed
/// through unmodified instead of reporting an error, so the stream never
/// stalls.
pub struct VoiceProcessor<E: StretchEngine = SpectralStretch> {
    config: ProcessorConfig,
    adapter: StretchAdapter<E>,
    state: ProcessorState,
    sample_rate: f32,
    max_block_length: usize,
    settings: VoiceSettings,
    engine_failing: bool,
}

impl VoiceProcessor<SpectralStretch> {
    /// Creates an unconfigured processor backed by [`SpectralStretch`].
    pub fn new() -> Self {
        Self::with_engine(SpectralStretch::new())
    }
}

impl Default for VoiceProcessor<SpectralStretch> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: StretchEngine> VoiceProcessor<E> {
    /// Creates an unconfigured processor around `engine` with the default configuration.
    pub fn with_engine(engine: E) -> Self {
        Self::with_config(engine, ProcessorConfig::default())
    }

    /// Creates an unconfigured processor around `engine`.
    pub fn with_config(engine: E, config: ProcessorConfig) -> Self {
        VoiceProcessor {
            config,
            adapter: StretchAdapter::new(engine, config.limiter),
            state: ProcessorState::Unconfigured,
            sample_rate: 0.0,
            max_block_length: 0,
            settings: config.default_settings,
            engine_failing: false,
        }
    }

    /// Configures the processor for a stream format.
    ///
    /// Discards all engine and limiter state. On failure the processor is
    /// left unconfigured.
    ///
    /// # Arguments
    /// * `sample_rate` - Stream sample rate in Hz.
    /// * `max_block_length` - Largest block that will be passed to `process`.
    pub fn configure(&mut self, sample_rate: f32, max_block_length: usize) -> Result<()> {
        let was_configured = self.is_configured();
        self.state = ProcessorState::Unconfigured;

        if let Err(e) = self.validate(sample_rate, max_block_length) {
            log::warn!("rejected configuration ({} Hz, {} samples): {}", sample_rate, max_block_length, e);
            return Err(e);
        }

        let window = (sample_rate * self.config.window_seconds) as usize;
        let interval = (sample_rate * self.config.interval_seconds) as usize;
        if let Err(e) = self
            .adapter
            .engine_mut()
            .configure(1, window, interval, true)
        {
            log::warn!("{} rejected window {} / interval {}: {}", self.adapter.engine().name(), window, interval, e);
            return Err(ConfigError::Engine(e).into());
        }

        self.adapter
            .prepare(sample_rate, max_block_length, self.config.limiter);
        self.sample_rate = sample_rate;
        self.max_block_length = max_block_length;
        self.state = ProcessorState::Configured;
        self.engine_failing = false;

        let settings = match (was_configured, self.config.on_reconfigure) {
            (true, ReconfigurePolicy::KeepCurrent) => self.settings,
            _ => self.config.default_settings,
        };
        self.apply(settings);

        log::debug!(
            "configured {} at {} Hz: window {}, interval {}, max block {}, latency {}",
            self.adapter.engine().name(),
            sample_rate,
            window,
            interval,
            max_block_length,
            self.latency_samples()
        );
        Ok(())
    }

    fn validate(&self, sample_rate: f32, max_block_length: usize) -> Result<()> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 || sample_rate > MAX_SAMPLE_RATE {
            return Err(ConfigError::InvalidSampleRate(sample_rate).into());
        }
        if max_block_length == 0 || max_block_length > MAX_BLOCK_LENGTH {
            return Err(ConfigError::InvalidBlockLength.into());
        }
        self.config.limiter.validate()?;
        if !self.config.default_settings.is_finite() {
            return Err(Error::InvalidSettings);
        }
        Ok(())
    }

    /// Updates pitch and formant settings.
    pub fn set_settings(&mut self, settings: VoiceSettings) -> Result<()> {
        if !self.is_configured() {
            return Err(Error::NotConfigured);
        }
        if !settings.is_finite() {
            return Err(Error::InvalidSettings);
        }
        self.apply(settings);
        Ok(())
    }

    fn apply(&mut self, settings: VoiceSettings) {
        self.settings = settings;
        EngineParams::translate(&settings, self.sample_rate).apply(self.adapter.engine_mut());
    }

    fn check_block(&self, length: usize) -> Result<()> {
        if !self.is_configured() {
            return Err(Error::NotConfigured);
        }
        if length > self.max_block_length {
            return Err(Error::BufferTooLarge {
                length,
                max: self.max_block_length,
            });
        }
        Ok(())
    }

    /// Processes one block from `input` into `output`.
    ///
    /// `output` must be as long as `input`. Engine failures are not
    /// reported: the input is copied to the output instead.
    pub fn process(&mut self, input: &[i16], output: &mut [i16]) -> Result<()> {
        self.check_block(input.len())?;
        if input.len() != output.len() {
            return Err(Error::LengthMismatch {
                input: input.len(),
                output: output.len(),
            });
        }

        let result = self.adapter.process(input, output);
        if result.is_err() {
            output.copy_from_slice(input);
        }
        self.track_engine(result);
        Ok(())
    }

    /// Processes one block in place. On engine failure the block is left as it was.
    pub fn process_in_place(&mut self, block: &mut [i16]) -> Result<()> {
        self.check_block(block.len())?;

        let result = self.adapter.process_in_place(block);
        self.track_engine(result);
        Ok(())
    }

    /// Logs only when the engine starts or stops failing, not once per block.
    fn track_engine(&mut self, result: core::result::Result<(), EngineError>) {
        match result {
            Err(e) if !self.engine_failing => {
                self.engine_failing = true;
                log::warn!("engine failed, passing blocks through: {}", e);
            }
            Ok(()) if self.engine_failing => {
                self.engine_failing = false;
                log::info!("engine recovered");
            }
            _ => {}
        }
    }

    /// Processes a buffer of any length in place, in blocks of at most
    /// `max_block_length` samples.
    pub fn process_chunked(&mut self, samples: &mut [i16]) -> Result<()> {
        if !self.is_configured() {
            return Err(Error::NotConfigured);
        }
        for block in samples.chunks_mut(self.max_block_length) {
            self.process_in_place(block)?;
        }
        Ok(())
    }

    /// Clears engine and limiter state between unrelated streams.
    ///
    /// Does nothing while unconfigured. Engine errors are logged and ignored.
    pub fn reset(&mut self) {
        if !self.is_configured() {
            return;
        }
        self.engine_failing = false;
        if let Err(e) = self.adapter.reset() {
            log::warn!("ignoring engine reset failure: {}", e);
        }
    }

    /// Whether the most recent block was passed through because the engine failed.
    pub fn is_passing_through(&self) -> bool {
        self.engine_failing
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn is_configured(&self) -> bool {
        self.state == ProcessorState::Configured
    }

    /// Sample rate of the last successful configuration.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn max_block_length(&self) -> usize {
        self.max_block_length
    }

    /// The settings most recently applied.
    pub fn settings(&self) -> VoiceSettings {
        self.settings
    }

    /// Current output limiter gain, in `(0, 1]`.
    pub fn limiter_gain(&self) -> f32 {
        self.adapter.limiter().gain()
    }

    /// Returns the latency of the processor in samples.
    pub fn latency_samples(&self) -> usize {
        if self.is_configured() {
            self.adapter.engine().latency_samples()
        } else {
            0
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        self.adapter.engine()
    }
}
