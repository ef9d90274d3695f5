//! Audio system
//!
//! Loads buffered and streamed sources, binds each to a hardware channel
//! from a fixed pool and drives play/stop/loop state. Everything runs on the
//! caller's thread; call [`AudioSystem::update`] once per frame.

pub mod backend;
pub mod buffered;
pub mod channel_allocator;
pub mod config;
pub mod decoder;
pub mod format;
pub mod registry;
pub mod source;
pub mod streaming;

#[cfg(test)]
mod tests;

pub use backend::{AudioHardware, create_backend};
pub use buffered::BufferedSource;
pub use channel_allocator::{ChannelAllocator, ChannelId};
pub use config::AudioConfig;
pub use decoder::StreamDecoder;
pub use format::AudioContainer;
pub use registry::{SourceHandle, SourceRegistry};
pub use source::{PlaybackState, Source};
pub use streaming::StreamingSource;

use crate::config::ConfigError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Audio errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// Source file does not exist
    #[error("Could not open source, {0} does not exist")]
    NotFound(PathBuf),

    /// Unrecognized extension or container
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Corrupt or truncated data
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Every hardware channel is in use
    #[error("No free hardware audio channel")]
    ChannelExhausted,

    /// Sample memory could not be allocated
    #[error("Could not allocate sound buffer of {requested} bytes")]
    OutOfMemory {
        /// Bytes requested
        requested: usize,
    },

    /// Playback impossible right now
    #[error("There was an error playing the source, sound may not be available: {0}")]
    HardwareUnavailable(String),

    /// Backend could not be opened
    #[error("Audio backend initialization failed: {0}")]
    BackendInitFailed(String),

    /// Backend rejected a command
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    /// Handle does not refer to a live source
    #[error("Invalid source handle")]
    InvalidHandle,

    /// Invalid audio configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio system owning the hardware, the channel pool and every live source
///
/// This is the surface the scripting layer binds: `new_source`, `play`,
/// `stop`, `is_playing`, `set_looping`, `is_looping` and `unload`. A script
/// handle's finalizer should call [`unload`](Self::unload); unloading twice
/// is harmless.
pub struct AudioSystem<H: AudioHardware = Box<dyn AudioHardware>> {
    config: AudioConfig,
    hardware: H,
    channels: ChannelAllocator,
    sources: SourceRegistry,
}

impl<H: AudioHardware> AudioSystem<H> {
    /// Create an audio system on top of `hardware`
    ///
    /// # Errors
    /// `Config` if the configuration fails validation.
    pub fn new(config: AudioConfig, hardware: H) -> Result<Self, AudioError> {
        config.validate()?;

        if !hardware.is_available() {
            log::warn!("Audio hardware reports sound disabled; sources will load but not play");
        }
        log::info!(
            "Audio system ready: {} channels from ch{}, {} x {} byte stream buffers",
            config.channel_count,
            config.channel_base,
            config.stream_ring_slots,
            config.stream_buffer_bytes
        );

        Ok(Self {
            channels: ChannelAllocator::new(config.channel_base, config.channel_count),
            sources: SourceRegistry::new(),
            config,
            hardware,
        })
    }

    /// Load a source, choosing the loader from the file extension
    ///
    /// `.raw` and `.wav` clips are buffered; `.ogg` files are streamed.
    ///
    /// # Errors
    /// `NotFound`, `UnsupportedFormat`, `DecodeError`, `ChannelExhausted` or
    /// `OutOfMemory`. A failed load never holds on to a channel.
    pub fn new_source(&mut self, path: impl AsRef<Path>) -> Result<SourceHandle, AudioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AudioError::NotFound(path.to_path_buf()));
        }

        let source: Source = if AudioContainer::from_path(path)?.is_streamed() {
            StreamingSource::open(path, &self.config, &mut self.channels)?.into()
        } else {
            BufferedSource::load(path, &self.config, &mut self.channels)?.into()
        };

        Ok(self.sources.insert(source))
    }

    /// Open a stream around an already constructed decoder
    ///
    /// `path` only labels the source in logs.
    ///
    /// # Errors
    /// `ChannelExhausted`, `OutOfMemory` or `DecodeError`; the channel is
    /// returned to the pool on failure.
    pub fn new_stream(
        &mut self,
        path: impl Into<PathBuf>,
        decoder: Box<dyn StreamDecoder>,
    ) -> Result<SourceHandle, AudioError> {
        let channel = self.channels.acquire()?;
        match StreamingSource::with_decoder(path.into(), decoder, channel, &self.config) {
            Ok(source) => Ok(self.sources.insert(source.into())),
            Err(e) => {
                self.channels.release(channel);
                Err(e)
            }
        }
    }

    /// Start playback
    ///
    /// # Errors
    /// `InvalidHandle` for an unloaded source, `HardwareUnavailable` when the
    /// source or the device cannot play.
    pub fn play(&mut self, handle: SourceHandle) -> Result<(), AudioError> {
        let source = self.sources.get_mut(handle).ok_or(AudioError::InvalidHandle)?;
        source.play(&mut self.hardware)
    }

    /// Stop playback; does nothing for an unloaded source
    pub fn stop(&mut self, handle: SourceHandle) {
        if let Some(source) = self.sources.get_mut(handle) {
            source.stop(&mut self.hardware);
        }
    }

    /// Hardware play state; `false` for an unloaded source
    pub fn is_playing(&self, handle: SourceHandle) -> bool {
        self.sources
            .get(handle)
            .is_some_and(|source| source.is_playing(&self.hardware))
    }

    /// Set the loop flag; does nothing for an unloaded source
    pub fn set_looping(&mut self, handle: SourceHandle, looping: bool) {
        if let Some(source) = self.sources.get_mut(handle) {
            source.set_looping(looping, &mut self.hardware);
        }
    }

    /// Loop flag; `false` for an unloaded source
    pub fn is_looping(&self, handle: SourceHandle) -> bool {
        self.sources.get(handle).is_some_and(Source::is_looping)
    }

    /// Controller state of a source
    pub fn state(&self, handle: SourceHandle) -> Option<PlaybackState> {
        self.sources.get(handle).map(Source::state)
    }

    /// Look up a source
    pub fn source(&self, handle: SourceHandle) -> Option<&Source> {
        self.sources.get(handle)
    }

    /// Stop a source, free its memory and return its channel
    ///
    /// Also the finalizer path; unloading an already unloaded handle is a no-op.
    pub fn unload(&mut self, handle: SourceHandle) {
        if let Some(mut source) = self.sources.remove(handle) {
            source.release(&mut self.hardware, &mut self.channels);
        }
    }

    /// Per-frame servicing: refill stream buffers and track drained sources
    ///
    /// Returns the number of sources whose servicing failed this tick.
    pub fn update(&mut self) -> usize {
        self.sources.service(&mut self.hardware)
    }

    /// Release every source
    pub fn shutdown(&mut self) {
        let count = self.sources.len();
        for (_, mut source) in self.sources.drain() {
            source.release(&mut self.hardware, &mut self.channels);
        }
        if count > 0 {
            log::info!("Audio system shut down, released {} source(s)", count);
        }
    }

    /// Number of live sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Number of hardware channels held by sources
    pub fn channels_in_use(&self) -> usize {
        self.channels.reserved_count()
    }

    /// The channel pool
    pub fn channels(&self) -> &ChannelAllocator {
        &self.channels
    }

    /// Active configuration
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// The hardware backend
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// The hardware backend, mutably
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }
}

impl<H: AudioHardware> Drop for AudioSystem<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<H: AudioHardware + ?Sized> AudioHardware for Box<H> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn play_sound(&mut self, command: &backend::PlaySound<'_>) -> Result<(), AudioError> {
        (**self).play_sound(command)
    }

    fn is_playing(&self, channel: ChannelId) -> bool {
        (**self).is_playing(channel)
    }

    fn set_play_state(&mut self, channel: ChannelId, playing: bool) {
        (**self).set_play_state(channel, playing);
    }

    fn update_info(&mut self) {
        (**self).update_info();
    }

    fn configure_channel(&mut self, channel: ChannelId, format: &backend::ChannelFormat) {
        (**self).configure_channel(channel, format);
    }

    fn queue_wave_buffer(&mut self, channel: ChannelId, slot: usize, data: &[u8]) -> Result<(), AudioError> {
        (**self).queue_wave_buffer(channel, slot, data)
    }

    fn wave_buffer_done(&self, channel: ChannelId, slot: usize) -> bool {
        (**self).wave_buffer_done(channel, slot)
    }

    fn clear_channel(&mut self, channel: ChannelId) {
        (**self).clear_channel(channel);
    }
}
