//! Sources and playback control
//!
//! [`Source`] is either a buffered clip or a stream. The controller methods
//! here translate play/stop/loop requests into hardware commands and poll
//! the hardware for play state; they never wait on it.

use crate::audio::backend::{AudioHardware, PlaySound, SoundFlags};
use crate::audio::buffered::BufferedSource;
use crate::audio::channel_allocator::{ChannelAllocator, ChannelId};
use crate::audio::streaming::StreamingSource;
use crate::audio::AudioError;

/// Playback state of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Loaded, never played
    Idle,
    /// Armed on the hardware
    Playing,
    /// Stopped explicitly, drained, or released
    Stopped,
}

/// A loaded audio source
#[derive(Debug)]
pub enum Source {
    /// Clip held fully in memory
    Buffered(BufferedSource),
    /// Stream decoded incrementally into a ring of buffers
    Streaming(StreamingSource),
}

impl Source {
    /// Start playback
    ///
    /// Idempotent while the hardware reports the channel as playing.
    ///
    /// # Errors
    /// `HardwareUnavailable` if the source has no channel, no sample data, no
    /// format or a zero sample rate, or if audio is globally disabled. No
    /// hardware command is issued in that case.
    pub fn play(&mut self, hardware: &mut dyn AudioHardware) -> Result<(), AudioError> {
        match self {
            Self::Buffered(source) => play_buffered(source, hardware),
            Self::Streaming(source) => source.play(hardware),
        }
    }

    /// Stop playback
    ///
    /// Does nothing if already stopped or if there is nothing playable to stop.
    pub fn stop(&mut self, hardware: &mut dyn AudioHardware) {
        match self {
            Self::Buffered(source) => stop_buffered(source, hardware),
            Self::Streaming(source) => source.stop(hardware),
        }
    }

    /// Hardware play state of this source's channel
    pub fn is_playing(&self, hardware: &dyn AudioHardware) -> bool {
        self.channel().is_some_and(|channel| hardware.is_playing(channel))
    }

    /// Change the loop flag
    ///
    /// Applies from the next arm or loop boundary; playback already in flight
    /// keeps its mode.
    pub fn set_looping(&mut self, looping: bool, hardware: &mut dyn AudioHardware) {
        match self {
            Self::Buffered(source) => source.looping = looping,
            Self::Streaming(source) => source.set_looping(looping),
        }

        if self.channel().is_some() && hardware.is_available() {
            hardware.update_info();
        }
    }

    /// Current loop flag
    pub fn is_looping(&self) -> bool {
        match self {
            Self::Buffered(source) => source.looping,
            Self::Streaming(source) => source.is_looping(),
        }
    }

    /// Stop the hardware, free sample memory and return the channel to the pool
    ///
    /// Safe to call any number of times; only the first call has an effect.
    pub fn release(&mut self, hardware: &mut dyn AudioHardware, channels: &mut ChannelAllocator) {
        match self {
            Self::Buffered(source) => release_buffered(source, hardware, channels),
            Self::Streaming(source) => source.release(hardware, channels),
        }
    }

    /// Per-tick servicing: refill stream buffers and notice drained playback
    pub fn service(&mut self, hardware: &mut dyn AudioHardware) -> Result<(), AudioError> {
        match self {
            Self::Buffered(source) => {
                if source.state == PlaybackState::Playing
                    && !source.channel.is_some_and(|channel| hardware.is_playing(channel))
                {
                    source.state = PlaybackState::Stopped;
                }
                Ok(())
            }
            Self::Streaming(source) => source.service(hardware),
        }
    }

    /// Assigned hardware channel, `None` once released
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            Self::Buffered(source) => source.channel,
            Self::Streaming(source) => source.channel(),
        }
    }

    /// Controller state
    pub fn state(&self) -> PlaybackState {
        match self {
            Self::Buffered(source) => source.state,
            Self::Streaming(source) => source.state(),
        }
    }

    /// Whether this source is decoded incrementally
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }
}

impl From<BufferedSource> for Source {
    fn from(source: BufferedSource) -> Self {
        Self::Buffered(source)
    }
}

impl From<StreamingSource> for Source {
    fn from(source: StreamingSource) -> Self {
        Self::Streaming(source)
    }
}

fn play_buffered(source: &mut BufferedSource, hardware: &mut dyn AudioHardware) -> Result<(), AudioError> {
    let (Some(channel), Some(data), Some(format)) = (source.channel, source.buffer.as_deref(), source.format) else {
        return Err(AudioError::HardwareUnavailable(
            "source has no channel, sample buffer or format".to_string(),
        ));
    };
    if data.is_empty() || source.sample_rate == 0 {
        return Err(AudioError::HardwareUnavailable(format!(
            "source has {} bytes at {} Hz",
            data.len(),
            source.sample_rate
        )));
    }
    if !hardware.is_available() {
        return Err(AudioError::HardwareUnavailable("sound is disabled".to_string()));
    }

    if hardware.is_playing(channel) {
        return Ok(());
    }

    let mode = if source.looping { SoundFlags::REPEAT } else { SoundFlags::ONE_SHOT };
    hardware.play_sound(&PlaySound {
        channel,
        flags: format.flags() | mode,
        sample_rate: source.sample_rate,
        channel_count: 1,
        offset: 0,
        data,
        loop_data: data,
    })?;
    hardware.update_info();

    source.armed = true;
    source.state = PlaybackState::Playing;
    Ok(())
}

fn stop_buffered(source: &mut BufferedSource, hardware: &mut dyn AudioHardware) {
    if source.state == PlaybackState::Stopped {
        return;
    }
    let Some(channel) = source.channel else {
        return;
    };
    if source.buffer.is_none() || source.format.is_none() || source.sample_rate == 0 || !hardware.is_available() {
        return;
    }

    hardware.set_play_state(channel, false);
    hardware.update_info();
    source.state = PlaybackState::Stopped;
}

fn release_buffered(source: &mut BufferedSource, hardware: &mut dyn AudioHardware, channels: &mut ChannelAllocator) {
    if let Some(channel) = source.channel {
        if hardware.is_available() {
            hardware.set_play_state(channel, false);
            hardware.update_info();
        }
    }

    if let Some(buffer) = source.buffer.take() {
        log::info!("Unloaded {} ({} bytes)", source.path().display(), buffer.len());
    }
    if let Some(channel) = source.channel.take() {
        channels.release(channel);
    }
    source.state = PlaybackState::Stopped;
}
