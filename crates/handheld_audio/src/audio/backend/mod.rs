//! Audio hardware backends
//!
//! The boundary between the source manager and whatever actually produces
//! sound. Commands are fire-and-forget and status is polled; nothing here
//! blocks waiting on the device.

#[cfg(feature = "rodio")]
pub mod rodio_backend;
pub mod simulated;

use crate::audio::channel_allocator::ChannelId;
use crate::audio::config::MIX_CHANNELS;
use crate::audio::AudioError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Format and loop-mode bits of a hardware play command
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SoundFlags: u32 {
        /// Loop forever, restarting from the loop data
        const REPEAT = 1 << 10;
        /// Play once then stop
        const ONE_SHOT = 1 << 11;
        /// 8-bit signed PCM
        const PCM8 = 1 << 12;
        /// 16-bit signed little-endian PCM
        const PCM16 = 1 << 13;
    }
}

/// Sample format of a buffered clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 8-bit signed PCM
    Pcm8,
    /// 16-bit signed little-endian PCM
    Pcm16,
}

impl SampleFormat {
    /// Hardware format bits for this sample format
    pub fn flags(self) -> SoundFlags {
        match self {
            Self::Pcm8 => SoundFlags::PCM8,
            Self::Pcm16 => SoundFlags::PCM16,
        }
    }

    /// Bytes per sample
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Pcm8 => 1,
            Self::Pcm16 => 2,
        }
    }
}

/// Sample interpolation applied by the hardware mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterpolationType {
    /// Nearest sample
    None,
    /// Linear interpolation
    Linear,
    /// Polyphase filter
    Polyphase,
}

/// Arm command for a buffered clip
///
/// Mirrors the device call: channel, format|loop-mode, rate, channel count,
/// offset, data, loop-restart data and size (the length of `data`).
#[derive(Debug, Clone, Copy)]
pub struct PlaySound<'a> {
    /// Target hardware channel
    pub channel: ChannelId,
    /// Sample format bits combined with one loop-mode bit
    pub flags: SoundFlags,
    /// Playback rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count of `data`
    pub channel_count: u32,
    /// Byte offset into `data` where playback starts
    pub offset: usize,
    /// Sample data
    pub data: &'a [u8],
    /// Where playback restarts after each pass when `REPEAT` is set
    pub loop_data: &'a [u8],
}

impl PlaySound<'_> {
    /// Byte size of the armed data
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Whether the command requests looping playback
    pub fn is_looping(&self) -> bool {
        self.flags.contains(SoundFlags::REPEAT)
    }
}

/// Channel setup for queued (streaming) playback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelFormat {
    /// Playback rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count of queued buffers
    pub channel_count: u16,
    /// Mixer interpolation
    pub interpolation: InterpolationType,
    /// Mix vector
    pub mix: [f32; MIX_CHANNELS],
}

/// Audio hardware trait for device abstraction
///
/// # Threading
/// NOT Send + Sync: the subsystem runs on a single cooperative thread and
/// the channel table is only touched from there. A multi-threaded host needs
/// mutual exclusion around channel acquire/release and ring slot handoff.
pub trait AudioHardware {
    /// Whether audio is globally enabled on this device
    fn is_available(&self) -> bool;

    /// Arm a channel with a buffered clip and start it
    fn play_sound(&mut self, command: &PlaySound<'_>) -> Result<(), AudioError>;

    /// Check if a channel is currently producing sound
    fn is_playing(&self, channel: ChannelId) -> bool;

    /// Start or stop a channel
    fn set_play_state(&mut self, channel: ChannelId, playing: bool);

    /// Commit pending commands; nothing takes effect until this is called
    fn update_info(&mut self);

    /// Reset a channel for queued playback with the given format
    fn configure_channel(&mut self, channel: ChannelId, format: &ChannelFormat);

    /// Queue a wave buffer of 16-bit samples; `slot` identifies it for completion polling
    fn queue_wave_buffer(&mut self, channel: ChannelId, slot: usize, data: &[u8]) -> Result<(), AudioError>;

    /// Check if a queued wave buffer has been fully consumed
    ///
    /// A slot that was never queued, or was dropped by [`clear_channel`](Self::clear_channel),
    /// reports `true`.
    fn wave_buffer_done(&self, channel: ChannelId, slot: usize) -> bool;

    /// Stop a channel and drop every queued wave buffer
    fn clear_channel(&mut self, channel: ChannelId);
}

/// Create the default audio hardware for the platform
///
/// Opens the default rodio output device.
#[cfg(feature = "rodio")]
pub fn create_backend() -> Result<Box<dyn AudioHardware>, AudioError> {
    let backend = rodio_backend::RodioBackend::new()?;
    Ok(Box::new(backend))
}

/// Create the default audio hardware for the platform
///
/// Built without the `rodio` feature, so this is the headless simulated hardware.
#[cfg(not(feature = "rodio"))]
pub fn create_backend() -> Result<Box<dyn AudioHardware>, AudioError> {
    log::info!("Built without a device backend, using simulated audio hardware");
    Ok(Box::new(simulated::SimulatedHardware::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_flags() {
        assert_eq!(SampleFormat::Pcm16.flags(), SoundFlags::PCM16);
        assert!((SampleFormat::Pcm16.flags() | SoundFlags::REPEAT).contains(SoundFlags::REPEAT));
        assert_eq!(SampleFormat::Pcm16.bytes_per_sample(), 2);
    }
}
