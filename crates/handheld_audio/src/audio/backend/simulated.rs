//! Simulated audio hardware
//!
//! Headless, deterministic stand-in for the device. Records every command
//! and only "plays" what the caller lets it: one-shot clips run until
//! [`SimulatedHardware::drain`] and queued wave buffers are consumed one at a
//! time with [`SimulatedHardware::consume_wave_buffer`]. Useful for tests and
//! for running on machines without an audio device.

use super::{AudioHardware, ChannelFormat, PlaySound, SoundFlags};
use crate::audio::channel_allocator::ChannelId;
use crate::audio::AudioError;
use std::collections::{HashMap, VecDeque};

/// A command received by the simulated hardware
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareCommand {
    /// Buffered clip armed
    PlaySound {
        /// Target channel
        channel: ChannelId,
        /// Format and loop-mode bits
        flags: SoundFlags,
        /// Rate in Hz
        sample_rate: u32,
        /// Bytes armed
        size: usize,
    },
    /// Play state changed
    SetPlayState {
        /// Target channel
        channel: ChannelId,
        /// New state
        playing: bool,
    },
    /// Channel reset for queued playback
    ConfigureChannel {
        /// Target channel
        channel: ChannelId,
        /// Requested format
        format: ChannelFormat,
    },
    /// Wave buffer queued
    QueueWaveBuffer {
        /// Target channel
        channel: ChannelId,
        /// Ring slot index
        slot: usize,
        /// Bytes queued
        size: usize,
    },
    /// Channel stopped and its queue dropped
    ClearChannel {
        /// Target channel
        channel: ChannelId,
    },
}

/// Last clip armed on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedSound {
    /// Format and loop-mode bits
    pub flags: SoundFlags,
    /// Rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channel_count: u32,
    /// Bytes armed
    pub size: usize,
}

#[derive(Debug, Clone)]
struct QueuedBuffer {
    slot: usize,
    samples: Vec<i16>,
}

#[derive(Debug, Default)]
struct SimChannel {
    playing: bool,
    /// Armed clip still has audio left
    sound_pending: bool,
    armed: Option<ArmedSound>,
    arm_count: usize,
    format: Option<ChannelFormat>,
    queue: VecDeque<QueuedBuffer>,
}

/// Headless audio hardware
#[derive(Debug)]
pub struct SimulatedHardware {
    available: bool,
    channels: HashMap<ChannelId, SimChannel>,
    commands: Vec<HardwareCommand>,
    info_updates: usize,
}

impl SimulatedHardware {
    /// Create simulated hardware with sound enabled
    pub fn new() -> Self {
        Self {
            available: true,
            channels: HashMap::new(),
            commands: Vec::new(),
            info_updates: 0,
        }
    }

    /// Enable or disable sound globally
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Every command received, oldest first
    pub fn commands(&self) -> &[HardwareCommand] {
        &self.commands
    }

    /// Number of info commits
    pub fn info_update_count(&self) -> usize {
        self.info_updates
    }

    /// Number of times a clip was armed on `channel`
    pub fn arm_count(&self, channel: ChannelId) -> usize {
        self.channels.get(&channel).map_or(0, |c| c.arm_count)
    }

    /// Last clip armed on `channel`
    pub fn armed(&self, channel: ChannelId) -> Option<&ArmedSound> {
        self.channels.get(&channel)?.armed.as_ref()
    }

    /// Format of the last queued-playback setup on `channel`
    pub fn channel_format(&self, channel: ChannelId) -> Option<&ChannelFormat> {
        self.channels.get(&channel)?.format.as_ref()
    }

    /// Ring slots waiting on `channel`, in play order
    pub fn queued_slots(&self, channel: ChannelId) -> Vec<usize> {
        self.channels
            .get(&channel)
            .map(|c| c.queue.iter().map(|b| b.slot).collect())
            .unwrap_or_default()
    }

    /// Samples of the wave buffer queued for `slot`
    pub fn queued_samples(&self, channel: ChannelId, slot: usize) -> Option<&[i16]> {
        self.channels
            .get(&channel)?
            .queue
            .iter()
            .find(|b| b.slot == slot)
            .map(|b| b.samples.as_slice())
    }

    /// Finish the wave buffer at the head of `channel`'s queue
    ///
    /// Returns the slot consumed.
    pub fn consume_wave_buffer(&mut self, channel: ChannelId) -> Option<usize> {
        self.channels.get_mut(&channel)?.queue.pop_front().map(|b| b.slot)
    }

    /// Play out everything on `channel`
    ///
    /// One-shot clips finish and queued buffers are consumed; a looping clip
    /// keeps playing.
    pub fn drain(&mut self, channel: ChannelId) {
        if let Some(c) = self.channels.get_mut(&channel) {
            let looping = c.armed.as_ref().is_some_and(|a| a.flags.contains(SoundFlags::REPEAT));
            if !looping {
                c.sound_pending = false;
            }
            c.queue.clear();
        }
    }

    fn channel_mut(&mut self, channel: ChannelId) -> &mut SimChannel {
        self.channels.entry(channel).or_default()
    }
}

impl AudioHardware for SimulatedHardware {
    fn is_available(&self) -> bool {
        self.available
    }

    fn play_sound(&mut self, command: &PlaySound<'_>) -> Result<(), AudioError> {
        if !self.available {
            return Err(AudioError::HardwareUnavailable("sound is disabled".to_string()));
        }

        self.commands.push(HardwareCommand::PlaySound {
            channel: command.channel,
            flags: command.flags,
            sample_rate: command.sample_rate,
            size: command.size(),
        });

        let c = self.channel_mut(command.channel);
        c.queue.clear();
        c.armed = Some(ArmedSound {
            flags: command.flags,
            sample_rate: command.sample_rate,
            channel_count: command.channel_count,
            size: command.size(),
        });
        c.arm_count += 1;
        c.sound_pending = true;
        c.playing = true;
        Ok(())
    }

    fn is_playing(&self, channel: ChannelId) -> bool {
        self.channels
            .get(&channel)
            .is_some_and(|c| c.playing && (c.sound_pending || !c.queue.is_empty()))
    }

    fn set_play_state(&mut self, channel: ChannelId, playing: bool) {
        self.commands.push(HardwareCommand::SetPlayState { channel, playing });

        let c = self.channel_mut(channel);
        c.playing = playing;
        if !playing {
            c.sound_pending = false;
        }
    }

    fn update_info(&mut self) {
        self.info_updates += 1;
    }

    fn configure_channel(&mut self, channel: ChannelId, format: &ChannelFormat) {
        self.commands.push(HardwareCommand::ConfigureChannel { channel, format: *format });

        let c = self.channel_mut(channel);
        c.queue.clear();
        c.sound_pending = false;
        c.playing = false;
        c.format = Some(*format);
    }

    fn queue_wave_buffer(&mut self, channel: ChannelId, slot: usize, data: &[u8]) -> Result<(), AudioError> {
        self.commands.push(HardwareCommand::QueueWaveBuffer { channel, slot, size: data.len() });

        let samples = data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        self.channel_mut(channel).queue.push_back(QueuedBuffer { slot, samples });
        Ok(())
    }

    fn wave_buffer_done(&self, channel: ChannelId, slot: usize) -> bool {
        self.channels
            .get(&channel)
            .map_or(true, |c| c.queue.iter().all(|b| b.slot != slot))
    }

    fn clear_channel(&mut self, channel: ChannelId) {
        self.commands.push(HardwareCommand::ClearChannel { channel });

        let c = self.channel_mut(channel);
        c.queue.clear();
        c.sound_pending = false;
        c.playing = false;
    }
}

impl Default for SimulatedHardware {
    fn default() -> Self {
        Self::new()
    }
}
