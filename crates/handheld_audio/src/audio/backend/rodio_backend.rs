//! Rodio audio backend
//!
//! Drives each hardware channel with its own rodio [`Sink`]. Buffered clips
//! become a [`SamplesBuffer`] (repeated forever when looping) and streamed
//! wave buffers are appended to the channel's sink in queue order, so
//! completion is read back from the sink's queue length.

use super::{AudioHardware, ChannelFormat, PlaySound, SoundFlags};
use crate::audio::channel_allocator::ChannelId;
use crate::audio::AudioError;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::{HashMap, VecDeque};

/// Per-channel playback state
#[derive(Default)]
struct RodioChannel {
    sink: Option<Sink>,
    format: Option<ChannelFormat>,
    /// Slots appended to the sink, oldest first
    queued: VecDeque<usize>,
}

impl RodioChannel {
    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.queued.clear();
    }

    /// Entries of `queued` the sink has already finished
    fn finished_count(&self) -> usize {
        let pending = self.sink.as_ref().map_or(0, Sink::len);
        self.queued.len().saturating_sub(pending)
    }
}

/// Rodio-based audio hardware
pub struct RodioBackend {
    /// Audio output stream (must be kept alive)
    _output_stream: OutputStream,
    /// Output stream handle for creating sinks
    stream_handle: OutputStreamHandle,
    channels: HashMap<ChannelId, RodioChannel>,
}

impl RodioBackend {
    /// Open the default output device
    ///
    /// # Errors
    /// `BackendInitFailed` if no output device can be opened.
    pub fn new() -> Result<Self, AudioError> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| AudioError::BackendInitFailed(format!("Failed to create audio output: {}", e)))?;

        log::info!("Rodio audio backend initialized");
        Ok(Self {
            _output_stream: stream,
            stream_handle,
            channels: HashMap::new(),
        })
    }

    fn new_sink(&self) -> Result<Sink, AudioError> {
        Sink::try_new(&self.stream_handle)
            .map_err(|e| AudioError::PlaybackFailed(format!("Failed to create sink: {}", e)))
    }
}

impl AudioHardware for RodioBackend {
    fn is_available(&self) -> bool {
        true
    }

    fn play_sound(&mut self, command: &PlaySound<'_>) -> Result<(), AudioError> {
        let channels = u16::try_from(command.channel_count)
            .map_err(|_| AudioError::PlaybackFailed(format!("{} channels", command.channel_count)))?;
        let data = command
            .data
            .get(command.offset..)
            .ok_or_else(|| AudioError::PlaybackFailed("offset past end of clip".to_string()))?;

        let decode = |bytes: &[u8]| {
            if command.flags.contains(SoundFlags::PCM8) {
                pcm8_samples(bytes)
            } else {
                pcm16_samples(bytes)
            }
        };

        let sink = self.new_sink()?;
        sink.append(SamplesBuffer::new(channels, command.sample_rate, decode(data)));
        if command.is_looping() {
            sink.append(SamplesBuffer::new(channels, command.sample_rate, decode(command.loop_data)).repeat_infinite());
        }

        let channel = self.channels.entry(command.channel).or_default();
        channel.stop();
        channel.sink = Some(sink);
        Ok(())
    }

    fn is_playing(&self, channel: ChannelId) -> bool {
        self.channels
            .get(&channel)
            .and_then(|c| c.sink.as_ref())
            .is_some_and(|sink| !sink.is_paused() && !sink.empty())
    }

    fn set_play_state(&mut self, channel: ChannelId, playing: bool) {
        let Some(c) = self.channels.get_mut(&channel) else {
            return;
        };
        if playing {
            if let Some(sink) = &c.sink {
                sink.play();
            }
        } else {
            c.stop();
        }
    }

    fn update_info(&mut self) {
        // Sinks apply commands as they are issued
    }

    fn configure_channel(&mut self, channel: ChannelId, format: &ChannelFormat) {
        let sink = match self.new_sink() {
            Ok(sink) => Some(sink),
            Err(e) => {
                log::error!("Could not configure {}: {}", channel, e);
                None
            }
        };
        if let Some(sink) = &sink {
            sink.pause();
            sink.set_volume(format.mix[0].max(format.mix[1]));
        }

        let c = self.channels.entry(channel).or_default();
        c.stop();
        c.sink = sink;
        c.format = Some(*format);
    }

    fn queue_wave_buffer(&mut self, channel: ChannelId, slot: usize, data: &[u8]) -> Result<(), AudioError> {
        let c = self
            .channels
            .get_mut(&channel)
            .ok_or_else(|| AudioError::PlaybackFailed(format!("{} is not configured", channel)))?;
        let (Some(sink), Some(format)) = (c.sink.as_ref(), c.format) else {
            return Err(AudioError::PlaybackFailed(format!("{} is not configured", channel)));
        };

        sink.append(SamplesBuffer::new(format.channel_count, format.sample_rate, pcm16_samples(data)));

        let finished = c.finished_count();
        c.queued.drain(..finished);
        c.queued.push_back(slot);
        Ok(())
    }

    fn wave_buffer_done(&self, channel: ChannelId, slot: usize) -> bool {
        let Some(c) = self.channels.get(&channel) else {
            return true;
        };
        // Slot indices repeat around the ring; only the latest entry matters
        c.queued
            .iter()
            .rposition(|&queued| queued == slot)
            .map_or(true, |index| index < c.finished_count())
    }

    fn clear_channel(&mut self, channel: ChannelId) {
        if let Some(c) = self.channels.get_mut(&channel) {
            c.stop();
        }
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        for channel in self.channels.values_mut() {
            channel.stop();
        }
        log::info!("Rodio audio backend shutdown");
    }
}

/// Decode 16-bit little-endian PCM; a trailing odd byte is ignored
pub fn pcm16_samples(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Widen 8-bit signed PCM to 16 bits
pub fn pcm8_samples(data: &[u8]) -> Vec<i16> {
    data.iter().map(|&byte| i16::from(i8::from_le_bytes([byte])) << 8).collect()
}
