//! Streaming sources
//!
//! A compressed stream is decoded a slot at a time into a small ring of
//! fixed-size buffers. Each slot cycles `Free -> Ready -> Queued -> Free`:
//! it is only handed to the hardware after a complete decode, and only
//! decoded into again once the hardware reports it consumed.

use crate::audio::backend::{AudioHardware, ChannelFormat};
use crate::audio::channel_allocator::{ChannelAllocator, ChannelId};
use crate::audio::config::AudioConfig;
use crate::audio::decoder::{StreamDecoder, VorbisDecoder};
use crate::audio::format::{open_source, AudioContainer};
use crate::audio::source::PlaybackState;
use crate::audio::AudioError;
use std::fmt;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Ownership state of one ring slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Owned by the decoder, contents stale
    Free,
    /// Fully decoded, waiting to be queued
    Ready,
    /// Owned by the hardware until it reports the slot done
    Queued,
}

#[derive(Debug)]
struct RingSlot {
    samples: Vec<i16>,
    /// Valid samples at the front of `samples`
    len: usize,
    state: SlotState,
}

/// Fixed ring of decode buffers
#[derive(Debug)]
struct DecodeRing {
    slots: Vec<RingSlot>,
    /// Next slot to decode into
    write_pos: usize,
    /// Next slot to hand to the hardware
    read_pos: usize,
}

impl DecodeRing {
    fn new(slot_count: usize, slot_samples: usize) -> Result<Self, AudioError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(slot_count)
            .map_err(|_| AudioError::OutOfMemory { requested: slot_count * slot_samples * 2 })?;

        for _ in 0..slot_count {
            let mut samples = Vec::new();
            samples
                .try_reserve_exact(slot_samples)
                .map_err(|_| AudioError::OutOfMemory { requested: slot_samples * 2 })?;
            samples.resize(slot_samples, 0);
            slots.push(RingSlot { samples, len: 0, state: SlotState::Free });
        }

        Ok(Self { slots, write_pos: 0, read_pos: 0 })
    }

    fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.len = 0;
            slot.state = SlotState::Free;
        }
        self.write_pos = 0;
        self.read_pos = 0;
    }

    fn count(&self, state: SlotState) -> usize {
        self.slots.iter().filter(|slot| slot.state == state).count()
    }

    fn advance(&self, pos: usize) -> usize {
        (pos + 1) % self.slots.len()
    }
}

/// A compressed stream decoded incrementally into a ring of buffers
pub struct StreamingSource {
    path: PathBuf,
    /// `None` once released
    decoder: Option<Box<dyn StreamDecoder>>,
    ring: DecodeRing,
    channel: Option<ChannelId>,
    format: ChannelFormat,
    total_frames: Option<u64>,
    looping: bool,
    /// End of stream reached with looping off; no more decode work is issued
    exhausted: bool,
    /// Decoder must seek to the start before the next decode
    rewind_pending: bool,
    state: PlaybackState,
}

impl StreamingSource {
    /// Open an Ogg Vorbis stream, reserve a channel and prime the decode ring
    ///
    /// # Errors
    /// - `NotFound` if the path does not exist
    /// - `UnsupportedFormat` if the extension or container is not Ogg
    /// - `ChannelExhausted` if no hardware channel is free
    /// - `DecodeError` if the stream headers or first blocks are corrupt
    ///
    /// Every failure after the channel is reserved returns it to the pool.
    pub fn open(path: impl AsRef<Path>, config: &AudioConfig, channels: &mut ChannelAllocator) -> Result<Self, AudioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AudioError::NotFound(path.to_path_buf()));
        }
        if AudioContainer::from_path(path)? != AudioContainer::Ogg {
            return Err(AudioError::UnsupportedFormat(format!("{} is not a streamed format", path.display())));
        }

        let file = open_source(path)?;
        let channel = channels.acquire()?;

        let opened = VorbisDecoder::new(BufReader::new(file))
            .and_then(|decoder| Self::with_decoder(path.to_path_buf(), Box::new(decoder), channel, config));

        match opened {
            Ok(source) => {
                log::info!(
                    "Opened stream {} ({} channel(s), {} Hz, {:?} frames) on {}",
                    path.display(),
                    source.format.channel_count,
                    source.format.sample_rate,
                    source.total_frames,
                    channel
                );
                Ok(source)
            }
            Err(e) => {
                log::warn!("Failed to open stream {}: {}; returning {}", path.display(), e, channel);
                channels.release(channel);
                Err(e)
            }
        }
    }

    /// Build a source around an already opened decoder and prime its ring
    ///
    /// The caller keeps responsibility for `channel` if this fails.
    pub fn with_decoder(
        path: PathBuf,
        decoder: Box<dyn StreamDecoder>,
        channel: ChannelId,
        config: &AudioConfig,
    ) -> Result<Self, AudioError> {
        let channel_count = decoder.channels();
        let sample_rate = decoder.sample_rate();
        if channel_count == 0 || sample_rate == 0 {
            return Err(AudioError::DecodeError(format!(
                "stream reports {channel_count} channel(s) at {sample_rate} Hz"
            )));
        }

        let mut source = Self {
            path,
            total_frames: decoder.total_frames(),
            decoder: Some(decoder),
            ring: DecodeRing::new(config.stream_ring_slots, config.stream_slot_samples())?,
            channel: Some(channel),
            format: ChannelFormat {
                sample_rate,
                channel_count,
                interpolation: config.interpolation,
                mix: config.mix,
            },
            looping: false,
            exhausted: false,
            rewind_pending: false,
            state: PlaybackState::Idle,
        };
        source.prime()?;
        Ok(source)
    }

    /// File the stream was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Assigned hardware channel
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    /// Interleaved channel count
    pub fn channels(&self) -> u16 {
        self.format.channel_count
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    /// Total frames in the stream, when known
    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    /// Controller state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Current loop flag
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Whether end of stream was reached with looping off
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of ring slots
    pub fn slot_count(&self) -> usize {
        self.ring.slots.len()
    }

    /// State of one ring slot
    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.ring.slots.get(slot).map(|s| s.state)
    }

    /// Slots holding audio the hardware has not finished with
    pub fn buffered_slots(&self) -> usize {
        self.ring.count(SlotState::Ready) + self.ring.count(SlotState::Queued)
    }

    pub(crate) fn set_looping(&mut self, looping: bool) {
        self.looping = looping;

        // Already hit the end, possibly while priming: carry on from the start
        if looping && self.exhausted {
            self.exhausted = false;
            self.rewind_pending = true;
        }
    }

    pub(crate) fn play(&mut self, hardware: &mut dyn AudioHardware) -> Result<(), AudioError> {
        let Some(channel) = self.channel else {
            return Err(AudioError::HardwareUnavailable("stream has no channel".to_string()));
        };
        if self.decoder.is_none() || self.format.sample_rate == 0 {
            return Err(AudioError::HardwareUnavailable("stream has no decoder".to_string()));
        }
        if !hardware.is_available() {
            return Err(AudioError::HardwareUnavailable("sound is disabled".to_string()));
        }

        if hardware.is_playing(channel) {
            return Ok(());
        }

        // Anything still marked queued was consumed or dropped by the hardware
        for slot in &mut self.ring.slots {
            if slot.state == SlotState::Queued {
                slot.state = SlotState::Free;
                slot.len = 0;
            }
        }

        // Played through to the end last time: start over
        if self.exhausted && self.ring.count(SlotState::Ready) == 0 {
            self.ring.reset();
            self.exhausted = false;
            self.rewind_pending = true;
        }

        self.prime()?;

        hardware.configure_channel(channel, &self.format);
        self.queue_ready(channel, hardware)?;
        hardware.set_play_state(channel, true);
        hardware.update_info();

        self.state = PlaybackState::Playing;
        Ok(())
    }

    pub(crate) fn stop(&mut self, hardware: &mut dyn AudioHardware) {
        if self.state == PlaybackState::Stopped {
            return;
        }
        let Some(channel) = self.channel else {
            return;
        };
        if self.decoder.is_none() || !hardware.is_available() {
            return;
        }

        hardware.clear_channel(channel);
        hardware.update_info();

        self.ring.reset();
        self.exhausted = false;
        self.rewind_pending = true;
        self.state = PlaybackState::Stopped;
    }

    pub(crate) fn release(&mut self, hardware: &mut dyn AudioHardware, channels: &mut ChannelAllocator) {
        if let Some(channel) = self.channel {
            if hardware.is_available() {
                hardware.clear_channel(channel);
                hardware.update_info();
            }
        }

        if self.decoder.take().is_some() {
            self.ring.slots.clear();
            log::info!("Closed stream {}", self.path.display());
        }
        if let Some(channel) = self.channel.take() {
            channels.release(channel);
        }
        self.state = PlaybackState::Stopped;
    }

    /// Per-tick servicing
    ///
    /// Reclaims slots the hardware finished, decodes at most one slot, queues
    /// it, and moves to `Stopped` once an exhausted stream has drained.
    pub(crate) fn service(&mut self, hardware: &mut dyn AudioHardware) -> Result<(), AudioError> {
        if self.state != PlaybackState::Playing {
            return Ok(());
        }
        let Some(channel) = self.channel else {
            return Ok(());
        };

        for (index, slot) in self.ring.slots.iter_mut().enumerate() {
            if slot.state == SlotState::Queued && hardware.wave_buffer_done(channel, index) {
                slot.state = SlotState::Free;
                slot.len = 0;
            }
        }

        if let Err(e) = self.fill_next_slot() {
            log::warn!("Decode failed for {}: {}; letting queued audio drain", self.path.display(), e);
            self.exhausted = true;
            return Err(e);
        }
        self.queue_ready(channel, hardware)?;

        if self.exhausted && self.buffered_slots() == 0 && !hardware.is_playing(channel) {
            log::debug!("Stream {} drained", self.path.display());
            self.state = PlaybackState::Stopped;
        }
        Ok(())
    }

    /// Decode into every free slot
    fn prime(&mut self) -> Result<(), AudioError> {
        while self.fill_next_slot()? {}
        Ok(())
    }

    /// Decode one block into the slot at the write position
    ///
    /// Returns whether a slot was filled.
    fn fill_next_slot(&mut self) -> Result<bool, AudioError> {
        if self.exhausted {
            return Ok(false);
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(false);
        };
        let pos = self.ring.write_pos;
        let slot = &mut self.ring.slots[pos];
        if slot.state != SlotState::Free {
            return Ok(false);
        }

        if self.rewind_pending {
            decoder.rewind()?;
            self.rewind_pending = false;
        }

        let (filled, ended) = decode_block(decoder.as_mut(), &mut slot.samples, self.looping)?;
        if ended {
            log::debug!("End of stream {}", self.path.display());
            self.exhausted = true;
        }
        if filled == 0 {
            return Ok(false);
        }

        slot.len = filled;
        slot.state = SlotState::Ready;
        self.ring.write_pos = self.ring.advance(pos);
        Ok(true)
    }

    /// Hand ready slots to the hardware in decode order
    fn queue_ready(&mut self, channel: ChannelId, hardware: &mut dyn AudioHardware) -> Result<(), AudioError> {
        loop {
            let pos = self.ring.read_pos;
            let slot = &mut self.ring.slots[pos];
            if slot.state != SlotState::Ready {
                return Ok(());
            }

            hardware.queue_wave_buffer(channel, pos, bytemuck::cast_slice(&slot.samples[..slot.len]))?;
            slot.state = SlotState::Queued;
            self.ring.read_pos = self.ring.advance(pos);
        }
    }
}

impl fmt::Debug for StreamingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingSource")
            .field("path", &self.path)
            .field("channel", &self.channel)
            .field("format", &self.format)
            .field("looping", &self.looping)
            .field("exhausted", &self.exhausted)
            .field("state", &self.state)
            .field("ring", &self.ring)
            .finish_non_exhaustive()
    }
}

/// Fill `out` from the decoder, wrapping to the start when looping
///
/// Returns the samples written and whether the stream ended without looping.
fn decode_block(decoder: &mut dyn StreamDecoder, out: &mut [i16], looping: bool) -> Result<(usize, bool), AudioError> {
    let mut filled = 0;
    let mut rewound_without_progress = false;

    while filled < out.len() {
        let read = decoder.read_samples(&mut out[filled..])?;
        if read > 0 {
            filled += read;
            rewound_without_progress = false;
            continue;
        }

        // An empty stream would otherwise rewind forever
        if !looping || rewound_without_progress {
            return Ok((filled, true));
        }
        log::debug!("Stream looped back to start");
        decoder.rewind()?;
        rewound_without_progress = true;
    }

    Ok((filled, false))
}
