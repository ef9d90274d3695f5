//! Buffered sources
//!
//! Short clips read completely into memory: headerless `.raw` PCM and `.wav`
//! files with a fixed-size header. The WAV path is deliberately not a RIFF
//! parser; the header is assumed to be exactly `wav_header_len` bytes.

use crate::audio::backend::SampleFormat;
use crate::audio::channel_allocator::{ChannelAllocator, ChannelId};
use crate::audio::config::AudioConfig;
use crate::audio::format::{open_source, AudioContainer};
use crate::audio::source::PlaybackState;
use crate::audio::AudioError;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Decoded clip contents before a channel is attached
#[derive(Debug)]
pub(crate) struct ClipData {
    pub samples: Vec<u8>,
    pub format: SampleFormat,
    pub sample_rate: u32,
}

/// A clip held entirely in memory
#[derive(Debug)]
pub struct BufferedSource {
    path: PathBuf,
    /// Sample data; `None` once released
    pub(crate) buffer: Option<Vec<u8>>,
    pub(crate) format: Option<SampleFormat>,
    pub(crate) sample_rate: u32,
    pub(crate) looping: bool,
    pub(crate) channel: Option<ChannelId>,
    /// Whether the hardware has ever been armed with this clip
    pub(crate) armed: bool,
    pub(crate) state: PlaybackState,
}

impl BufferedSource {
    /// Load a `.raw` or `.wav` clip and reserve a hardware channel for it
    ///
    /// # Errors
    /// - `NotFound` if the path does not exist
    /// - `UnsupportedFormat` for any extension other than `raw`/`wav`
    /// - `DecodeError` if a WAV file is shorter than its header
    /// - `OutOfMemory` if the sample buffer cannot be allocated
    /// - `ChannelExhausted` if no hardware channel is free; the clip is dropped
    pub fn load(path: impl AsRef<Path>, config: &AudioConfig, channels: &mut ChannelAllocator) -> Result<Self, AudioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AudioError::NotFound(path.to_path_buf()));
        }

        let container = AudioContainer::from_path(path)?;
        let clip = read_clip(path, container, config)?;

        let channel = channels.acquire().map_err(|e| {
            log::warn!("No free channel for {}, dropping {} byte clip", path.display(), clip.samples.len());
            e
        })?;

        log::info!(
            "Loaded {} ({} bytes, {:?}, {} Hz) on {}",
            path.display(),
            clip.samples.len(),
            clip.format,
            clip.sample_rate,
            channel
        );

        Ok(Self::from_parts(path.to_path_buf(), clip, Some(channel)))
    }

    pub(crate) fn from_parts(path: PathBuf, clip: ClipData, channel: Option<ChannelId>) -> Self {
        Self {
            path,
            buffer: Some(clip.samples),
            format: Some(clip.format),
            sample_rate: clip.sample_rate,
            looping: false,
            channel,
            armed: false,
            state: PlaybackState::Idle,
        }
    }

    /// File the clip was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sample data, if still owned
    pub fn buffer(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    /// Size of the sample data in bytes (0 once released)
    pub fn size(&self) -> usize {
        self.buffer.as_ref().map_or(0, Vec::len)
    }

    /// Sample format
    pub fn format(&self) -> Option<SampleFormat> {
        self.format
    }

    /// Playback rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Assigned hardware channel
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    /// Whether the hardware has ever been armed with this clip
    pub fn has_been_armed(&self) -> bool {
        self.armed
    }
}

/// Read a clip's samples and format from disk
pub(crate) fn read_clip(path: &Path, container: AudioContainer, config: &AudioConfig) -> Result<ClipData, AudioError> {
    let mut file = open_source(path)?;
    let file_len = file_len(&file)?;

    match container {
        AudioContainer::Raw => {
            let samples = read_exact_alloc(&mut file, file_len)?;
            Ok(ClipData {
                samples,
                format: SampleFormat::Pcm16,
                sample_rate: config.raw_sample_rate,
            })
        }
        AudioContainer::Wav => {
            if file_len < config.wav_header_len {
                return Err(AudioError::DecodeError(format!(
                    "{} is {} bytes, shorter than the {}-byte WAV header",
                    path.display(),
                    file_len,
                    config.wav_header_len
                )));
            }

            let header = read_exact_alloc(&mut file, config.wav_header_len)?;
            let sample_rate = wav_sample_rate(&header, config)?;
            let samples = read_exact_alloc(&mut file, file_len - config.wav_header_len)?;

            Ok(ClipData {
                samples,
                format: SampleFormat::Pcm16,
                sample_rate,
            })
        }
        AudioContainer::Ogg => Err(AudioError::UnsupportedFormat(format!(
            "{} is a streamed format and cannot be buffered",
            path.display()
        ))),
    }
}

/// Header sample rate with the historical correction factor applied
fn wav_sample_rate(header: &[u8], config: &AudioConfig) -> Result<u32, AudioError> {
    let offset = config.wav_sample_rate_offset;
    let bytes = header
        .get(offset..offset + 4)
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .ok_or_else(|| AudioError::DecodeError("WAV header too short for sample rate".to_string()))?;

    u32::from_le_bytes(bytes)
        .checked_mul(config.wav_sample_rate_multiplier)
        .ok_or_else(|| AudioError::DecodeError("WAV sample rate out of range".to_string()))
}

fn file_len(file: &File) -> Result<usize, AudioError> {
    let len = file.metadata()?.len();
    usize::try_from(len).map_err(|_| AudioError::OutOfMemory { requested: usize::MAX })
}

/// Allocate exactly `len` bytes and fill them from `reader`
fn read_exact_alloc<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, AudioError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| AudioError::OutOfMemory { requested: len })?;

    reader.take(len as u64).read_to_end(&mut buffer)?;
    if buffer.len() != len {
        return Err(AudioError::DecodeError(format!(
            "file truncated while reading: expected {} bytes, got {}",
            len,
            buffer.len()
        )));
    }
    Ok(buffer)
}
