//! Incremental decoders for streamed sources
//!
//! A [`StreamDecoder`] hands out interleaved 16-bit samples in caller-sized
//! blocks so the decode ring can fill one slot at a time.

use crate::audio::format::AudioContainer;
use crate::audio::AudioError;
use lewton::inside_ogg::OggStreamReader;
use std::io::{Read, Seek, SeekFrom};

/// Bytes from the end of the file searched for the final Ogg page
const TAIL_SCAN_BYTES: u64 = 64 * 1024;

/// Ogg page header: capture pattern, version, header type, then granule position
const OGG_GRANULE_OFFSET: usize = 6;

/// Source of interleaved 16-bit samples for a streaming source
pub trait StreamDecoder {
    /// Interleaved channel count
    fn channels(&self) -> u16;

    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Total frames in the stream, if the container records it
    fn total_frames(&self) -> Option<u64>;

    /// Fill `out` with the next samples; returns how many were written
    ///
    /// Returns `Ok(0)` only at end of stream.
    fn read_samples(&mut self, out: &mut [i16]) -> Result<usize, AudioError>;

    /// Seek back to the first sample
    fn rewind(&mut self) -> Result<(), AudioError>;
}

/// Ogg Vorbis decoder
pub struct VorbisDecoder<R: Read + Seek> {
    /// Only `None` after a rewind failed to reopen the stream
    reader: Option<OggStreamReader<R>>,
    channels: u16,
    sample_rate: u32,
    /// Samples decoded but not yet handed out
    pending: Vec<i16>,
    pending_pos: usize,
    total_frames: Option<u64>,
}

impl<R: Read + Seek> VorbisDecoder<R> {
    /// Validate the container and read the stream headers
    ///
    /// # Errors
    /// - `UnsupportedFormat` if the data does not start with an Ogg page
    /// - `DecodeError` if the Vorbis headers are missing or corrupt
    pub fn new(mut source: R) -> Result<Self, AudioError> {
        let mut magic = [0u8; 4];
        source.seek(SeekFrom::Start(0))?;
        let read = read_up_to(&mut source, &mut magic)?;
        if AudioContainer::detect(&magic[..read]) != Some(AudioContainer::Ogg) {
            return Err(AudioError::UnsupportedFormat("stream is not an Ogg container".to_string()));
        }

        let total_frames = last_granule_position(&mut source)?;
        source.seek(SeekFrom::Start(0))?;

        let reader = OggStreamReader::new(source)
            .map_err(|e| AudioError::DecodeError(format!("invalid Vorbis headers: {e}")))?;

        log::debug!(
            "Opened Vorbis stream: {} channel(s) at {} Hz, {:?} frames",
            reader.ident_hdr.audio_channels,
            reader.ident_hdr.audio_sample_rate,
            total_frames
        );

        Ok(Self {
            channels: u16::from(reader.ident_hdr.audio_channels),
            sample_rate: reader.ident_hdr.audio_sample_rate,
            reader: Some(reader),
            pending: Vec::new(),
            pending_pos: 0,
            total_frames,
        })
    }
}

impl<R: Read + Seek> StreamDecoder for VorbisDecoder<R> {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn read_samples(&mut self, out: &mut [i16]) -> Result<usize, AudioError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| AudioError::DecodeError("stream could not be reopened".to_string()))?;
        let mut written = 0;

        while written < out.len() {
            if self.pending_pos >= self.pending.len() {
                let packet = reader
                    .read_dec_packet_itl()
                    .map_err(|e| AudioError::DecodeError(e.to_string()))?;

                match packet {
                    Some(samples) => {
                        self.pending = samples;
                        self.pending_pos = 0;
                        continue;
                    }
                    None => break,
                }
            }

            let count = (out.len() - written).min(self.pending.len() - self.pending_pos);
            out[written..written + count]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + count]);
            written += count;
            self.pending_pos += count;
        }

        Ok(written)
    }

    /// Reopen the stream from byte 0; a granule seek to 0 lands on the header pages
    fn rewind(&mut self) -> Result<(), AudioError> {
        self.pending.clear();
        self.pending_pos = 0;

        let reader = self
            .reader
            .take()
            .ok_or_else(|| AudioError::DecodeError("stream could not be reopened".to_string()))?;
        let mut source = reader.into_inner().into_inner();
        source.seek(SeekFrom::Start(0))?;

        let reader = OggStreamReader::new(source)
            .map_err(|e| AudioError::DecodeError(format!("reopening stream failed: {e}")))?;
        self.reader = Some(reader);
        Ok(())
    }
}

fn read_up_to<R: Read>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Granule position of the last Ogg page, which for Vorbis is the total frame count
fn last_granule_position<R: Read + Seek>(source: &mut R) -> std::io::Result<Option<u64>> {
    let len = source.seek(SeekFrom::End(0))?;
    let start = len.saturating_sub(TAIL_SCAN_BYTES);
    source.seek(SeekFrom::Start(start))?;

    let mut tail = Vec::new();
    source.take(TAIL_SCAN_BYTES).read_to_end(&mut tail)?;

    Ok(granule_of_last_page(&tail))
}

fn granule_of_last_page(tail: &[u8]) -> Option<u64> {
    let page = tail.windows(4).rposition(|window| window == b"OggS")?;
    let granule = tail.get(page + OGG_GRANULE_OFFSET..page + OGG_GRANULE_OFFSET + 8)?;
    let value = u64::from_le_bytes(granule.try_into().ok()?);

    // All ones marks a page with no completed packet
    (value != u64::MAX).then_some(value)
}
