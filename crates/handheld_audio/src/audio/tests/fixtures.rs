//! Test fixtures: scripted decoders, clip files and encoded Ogg streams

use crate::audio::decoder::StreamDecoder;
use crate::audio::AudioError;
use std::cell::Cell;
use std::num::{NonZeroU32, NonZeroU8};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use vorbis_rs::VorbisEncoderBuilder;

/// Decoder producing a ramp `0, 1, 2, ...` of `total` interleaved stereo samples
pub(crate) struct ScriptedDecoder {
    total: usize,
    position: usize,
    rewinds: usize,
    fail_at: Option<usize>,
    reads: Rc<Cell<usize>>,
}

impl ScriptedDecoder {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            position: 0,
            rewinds: 0,
            fail_at: None,
            reads: Rc::new(Cell::new(0)),
        }
    }

    /// Report a corrupt stream once `samples` have been produced
    pub(crate) fn fail_after(mut self, samples: usize) -> Self {
        self.fail_at = Some(samples);
        self
    }

    pub(crate) fn rewinds(&self) -> usize {
        self.rewinds
    }

    /// Shared count of `read_samples` calls, still readable once the decoder is boxed away
    pub(crate) fn read_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.reads)
    }
}

impl StreamDecoder for ScriptedDecoder {
    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        44_100
    }

    fn total_frames(&self) -> Option<u64> {
        Some((self.total / 2) as u64)
    }

    fn read_samples(&mut self, out: &mut [i16]) -> Result<usize, AudioError> {
        self.reads.set(self.reads.get() + 1);
        let mut end = self.total;
        if let Some(fail_at) = self.fail_at {
            if self.position >= fail_at {
                return Err(AudioError::DecodeError("scripted corruption".to_string()));
            }
            end = end.min(fail_at);
        }

        let count = out.len().min(end - self.position.min(end));
        for (offset, sample) in out[..count].iter_mut().enumerate() {
            *sample = (self.position + offset) as i16;
        }
        self.position += count;
        Ok(count)
    }

    fn rewind(&mut self) -> Result<(), AudioError> {
        self.position = 0;
        self.rewinds += 1;
        Ok(())
    }
}

/// Write `bytes` to `dir/name`
pub(crate) fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Raw 16-bit PCM clip bytes of `samples` samples
pub(crate) fn raw_clip(samples: usize) -> Vec<u8> {
    (0..samples).flat_map(|i| (i as i16).to_le_bytes()).collect()
}

/// Ogg Vorbis bytes of a stereo 44.1 kHz tone lasting `frames` frames
pub(crate) fn encode_ogg(frames: usize) -> Vec<u8> {
    let left: Vec<f32> = (0..frames).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
    let right: Vec<f32> = (0..frames).map(|i| (i as f32 * 0.03).cos() * 0.5).collect();

    let mut bytes = Vec::new();
    {
        let mut encoder = VorbisEncoderBuilder::new(
            NonZeroU32::new(44_100).unwrap(),
            NonZeroU8::new(2).unwrap(),
            &mut bytes,
        )
        .unwrap()
        .build()
        .unwrap();
        for start in (0..frames).step_by(4_096) {
            let end = (start + 4_096).min(frames);
            encoder.encode_audio_block([&left[start..end], &right[start..end]]).unwrap();
        }
        encoder.finish().unwrap();
    }
    bytes
}
