//! Audio container sniffing
//!
//! Picks the loader for a file from its extension, with magic-byte checks
//! for containers that carry one.

use crate::audio::AudioError;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

/// Containers understood by the loaders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    /// Headerless 16-bit PCM
    Raw,
    /// PCM behind a fixed 44-byte header
    Wav,
    /// Ogg Vorbis, streamed
    Ogg,
}

impl AudioContainer {
    /// Determine the container from a file extension (case-insensitive)
    ///
    /// # Errors
    /// `UnsupportedFormat` for a missing or unknown extension.
    pub fn from_path(path: &Path) -> Result<Self, AudioError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| AudioError::UnsupportedFormat(format!("{} has no file extension", path.display())))?;

        match ext.to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "wav" => Ok(Self::Wav),
            "ogg" => Ok(Self::Ogg),
            other => Err(AudioError::UnsupportedFormat(format!("unknown audio type '.{other}'"))),
        }
    }

    /// Whether sources of this container are decoded incrementally
    pub fn is_streamed(self) -> bool {
        matches!(self, Self::Ogg)
    }

    /// Detect a container from its leading magic bytes
    ///
    /// Raw PCM has no signature, so it is never detected here.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match bytes.get(0..4)? {
            b"RIFF" => Some(Self::Wav),
            b"OggS" => Some(Self::Ogg),
            _ => None,
        }
    }
}

/// Open a source file for reading
///
/// A file that vanished after its existence check still reports `NotFound`.
pub(crate) fn open_source(path: &Path) -> Result<File, AudioError> {
    File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => AudioError::NotFound(path.to_path_buf()),
        _ => AudioError::Io(e),
    })
}
