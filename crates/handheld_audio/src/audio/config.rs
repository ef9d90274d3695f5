//! Audio subsystem configuration
//!
//! Channel pool geometry, clip format constants and stream ring sizing.
//! Loadable from `.toml` or `.ron` through [`Config`].

use crate::audio::backend::InterpolationType;
use crate::config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

/// Number of entries in a hardware mix vector
pub const MIX_CHANNELS: usize = 12;

/// Audio subsystem configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Hardware channel ID of pool slot 0 (lower IDs are system-owned)
    pub channel_base: u32,
    /// Number of hardware channels in the pool
    pub channel_count: usize,
    /// Sample rate assumed for headerless `.raw` clips
    pub raw_sample_rate: u32,
    /// Bytes of WAV header skipped before sample data
    pub wav_header_len: usize,
    /// Byte offset of the little-endian sample rate in the WAV header
    pub wav_sample_rate_offset: usize,
    /// Factor applied to the WAV header sample rate
    ///
    /// Historical correction for how the target hardware reports rates.
    /// Needs revalidation on real hardware before it is changed.
    pub wav_sample_rate_multiplier: u32,
    /// Number of slots in each streaming decode ring
    pub stream_ring_slots: usize,
    /// Size of one decode ring slot in bytes
    pub stream_buffer_bytes: usize,
    /// Per-channel mix vector handed to the hardware
    pub mix: [f32; MIX_CHANNELS],
    /// Sample interpolation handed to the hardware
    pub interpolation: InterpolationType,
}

impl AudioConfig {
    /// Check values that would make the subsystem unusable
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field: an empty
    /// channel pool or one whose IDs run past `u32::MAX`, an empty ring, a
    /// ring slot that is not a whole number of 4-byte frames, a zero raw rate,
    /// or a WAV rate offset outside the header.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_count == 0 {
            return Err(ConfigError::Invalid("channel_count must be at least 1".to_string()));
        }
        let last_channel = u32::try_from(self.channel_count)
            .ok()
            .and_then(|count| self.channel_base.checked_add(count));
        if last_channel.is_none() {
            return Err(ConfigError::Invalid(format!(
                "{} channels from base {} overflow the channel ID range",
                self.channel_count, self.channel_base
            )));
        }
        if self.stream_ring_slots == 0 {
            return Err(ConfigError::Invalid("stream_ring_slots must be at least 1".to_string()));
        }
        if self.stream_buffer_bytes == 0 || self.stream_buffer_bytes % 4 != 0 {
            return Err(ConfigError::Invalid(format!(
                "stream_buffer_bytes must be a non-zero multiple of 4, got {}",
                self.stream_buffer_bytes
            )));
        }
        if self.raw_sample_rate == 0 {
            return Err(ConfigError::Invalid("raw_sample_rate must be non-zero".to_string()));
        }
        if self.wav_sample_rate_offset + 4 > self.wav_header_len {
            return Err(ConfigError::Invalid(format!(
                "wav_sample_rate_offset {} does not fit inside a {}-byte header",
                self.wav_sample_rate_offset, self.wav_header_len
            )));
        }
        Ok(())
    }

    /// Number of `i16` samples that fit in one ring slot
    pub fn stream_slot_samples(&self) -> usize {
        self.stream_buffer_bytes / std::mem::size_of::<i16>()
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        let mut mix = [0.0; MIX_CHANNELS];
        mix[0] = 1.0;
        mix[1] = 1.0;

        Self {
            channel_base: 8,
            channel_count: 32,
            raw_sample_rate: 44_100,
            wav_header_len: 44,
            wav_sample_rate_offset: 24,
            wav_sample_rate_multiplier: 2,
            stream_ring_slots: 4,
            // 1/30th of a second at 44100 Hz, 4 bytes per frame
            stream_buffer_bytes: (44_100 / 30) * 4,
            mix,
            interpolation: InterpolationType::Linear,
        }
    }
}

impl Config for AudioConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_values() {
        let config = AudioConfig::default();
        assert_eq!(config.channel_base, 8);
        assert_eq!(config.channel_count, 32);
        assert_eq!(config.stream_buffer_bytes, 5880);
        assert_eq!(config.stream_slot_samples(), 2940);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AudioConfig::default();
        config.channel_count = 0;
        assert!(config.validate().is_err());

        let mut config = AudioConfig::default();
        config.stream_buffer_bytes = 5882;
        assert!(config.validate().is_err());

        let mut config = AudioConfig::default();
        config.wav_sample_rate_offset = 42;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_channel_id_overflow() {
        let mut config = AudioConfig::default();
        config.channel_base = u32::MAX - 4;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.channel_count = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.toml");

        let mut config = AudioConfig::default();
        config.channel_count = 24;
        config.mix[2] = 0.25;
        config.interpolation = InterpolationType::Polyphase;
        config.save_to_file(&path).unwrap();

        let loaded = AudioConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.channel_count, 24);
        assert_eq!(loaded.interpolation, InterpolationType::Polyphase);
        assert_relative_eq!(loaded.mix[2], 0.25);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.ron");
        std::fs::write(&path, "(stream_ring_slots: 3)").unwrap();

        let loaded = AudioConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.stream_ring_slots, 3);
        assert_eq!(loaded.channel_base, 8);
    }

    #[test]
    fn test_unknown_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.ini");
        std::fs::write(&path, "").unwrap();

        assert!(matches!(AudioConfig::load_from_file(&path), Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AudioConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, AudioConfig::default());
    }
}
