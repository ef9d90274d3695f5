//! Hardware channel allocation
//!
//! Owns the fixed table of hardware playback channels shared by every source.
//! Pool slot `i` maps to hardware channel `base + i`; the channels below
//! `base` belong to the system and are never handed out.

use crate::audio::AudioError;
use std::fmt;

/// Hardware channel identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u32);

impl ChannelId {
    /// Wrap a raw hardware channel number
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw hardware channel number
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Fixed-size pool of hardware channels
#[derive(Debug, Clone)]
pub struct ChannelAllocator {
    /// First hardware channel ID in the pool
    base: u32,
    /// Reserved flag per pool slot
    reserved: Vec<bool>,
}

impl ChannelAllocator {
    /// Create an allocator for `count` channels starting at hardware ID `base`
    pub fn new(base: u32, count: usize) -> Self {
        Self {
            base,
            reserved: vec![false; count],
        }
    }

    /// Reserve the first free channel
    ///
    /// # Errors
    /// `ChannelExhausted` when every channel in the pool is reserved.
    pub fn acquire(&mut self) -> Result<ChannelId, AudioError> {
        let slot = self.reserved
            .iter()
            .position(|reserved| !reserved)
            .ok_or(AudioError::ChannelExhausted)?;

        self.reserved[slot] = true;
        let channel = self.channel_for_slot(slot);
        log::debug!("Acquired {} ({}/{} in use)", channel, self.reserved_count(), self.capacity());
        Ok(channel)
    }

    /// Return a channel to the pool
    ///
    /// Releasing a channel that is already free, or one outside the pool, is a no-op.
    pub fn release(&mut self, channel: ChannelId) {
        let Some(slot) = self.slot_for_channel(channel) else {
            log::warn!("Ignoring release of {} outside the channel pool", channel);
            return;
        };

        if self.reserved[slot] {
            self.reserved[slot] = false;
            log::debug!("Released {} ({}/{} in use)", channel, self.reserved_count(), self.capacity());
        }
    }

    /// Check if a channel is currently reserved
    pub fn is_reserved(&self, channel: ChannelId) -> bool {
        self.slot_for_channel(channel)
            .is_some_and(|slot| self.reserved[slot])
    }

    /// Number of reserved channels
    pub fn reserved_count(&self) -> usize {
        self.reserved.iter().filter(|reserved| **reserved).count()
    }

    /// Number of free channels
    pub fn available(&self) -> usize {
        self.capacity() - self.reserved_count()
    }

    /// Total channels in the pool
    pub fn capacity(&self) -> usize {
        self.reserved.len()
    }

    // Slot count comes from a config value far below u32::MAX
    #[allow(clippy::cast_possible_truncation)]
    fn channel_for_slot(&self, slot: usize) -> ChannelId {
        ChannelId(self.base + slot as u32)
    }

    fn slot_for_channel(&self, channel: ChannelId) -> Option<usize> {
        let slot = channel.0.checked_sub(self.base)? as usize;
        (slot < self.reserved.len()).then_some(slot)
    }
}
