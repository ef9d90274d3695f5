//! Source registry
//!
//! Every live source keyed by a generational handle, serviced once per tick.

use crate::audio::backend::AudioHardware;
use crate::audio::source::Source;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle to a loaded source
    ///
    /// Stays invalid after the source is unloaded, even if its slot is reused.
    pub struct SourceHandle;
}

/// All live sources
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: SlotMap<SourceHandle, Source>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new source
    pub fn insert(&mut self, source: Source) -> SourceHandle {
        self.sources.insert(source)
    }

    /// Look up a source
    pub fn get(&self, handle: SourceHandle) -> Option<&Source> {
        self.sources.get(handle)
    }

    /// Look up a source mutably
    pub fn get_mut(&mut self, handle: SourceHandle) -> Option<&mut Source> {
        self.sources.get_mut(handle)
    }

    /// Stop tracking a source; the caller releases it
    pub fn remove(&mut self, handle: SourceHandle) -> Option<Source> {
        self.sources.remove(handle)
    }

    /// Remove every source; the caller releases them
    pub fn drain(&mut self) -> impl Iterator<Item = (SourceHandle, Source)> + '_ {
        self.sources.drain()
    }

    /// Number of live sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if no sources are live
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Number of live streaming sources
    pub fn streaming_count(&self) -> usize {
        self.sources.values().filter(|source| source.is_streaming()).count()
    }

    /// Service every source once
    ///
    /// A failing source is logged and skipped; the others are still serviced.
    /// Returns the number of sources that failed.
    pub fn service(&mut self, hardware: &mut dyn AudioHardware) -> usize {
        let mut failures = 0;
        for (handle, source) in &mut self.sources {
            if let Err(e) = source.service(hardware) {
                log::warn!("Servicing source {:?} failed: {}", handle, e);
                failures += 1;
            }
        }
        failures
    }
}
