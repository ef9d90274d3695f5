//! # Handheld Audio
//!
//! Audio source manager for handheld devices with a small, fixed pool of
//! hardware playback channels.
//!
//! ## Features
//!
//! - **Buffered Sources**: short `.raw` and `.wav` clips loaded fully into memory
//! - **Streaming Sources**: Ogg Vorbis decoded incrementally into a ring of buffers
//! - **Channel Pool**: explicit acquire/release of scarce hardware channels
//! - **Tick Driven**: single-threaded servicing, poll-style hardware queries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use handheld_audio::prelude::*;
//!
//! fn main() -> Result<(), AudioError> {
//!     let mut audio = AudioSystem::new(AudioConfig::default(), create_backend()?)?;
//!
//!     let music = audio.new_source("sdmc:/game/music.ogg")?;
//!     audio.set_looping(music, true);
//!     audio.play(music)?;
//!
//!     // Once per frame
//!     audio.update();
//!
//!     audio.unload(music);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod audio;

/// Common imports for audio users
pub mod prelude {
    pub use crate::{
        audio::{
            AudioSystem, AudioError, SourceHandle, create_backend,
            config::AudioConfig,
            source::PlaybackState,
            backend::{AudioHardware, simulated::SimulatedHardware},
        },
        config::{Config, ConfigError},
    };
}
