//! Foundation module - Core utilities shared by the audio subsystem
//!
//! - Logging setup

pub mod logging;
