//! Cross-module audio tests
//!
//! Scenarios that go through `AudioSystem` end to end, plus shared fixtures.

pub(crate) mod fixtures;
mod system_tests;
