//! Test Fixtures Module
//!
//! - Audio fixtures (programmatically generated)
//! - Call-leg message fixtures

// Allow dead code in test fixtures - not every test binary uses every fixture
#![allow(dead_code)]

pub mod audio_fixtures;

pub use audio_fixtures::*;
