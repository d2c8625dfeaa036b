//! Speech backends.
//!
//! This module contains implementations of [`SpeechBackend`](crate::SpeechBackend).
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `espeak` - espeak-ng command line synthesizer (espeak-ng required)

#[cfg(feature = "espeak")]
pub mod espeak;
