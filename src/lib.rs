//! # voiceover-rs
//!
//! Narration timing for programmatic animation: speak a block of text while
//! an animation plays, and let the library work out how long to wait.
//!
//! ## Features
//!
//! - **Cached synthesis**: each distinct (text, backend configuration) pair is
//!   synthesized at most once and persisted on disk
//! - **Bookmarks**: `<bookmark mark='NAME'/>` tags inside the narration are
//!   mapped to absolute render times through word boundary interpolation
//! - **Pluggable backends**: any type implementing [`SpeechBackend`]; enable
//!   bundled engines via Cargo features
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! voiceover-rs = { version = "2026.10", features = ["espeak"] }
//! ```
//!
//! ```ignore
//! use voiceover_rs::engines::espeak::EspeakBackend;
//! use voiceover_rs::scene::{SimulatedRenderer, VoiceoverScene};
//! use voiceover_rs::service::{ServiceConfig, SpeechService};
//!
//! let service = SpeechService::new(Box::new(EspeakBackend::new()?), ServiceConfig::default())?;
//! let mut scene = VoiceoverScene::new(SimulatedRenderer::new(30.0), service);
//!
//! scene.voiceover("Watch <bookmark mark='here'/>this circle.", |scene, _tracker| {
//!     scene.wait_until_bookmark("here")
//! })?;
//! # Ok::<(), voiceover_rs::VoiceoverError>(())
//! ```

pub mod audio;
pub mod bookmark;
pub mod cache;
pub mod engines;
pub mod error;
pub mod interpolate;
pub mod scene;
pub mod service;
pub mod subcaption;
pub mod tracker;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use error::VoiceoverError;
pub use interpolate::AUDIO_OFFSET_RESOLUTION;
pub use tracker::VoiceoverTracker;

/// A sample pairing a position in the spoken text with a position in the audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBoundary {
    /// Character offset into the clean (bookmark-free) text.
    pub text_offset: usize,
    /// Audio offset in units of 1 / [`AUDIO_OFFSET_RESOLUTION`] seconds.
    pub audio_offset: u64,
    #[serde(default)]
    pub word_length: usize,
    #[serde(default)]
    pub text: String,
}

/// The cached outcome of synthesizing one narration.
///
/// Audio paths are relative to the cache directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    /// Whitespace-normalized narration text, bookmarks included.
    pub input_text: String,
    /// The exact structure the cache is keyed on.
    pub input_data: serde_json::Value,
    pub original_audio: PathBuf,
    /// Audio to play; differs from `original_audio` after a speed adjustment.
    pub final_audio: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_boundaries: Option<Vec<WordBoundary>>,
    /// Present when the word boundaries came from transcribing the audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcribed_text: Option<String>,
}

impl SynthesisResult {
    /// Whether bookmark timing can be derived from this result.
    pub fn has_timing(&self) -> bool {
        self.word_boundaries
            .as_ref()
            .is_some_and(|boundaries| !boundaries.is_empty())
    }
}

/// What a backend produced for one synthesis call.
#[derive(Debug, Clone, Default)]
pub struct BackendOutput {
    pub word_boundaries: Option<Vec<WordBoundary>>,
    pub transcribed_text: Option<String>,
}

/// Common interface for speech backends.
///
/// A backend turns clean narration text into an audio file. It does not deal
/// with caching or speed adjustment; [`service::SpeechService`] wraps it for that.
pub trait SpeechBackend {
    /// Stable identifier stored in the cache key (e.g. `"espeak"`).
    fn identifier(&self) -> &str;

    /// Backend settings that change the produced audio. Part of the cache key.
    fn config(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// File extension of the audio this backend writes.
    fn audio_extension(&self) -> &str {
        "wav"
    }

    /// Synthesize `text` into `audio_path`.
    ///
    /// Failures of the underlying engine surface as [`VoiceoverError::Backend`].
    fn generate(&mut self, text: &str, audio_path: &Path) -> Result<BackendOutput, VoiceoverError>;
}

/// A word recognized in audio, with its start time in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedWord {
    pub text: String,
    pub start_secs: f64,
}

/// Text and word boundaries recovered from audio by speech recognition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transcription {
    pub text: String,
    pub word_boundaries: Vec<WordBoundary>,
}

impl Transcription {
    /// Build a transcription from recognized words, joining them with single spaces.
    ///
    /// Each word's text offset is its character position in the joined text.
    pub fn from_timed_words(words: impl IntoIterator<Item = TimedWord>) -> Self {
        let mut text = String::new();
        let mut word_boundaries = Vec::new();
        let mut offset = 0usize;

        for word in words {
            let word_text = word.text.trim();
            if word_text.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
                offset += 1;
            }
            let word_length = word_text.chars().count();
            word_boundaries.push(WordBoundary {
                text_offset: offset,
                audio_offset: (word.start_secs.max(0.0) * AUDIO_OFFSET_RESOLUTION as f64).round()
                    as u64,
                word_length,
                text: word_text.to_string(),
            });
            text.push_str(word_text);
            offset += word_length;
        }

        Self {
            text,
            word_boundaries,
        }
    }
}

/// Speech recognition used to derive word boundaries when a backend has none.
pub trait Transcriber {
    /// Transcribe the audio at `audio_path` with the named model (e.g. `"base"`).
    fn transcribe(&mut self, audio_path: &Path, model: &str)
        -> Result<Transcription, VoiceoverError>;
}
