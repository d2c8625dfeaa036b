//! Cached synthesis dispatch.
//!
//! [`SpeechService`] wraps a [`SpeechBackend`] with whitespace normalization,
//! the durable result cache, transcription fallback and tempo adjustment.

use std::fs;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde_json::json;

use crate::audio;
use crate::bookmark::extract_bookmarks;
use crate::cache::{normalize_whitespace, CacheKey, CacheLayout, CacheStore};
use crate::error::VoiceoverError;
use crate::{BackendOutput, SpeechBackend, SynthesisResult, Transcriber};

/// Default directory for synthesized audio and cache entries.
pub const DEFAULT_CACHE_DIR: &str = "media/voiceovers";

/// Settings shared by every backend.
#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct ServiceConfig {
    /// Directory holding audio files and cache entries.
    #[builder(setter(into))]
    pub cache_dir: PathBuf,
    /// Playback speed applied to every synthesized file. 1.0 leaves audio untouched.
    pub global_speed: f64,
    /// Speech recognition model used when a backend returns no word boundaries.
    #[builder(setter(into, strip_option))]
    pub transcription_model: Option<String>,
    pub cache_layout: CacheLayout,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            global_speed: 1.0,
            transcription_model: None,
            cache_layout: CacheLayout::default(),
        }
    }
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }
}

impl From<ServiceConfigBuilderError> for VoiceoverError {
    fn from(err: ServiceConfigBuilderError) -> Self {
        VoiceoverError::Config(err.to_string())
    }
}

/// A speech backend behind a durable cache.
///
/// Each distinct (clean text, backend, backend config) triple is synthesized
/// at most once; later calls return the stored result unchanged.
pub struct SpeechService {
    backend: Box<dyn SpeechBackend>,
    transcriber: Option<Box<dyn Transcriber>>,
    cache: Box<dyn CacheStore>,
    config: ServiceConfig,
}

impl SpeechService {
    /// Create a service without speech recognition.
    ///
    /// Fails with [`VoiceoverError::BackendUnavailable`] if the config asks
    /// for a transcription model, since nothing could run it.
    pub fn new(
        backend: Box<dyn SpeechBackend>,
        config: ServiceConfig,
    ) -> Result<Self, VoiceoverError> {
        Self::build(backend, None, config)
    }

    /// Create a service that transcribes audio when the backend has no word boundaries.
    pub fn with_transcriber(
        backend: Box<dyn SpeechBackend>,
        transcriber: Box<dyn Transcriber>,
        config: ServiceConfig,
    ) -> Result<Self, VoiceoverError> {
        if config.transcription_model.is_none() {
            log::warn!(
                "A transcriber was supplied but no transcription model is configured; \
                 it will not be used"
            );
        }
        Self::build(backend, Some(transcriber), config)
    }

    fn build(
        backend: Box<dyn SpeechBackend>,
        transcriber: Option<Box<dyn Transcriber>>,
        config: ServiceConfig,
    ) -> Result<Self, VoiceoverError> {
        if !(config.global_speed.is_finite() && config.global_speed > 0.0) {
            return Err(VoiceoverError::Config(format!(
                "global_speed must be a positive number, got {}",
                config.global_speed
            )));
        }
        if let (Some(model), None) = (&config.transcription_model, &transcriber) {
            return Err(VoiceoverError::BackendUnavailable(format!(
                "transcription model '{model}' is configured but no transcriber is available. \
                 Pass one with SpeechService::with_transcriber()"
            )));
        }

        fs::create_dir_all(&config.cache_dir)?;
        let cache = config.cache_layout.open(&config.cache_dir);
        log::debug!(
            "Speech service '{}' using cache at {}",
            backend.identifier(),
            config.cache_dir.display()
        );

        Ok(Self {
            backend,
            transcriber,
            cache,
            config,
        })
    }

    /// Replace the cache store opened from the config.
    pub fn with_cache_store(mut self, cache: Box<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn backend_identifier(&self) -> &str {
        self.backend.identifier()
    }

    /// Synthesize `text`, or return the cached result of an identical earlier call.
    ///
    /// Whitespace runs are collapsed before anything else, and bookmark tags
    /// are stripped from what the backend speaks. The cache entry is written
    /// only after transcription and speed adjustment have finished.
    pub fn synthesize(&mut self, text: &str) -> Result<SynthesisResult, VoiceoverError> {
        let text = normalize_whitespace(text);
        let clean_text = extract_bookmarks(&text)?.clean_text;
        let service = self.backend.identifier().to_string();

        let key = CacheKey::new(json!({
            "input_text": clean_text,
            "service": service,
            "config": self.backend.config(),
            "global_speed": self.config.global_speed,
        }));
        if let Some(cached) = self.cache.get(&key)? {
            log::debug!("Cache hit for {clean_text:?} ({service})");
            return Ok(cached);
        }

        let original_audio = PathBuf::from(format!(
            "{}.{}",
            key.audio_basename(),
            self.backend.audio_extension()
        ));
        let audio_path = self.config.cache_dir.join(&original_audio);
        log::info!("Synthesizing {clean_text:?} with {service}");

        let BackendOutput {
            mut word_boundaries,
            mut transcribed_text,
        } = self.backend.generate(&clean_text, &audio_path)?;
        if !audio_path.exists() {
            return Err(VoiceoverError::backend(
                &service,
                format!("no audio was written to {}", audio_path.display()),
            ));
        }

        let missing_boundaries = word_boundaries.as_ref().map_or(true, Vec::is_empty);
        if missing_boundaries {
            if let (Some(model), Some(transcriber)) = (
                self.config.transcription_model.as_deref(),
                self.transcriber.as_mut(),
            ) {
                log::info!("Transcribing {} with model '{model}'", audio_path.display());
                let transcription = transcriber.transcribe(&audio_path, model)?;
                word_boundaries = Some(transcription.word_boundaries);
                transcribed_text = Some(transcription.text);
            }
        }

        let speed = self.config.global_speed;
        let final_audio = if speed != 1.0 {
            let adjusted = adjusted_audio_name(&original_audio);
            audio::adjust_speed(&audio_path, &self.config.cache_dir.join(&adjusted), speed)?;
            for boundary in word_boundaries.iter_mut().flatten() {
                boundary.audio_offset = (boundary.audio_offset as f64 / speed) as u64;
            }
            adjusted
        } else {
            original_audio.clone()
        };

        let result = SynthesisResult {
            input_text: text,
            input_data: key.input_data.clone(),
            original_audio,
            final_audio,
            word_boundaries,
            transcribed_text,
        };
        self.cache.put(&key, &result)?;
        Ok(result)
    }
}

/// `name.wav` -> `name_adjusted.wav`
fn adjusted_audio_name(original: &Path) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match original.extension() {
        Some(ext) => format!("{stem}_adjusted.{}", ext.to_string_lossy()),
        None => format!("{stem}_adjusted"),
    };
    original.with_file_name(name)
}
