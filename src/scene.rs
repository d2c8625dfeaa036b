//! Glue between narration timing and a render loop.

use std::path::{Path, PathBuf};

use derive_builder::Builder;

use crate::bookmark::remove_bookmarks;
use crate::cache::normalize_whitespace;
use crate::error::VoiceoverError;
use crate::service::SpeechService;
use crate::subcaption::{split_subcaptions, Subcaption};
use crate::tracker::VoiceoverTracker;

/// The parts of an animation renderer a voiceover scene drives.
pub trait RenderHost {
    /// Current render time in seconds.
    fn time(&self) -> f64;

    fn frame_rate(&self) -> f64;

    /// Advance render time by `duration` seconds. Always completes.
    fn wait(&mut self, duration: f64);

    /// Start playing `path` at `time_offset` seconds from now.
    fn add_sound(&mut self, path: &Path, time_offset: f64);

    fn add_subcaption(&mut self, caption: &Subcaption);
}

/// A [`RenderHost`] that only keeps a clock and records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRenderer {
    time: f64,
    frame_rate: f64,
    /// Audio files with their absolute start time.
    pub sounds: Vec<(PathBuf, f64)>,
    /// Captions with the absolute time they were emitted at.
    pub subcaptions: Vec<(f64, Subcaption)>,
    pub waits: Vec<f64>,
}

impl SimulatedRenderer {
    pub fn new(frame_rate: f64) -> Self {
        Self {
            frame_rate,
            ..Default::default()
        }
    }
}

impl RenderHost for SimulatedRenderer {
    fn time(&self) -> f64 {
        self.time
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn wait(&mut self, duration: f64) {
        self.waits.push(duration);
        self.time += duration;
    }

    fn add_sound(&mut self, path: &Path, time_offset: f64) {
        self.sounds.push((path.to_path_buf(), self.time + time_offset));
    }

    fn add_subcaption(&mut self, caption: &Subcaption) {
        self.subcaptions.push((self.time, caption.clone()));
    }
}

/// Caption settings for a [`VoiceoverScene`].
#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct SceneConfig {
    pub create_subcaption: bool,
    /// Captions longer than this many characters are split into chunks.
    pub max_subcaption_len: usize,
    /// Gap in seconds between consecutive caption chunks.
    pub subcaption_buff: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            create_subcaption: true,
            max_subcaption_len: 70,
            subcaption_buff: 0.1,
        }
    }
}

impl SceneConfig {
    pub fn builder() -> SceneConfigBuilder {
        SceneConfigBuilder::default()
    }
}

impl From<SceneConfigBuilderError> for VoiceoverError {
    fn from(err: SceneConfigBuilderError) -> Self {
        VoiceoverError::Config(err.to_string())
    }
}

/// A render loop with narration.
///
/// Only the most recent narration is tracked; starting a new one replaces it.
pub struct VoiceoverScene<R: RenderHost> {
    renderer: R,
    service: SpeechService,
    config: SceneConfig,
    current_tracker: Option<VoiceoverTracker>,
}

impl<R: RenderHost> VoiceoverScene<R> {
    pub fn new(renderer: R, service: SpeechService) -> Self {
        Self::with_config(renderer, service, SceneConfig::default())
    }

    pub fn with_config(renderer: R, service: SpeechService, config: SceneConfig) -> Self {
        Self {
            renderer,
            service,
            config,
            current_tracker: None,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn service_mut(&mut self) -> &mut SpeechService {
        &mut self.service
    }

    pub fn current_tracker(&self) -> Option<&VoiceoverTracker> {
        self.current_tracker.as_ref()
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Synthesize `text`, start playing it now, and make it the current narration.
    ///
    /// `subcaption` replaces the caption text; by default the narration
    /// itself is captioned, without bookmark tags.
    pub fn add_voiceover_text(
        &mut self,
        text: &str,
        subcaption: Option<&str>,
    ) -> Result<VoiceoverTracker, VoiceoverError> {
        let narration = normalize_whitespace(text);
        let result = self.service.synthesize(&narration)?;
        let cache_dir = self.service.cache_dir();
        let tracker = VoiceoverTracker::from_audio(
            self.renderer.time(),
            &result,
            &narration,
            cache_dir,
        )?;

        self.renderer
            .add_sound(&cache_dir.join(&result.final_audio), 0.0);
        self.current_tracker = Some(tracker.clone());

        if self.config.create_subcaption {
            let caption_text = match subcaption {
                Some(caption) => caption.to_string(),
                None => remove_bookmarks(&narration),
            };
            let captions = split_subcaptions(
                &caption_text,
                tracker.duration(),
                self.config.max_subcaption_len,
                self.config.subcaption_buff,
            );
            for caption in &captions {
                self.renderer.add_subcaption(caption);
            }
        }

        Ok(tracker)
    }

    /// Run `body` while `text` is narrated, then wait for the narration to finish.
    ///
    /// The final wait also happens when `body` fails; its error is returned afterwards.
    pub fn voiceover<T, F>(&mut self, text: &str, body: F) -> Result<T, VoiceoverError>
    where
        F: FnOnce(&mut Self, &VoiceoverTracker) -> Result<T, VoiceoverError>,
    {
        let tracker = self.add_voiceover_text(text, None)?;
        let outcome = body(self, &tracker);
        self.wait_for_voiceover();
        outcome
    }

    /// Wait until the current narration has finished. No-op without one.
    pub fn wait_for_voiceover(&mut self) {
        let remaining = self.remaining_duration(0.0);
        self.safe_wait(remaining);
    }

    /// Wait for `duration` seconds, skipping waits shorter than one frame.
    pub fn safe_wait(&mut self, duration: f64) {
        let frame_rate = self.renderer.frame_rate();
        let one_frame = if frame_rate > 0.0 { 1.0 / frame_rate } else { 0.0 };
        if duration > one_frame {
            self.renderer.wait(duration);
        }
    }

    /// Wait until the current narration reaches bookmark `mark`.
    pub fn wait_until_bookmark(&mut self, mark: &str) -> Result<(), VoiceoverError> {
        let duration = self.time_until_bookmark(mark, 0.0, None)?;
        self.safe_wait(duration);
        Ok(())
    }

    /// Seconds until the current narration reaches `mark`.
    pub fn time_until_bookmark(
        &self,
        mark: &str,
        buff: f64,
        limit: Option<f64>,
    ) -> Result<f64, VoiceoverError> {
        let tracker = self
            .current_tracker
            .as_ref()
            .ok_or(VoiceoverError::NoActiveNarration)?;
        tracker.time_until_bookmark(mark, self.renderer.time(), buff, limit)
    }

    /// Seconds of the current narration left to play; zero without one.
    pub fn remaining_duration(&self, buff: f64) -> f64 {
        self.current_tracker
            .as_ref()
            .map_or(0.0, |t| t.remaining_duration(self.renderer.time(), buff))
    }
}

#[cfg(test)]
mod tests {
    use super::{RenderHost, SceneConfig, SimulatedRenderer, VoiceoverScene};
    use crate::error::VoiceoverError;
    use crate::service::tests::SpyBackend;
    use crate::service::{ServiceConfig, SpeechService};
    use crate::WordBoundary;
    use std::path::Path;

    fn wb(text_offset: usize, audio_offset: u64) -> WordBoundary {
        WordBoundary {
            text_offset,
            audio_offset,
            word_length: 0,
            text: String::new(),
        }
    }

    fn scene_with(
        dir: &Path,
        backend: SpyBackend,
        config: SceneConfig,
    ) -> VoiceoverScene<SimulatedRenderer> {
        let service_config = ServiceConfig::builder().cache_dir(dir).build().unwrap();
        let service = SpeechService::new(Box::new(backend), service_config).unwrap();
        VoiceoverScene::with_config(SimulatedRenderer::new(30.0), service, config)
    }

    #[test]
    fn waits_for_bookmark_then_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SpyBackend::new(2.0, Some(vec![wb(0, 0), wb(6, 5_000_000)]));
        let mut scene = scene_with(dir.path(), backend, SceneConfig::default());
        scene.renderer_mut().wait(1.0);

        scene
            .voiceover("Hello <bookmark mark='m'/>world", |scene, tracker| {
                assert_eq!(tracker.start_t(), 1.0);
                let until = scene.time_until_bookmark("m", 0.0, None)?;
                assert!((until - 0.5).abs() < 1e-9);
                scene.wait_until_bookmark("m")?;
                assert!((scene.renderer().time() - 1.5).abs() < 1e-9);
                Ok(())
            })
            .unwrap();

        assert!((scene.renderer().time() - 3.0).abs() < 1e-9);
        let renderer = scene.into_renderer();
        assert_eq!(renderer.sounds.len(), 1);
        assert_eq!(renderer.sounds[0].1, 1.0);
        assert!(renderer.sounds[0].0.starts_with(dir.path()));
    }

    #[test]
    fn bookmarks_without_timing_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = scene_with(dir.path(), SpyBackend::new(1.0, None), SceneConfig::default());
        let err = scene
            .voiceover("Hi <bookmark mark='m'/>there", |scene, _| {
                scene.wait_until_bookmark("m")
            })
            .unwrap_err();
        assert!(matches!(err, VoiceoverError::BookmarksUnsupported));
        // the narration was still waited out
        assert!((scene.renderer().time() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn waiting_without_narration() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = scene_with(dir.path(), SpyBackend::new(1.0, None), SceneConfig::default());
        assert!(matches!(
            scene.wait_until_bookmark("m"),
            Err(VoiceoverError::NoActiveNarration)
        ));
        scene.wait_for_voiceover();
        assert_eq!(scene.remaining_duration(0.0), 0.0);
        assert!(scene.renderer().waits.is_empty());
    }

    #[test]
    fn sub_frame_waits_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = scene_with(dir.path(), SpyBackend::new(1.0, None), SceneConfig::default());
        scene.safe_wait(0.01);
        scene.safe_wait(1.0 / 30.0);
        assert!(scene.renderer().waits.is_empty());
        scene.safe_wait(0.05);
        assert_eq!(scene.renderer().waits, vec![0.05]);
    }

    #[test]
    fn new_narration_replaces_the_current_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = scene_with(dir.path(), SpyBackend::new(2.0, None), SceneConfig::default());
        scene.add_voiceover_text("First", None).unwrap();
        scene.renderer_mut().wait(0.5);
        let second = scene.add_voiceover_text("Second", None).unwrap();

        let current = scene.current_tracker().unwrap();
        assert_eq!(current.start_t(), 0.5);
        assert_eq!(second.end_t(), 2.5);
        scene.wait_for_voiceover();
        assert!((scene.renderer().time() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn captions_skip_bookmark_tags() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = scene_with(dir.path(), SpyBackend::new(2.0, None), SceneConfig::default());
        scene
            .add_voiceover_text("Hello <bookmark mark='m'/>world", None)
            .unwrap();
        scene.add_voiceover_text("Again", Some("Custom caption")).unwrap();

        let texts: Vec<&str> = scene
            .renderer()
            .subcaptions
            .iter()
            .map(|(_, c)| c.text.as_str())
            .collect();
        assert_eq!(texts, vec!["Hello world", "Custom caption"]);
        assert!((scene.renderer().subcaptions[0].1.duration - 1.9).abs() < 1e-9);
    }

    #[test]
    fn captions_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = SceneConfig::builder()
            .create_subcaption(false)
            .build()
            .unwrap();
        let mut scene = scene_with(dir.path(), SpyBackend::new(1.0, None), config);
        scene.add_voiceover_text("Quiet", None).unwrap();
        assert!(scene.renderer().subcaptions.is_empty());
    }

    #[test]
    fn repeated_narration_reuses_audio() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SpyBackend::new(1.0, None);
        let calls = backend.calls.clone();
        let mut scene = scene_with(dir.path(), backend, SceneConfig::default());
        scene.voiceover("Same line", |_, _| Ok(())).unwrap();
        scene.voiceover("Same  line", |_, _| Ok(())).unwrap();
        assert_eq!(calls.get(), 1);
        let renderer = scene.into_renderer();
        assert_eq!(renderer.sounds[0].0, renderer.sounds[1].0);
        assert_eq!(renderer.sounds[1].1, 1.0);
    }
}
