use std::collections::HashMap;
use std::path::Path;

use crate::audio;
use crate::bookmark::extract_bookmarks;
use crate::error::VoiceoverError;
use crate::interpolate::TimeInterpolator;
use crate::SynthesisResult;

/// Whether a tracker can answer bookmark queries.
#[derive(Debug, Clone, PartialEq)]
pub enum TimingState {
    /// Absolute render time of each bookmark.
    Available(HashMap<String, f64>),
    /// The synthesis result carried no word boundaries.
    Unavailable,
}

/// Timing of one narration relative to the render clock.
///
/// Created when a narration starts playing. It holds no reference to the
/// renderer; every query takes the current render time.
#[derive(Debug, Clone)]
pub struct VoiceoverTracker {
    start_t: f64,
    end_t: f64,
    duration: f64,
    timing: TimingState,
}

impl VoiceoverTracker {
    /// Build a tracker for audio of length `duration` that starts at `start_t`.
    ///
    /// `input_text` is the whitespace-normalized narration with its bookmark
    /// tags, as passed to the synthesis call that produced `result`.
    pub fn new(
        start_t: f64,
        duration: f64,
        result: &SynthesisResult,
        input_text: &str,
    ) -> Result<Self, VoiceoverError> {
        let timing = if result.has_timing() {
            TimingState::Available(bookmark_times(start_t, result, input_text)?)
        } else {
            TimingState::Unavailable
        };

        Ok(Self {
            start_t,
            end_t: start_t + duration,
            duration,
            timing,
        })
    }

    /// Like [`new`](Self::new), measuring the duration of `cache_dir/final_audio`.
    pub fn from_audio(
        start_t: f64,
        result: &SynthesisResult,
        input_text: &str,
        cache_dir: &Path,
    ) -> Result<Self, VoiceoverError> {
        let duration = audio::duration_secs(&cache_dir.join(&result.final_audio))?;
        Self::new(start_t, duration, result, input_text)
    }

    pub fn start_t(&self) -> f64 {
        self.start_t
    }

    pub fn end_t(&self) -> f64 {
        self.end_t
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn timing(&self) -> &TimingState {
        &self.timing
    }

    pub fn has_timing(&self) -> bool {
        matches!(self.timing, TimingState::Available(_))
    }

    /// Whether the narration has finished playing at render time `now`.
    pub fn is_finished(&self, now: f64) -> bool {
        now >= self.end_t
    }

    /// Absolute render time of a bookmark, if timing is available and it exists.
    pub fn bookmark_time(&self, mark: &str) -> Option<f64> {
        match &self.timing {
            TimingState::Available(times) => times.get(mark).copied(),
            TimingState::Unavailable => None,
        }
    }

    /// Bookmark names in order of their render time.
    pub fn bookmark_names(&self) -> Vec<&str> {
        let TimingState::Available(times) = &self.timing else {
            return Vec::new();
        };
        let mut names: Vec<(&str, f64)> = times.iter().map(|(k, &t)| (k.as_str(), t)).collect();
        names.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        names.into_iter().map(|(name, _)| name).collect()
    }

    /// Seconds of narration left at render time `now`, plus `buff`. Never negative.
    pub fn remaining_duration(&self, now: f64, buff: f64) -> f64 {
        (self.end_t - now + buff).max(0.0)
    }

    /// Seconds until bookmark `mark` is spoken, plus `buff`, capped at `limit`.
    ///
    /// Never negative. Fails with [`VoiceoverError::BookmarksUnsupported`]
    /// when the narration has no word boundaries, otherwise with
    /// [`VoiceoverError::UnknownBookmark`] for undeclared names.
    pub fn time_until_bookmark(
        &self,
        mark: &str,
        now: f64,
        buff: f64,
        limit: Option<f64>,
    ) -> Result<f64, VoiceoverError> {
        let TimingState::Available(times) = &self.timing else {
            return Err(VoiceoverError::BookmarksUnsupported);
        };
        let time = times
            .get(mark)
            .ok_or_else(|| VoiceoverError::UnknownBookmark(mark.to_string()))?;

        let result = (time - now + buff).max(0.0);
        Ok(match limit {
            Some(limit) => result.min(limit),
            None => result,
        })
    }
}

fn bookmark_times(
    start_t: f64,
    result: &SynthesisResult,
    input_text: &str,
) -> Result<HashMap<String, f64>, VoiceoverError> {
    let boundaries = result.word_boundaries.as_deref().unwrap_or_default();
    let interpolator = TimeInterpolator::new(boundaries)?;
    let extracted = extract_bookmarks(input_text)?;

    // Timing from transcription indexes the recognized text, whose length
    // can differ from what was sent to the backend.
    let net_len = extracted.clean_text.chars().count();
    let transcribed_len = result
        .transcribed_text
        .as_deref()
        .map(|t| t.trim().chars().count())
        .unwrap_or(net_len);
    let scale = if net_len == 0 {
        1.0
    } else {
        transcribed_len as f64 / net_len as f64
    };

    let times = extracted
        .bookmarks
        .into_iter()
        .map(|(mark, distance)| {
            let elapsed = interpolator.interpolate(distance as f64 * scale);
            (mark, start_t + elapsed)
        })
        .collect();
    Ok(times)
}

#[cfg(test)]
mod tests {
    use super::VoiceoverTracker;
    use crate::audio::tests::write_test_wav;
    use crate::error::VoiceoverError;
    use crate::{SynthesisResult, WordBoundary};
    use std::path::PathBuf;

    fn wb(text_offset: usize, audio_offset: u64) -> WordBoundary {
        WordBoundary {
            text_offset,
            audio_offset,
            word_length: 0,
            text: String::new(),
        }
    }

    fn result(
        input_text: &str,
        boundaries: Option<Vec<WordBoundary>>,
        transcribed_text: Option<&str>,
    ) -> SynthesisResult {
        SynthesisResult {
            input_text: input_text.to_string(),
            input_data: serde_json::json!({ "input_text": input_text }),
            original_audio: PathBuf::from("a.wav"),
            final_audio: PathBuf::from("a.wav"),
            word_boundaries: boundaries,
            transcribed_text: transcribed_text.map(str::to_string),
        }
    }

    #[test]
    fn bookmark_time_is_interpolated_from_start() {
        let text = "Hello <bookmark mark='m'/>world";
        let data = result(text, Some(vec![wb(0, 0), wb(6, 5_000_000)]), None);
        let tracker = VoiceoverTracker::new(10.0, 2.0, &data, text).unwrap();

        assert_eq!(tracker.end_t(), 12.0);
        assert!((tracker.bookmark_time("m").unwrap() - 10.5).abs() < 1e-9);
        let wait = tracker.time_until_bookmark("m", 10.0, 0.0, None).unwrap();
        assert!((wait - 0.5).abs() < 1e-9);
    }

    #[test]
    fn time_until_bookmark_applies_buffer_limit_and_floor() {
        let text = "Hello <bookmark mark='m'/>world";
        let data = result(text, Some(vec![wb(0, 0), wb(6, 5_000_000)]), None);
        let tracker = VoiceoverTracker::new(0.0, 2.0, &data, text).unwrap();

        let buffered = tracker.time_until_bookmark("m", 0.0, 0.25, None).unwrap();
        assert!((buffered - 0.75).abs() < 1e-9);
        let limited = tracker.time_until_bookmark("m", 0.0, 0.0, Some(0.1)).unwrap();
        assert!((limited - 0.1).abs() < 1e-9);
        assert_eq!(tracker.time_until_bookmark("m", 1.5, 0.0, None).unwrap(), 0.0);
    }

    #[test]
    fn remaining_duration_is_never_negative() {
        let data = result("Hi", None, None);
        let tracker = VoiceoverTracker::new(1.0, 2.0, &data, "Hi").unwrap();
        assert_eq!(tracker.remaining_duration(1.0, 0.0), 2.0);
        assert_eq!(tracker.remaining_duration(2.5, 0.5), 1.0);
        for now in [0.0, 3.0, 10.0, 1e9] {
            for buff in [-5.0, 0.0, 0.5] {
                assert!(tracker.remaining_duration(now, buff) >= 0.0);
            }
        }
        assert!(!tracker.is_finished(2.9));
        assert!(tracker.is_finished(3.0));
    }

    #[test]
    fn missing_boundaries_make_bookmarks_unsupported() {
        let text = "Hello <bookmark mark='m'/>world";
        let data = result(text, None, None);
        let tracker = VoiceoverTracker::new(0.0, 2.0, &data, text).unwrap();
        assert!(!tracker.has_timing());
        for mark in ["m", "missing"] {
            assert!(matches!(
                tracker.time_until_bookmark(mark, 0.0, 0.0, None),
                Err(VoiceoverError::BookmarksUnsupported)
            ));
        }
    }

    #[test]
    fn empty_boundary_list_counts_as_unavailable() {
        let data = result("Hi", Some(Vec::new()), None);
        let tracker = VoiceoverTracker::new(0.0, 1.0, &data, "Hi").unwrap();
        assert!(!tracker.has_timing());
    }

    #[test]
    fn unknown_bookmark_is_reported() {
        let text = "Hello <bookmark mark='m'/>world";
        let data = result(text, Some(vec![wb(0, 0), wb(11, 10_000_000)]), None);
        let tracker = VoiceoverTracker::new(0.0, 1.0, &data, text).unwrap();
        match tracker.time_until_bookmark("nope", 0.0, 0.0, None) {
            Err(VoiceoverError::UnknownBookmark(name)) => assert_eq!(name, "nope"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn transcribed_length_rescales_distances() {
        // Ten characters were sent, the transcript has five.
        let text = "abcde<bookmark mark='half'/>fghij";
        let data = result(
            text,
            Some(vec![wb(0, 0), wb(5, 10_000_000)]),
            Some(" vwxyz "),
        );
        let tracker = VoiceoverTracker::new(0.0, 1.0, &data, text).unwrap();
        // distance 5 * 5/10 = 2.5 -> 0.5s
        assert!((tracker.bookmark_time("half").unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn bookmark_past_last_boundary_uses_last_time() {
        let text = "Hello world<bookmark mark='end'/>";
        let data = result(text, Some(vec![wb(0, 0), wb(6, 5_000_000)]), None);
        let tracker = VoiceoverTracker::new(2.0, 1.0, &data, text).unwrap();
        assert!((tracker.bookmark_time("end").unwrap() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn bookmark_names_are_ordered_by_time() {
        let text = "<bookmark mark='b'/>one <bookmark mark='a'/>two <bookmark mark='c'/>three";
        let data = result(text, Some(vec![wb(0, 0), wb(13, 13_000_000)]), None);
        let tracker = VoiceoverTracker::new(0.0, 2.0, &data, text).unwrap();
        assert_eq!(tracker.bookmark_names(), vec!["b", "a", "c"]);
    }

    #[test]
    fn from_audio_measures_final_file() {
        let dir = tempfile::tempdir().unwrap();
        write_test_wav(&dir.path().join("a.wav"), 1.5);
        let data = result("Hi", None, None);
        let tracker = VoiceoverTracker::from_audio(4.0, &data, "Hi", dir.path()).unwrap();
        assert!((tracker.duration() - 1.5).abs() < 1e-9);
        assert!((tracker.end_t() - 5.5).abs() < 1e-9);
    }
}
