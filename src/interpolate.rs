use crate::error::VoiceoverError;
use crate::WordBoundary;

/// Audio offsets in word boundaries are expressed in units of 100 ns.
pub const AUDIO_OFFSET_RESOLUTION: u64 = 10_000_000;

/// Piecewise-linear map from text offset (characters) to audio time (seconds).
#[derive(Debug, Clone)]
pub struct TimeInterpolator {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl TimeInterpolator {
    /// Build the interpolator from word boundary samples.
    ///
    /// Samples are ordered by text offset; ties keep their input order.
    pub fn new(word_boundaries: &[WordBoundary]) -> Result<Self, VoiceoverError> {
        if word_boundaries.is_empty() {
            return Err(VoiceoverError::NoWordBoundaries);
        }

        let mut samples: Vec<(f64, f64)> = word_boundaries
            .iter()
            .map(|wb| {
                (
                    wb.text_offset as f64,
                    wb.audio_offset as f64 / AUDIO_OFFSET_RESOLUTION as f64,
                )
            })
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (x, y) = samples.into_iter().unzip();
        Ok(Self { x, y })
    }

    /// Audio time at `distance` characters into the spoken text.
    ///
    /// Queries outside the sampled text range fall back to the last sample's
    /// time and log a warning.
    pub fn interpolate(&self, distance: f64) -> f64 {
        match self.interpolate_checked(distance) {
            Some(t) => t,
            None => {
                let fallback = self.last_time();
                log::warn!(
                    "Text offset {distance} is outside word boundary range [{}, {}]; \
                     using last boundary time {fallback:.3}s. The word boundaries may be wrong.",
                    self.x[0],
                    self.x[self.x.len() - 1],
                );
                fallback
            }
        }
    }

    /// Like [`interpolate`](Self::interpolate) but returns `None` instead of falling back.
    pub fn interpolate_checked(&self, distance: f64) -> Option<f64> {
        let first = self.x[0];
        let last = self.x[self.x.len() - 1];
        if !(first..=last).contains(&distance) {
            return None;
        }

        // First sample strictly past `distance`. Repeated offsets resolve to
        // the last sample recorded at that offset.
        let upper = self.x.partition_point(|&x| x <= distance);
        if upper == self.x.len() {
            return Some(self.last_time());
        }
        let lower = upper - 1;
        let (x0, x1) = (self.x[lower], self.x[upper]);
        let (y0, y1) = (self.y[lower], self.y[upper]);
        Some(y0 + (distance - x0) * (y1 - y0) / (x1 - x0))
    }

    pub fn last_time(&self) -> f64 {
        self.y[self.y.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}
