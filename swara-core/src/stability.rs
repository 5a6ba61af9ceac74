//! # Stability Module
//!
//! Keeps a short rolling history of sung frequencies and scores how steady the
//! voice is, as the inverse of the recent standard deviation.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of frequencies kept in a history.
pub const HISTORY_CAPACITY: usize = 20;
/// Fewer samples than this score 0.
pub const MIN_SAMPLES: usize = 5;
/// Only the most recent samples take part in the score.
pub const WINDOW: usize = 10;

/// Bounded FIFO of recent frequencies in Hz.
#[derive(Debug, Clone, Default)]
pub struct PitchHistory {
    samples: VecDeque<f32>,
}

impl PitchHistory {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Appends a frequency, dropping the oldest once at capacity.
    pub fn record(&mut self, frequency: f32) {
        if self.samples.len() == HISTORY_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(frequency);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.samples.iter()
    }

    /// Stability score in `0..=100`, see [`stability`].
    pub fn stability(&self) -> u8 {
        let recent: Vec<f32> = self
            .samples
            .iter()
            .skip(self.samples.len().saturating_sub(WINDOW))
            .copied()
            .collect();
        stability(&recent)
    }
}

/// Scores the last [`WINDOW`] entries of `history` as `100 - 2 * stddev`.
///
/// Returns exactly 0 when fewer than [`MIN_SAMPLES`] entries are available.
pub fn stability(history: &[f32]) -> u8 {
    if history.len() < MIN_SAMPLES {
        return 0;
    }
    let recent = &history[history.len().saturating_sub(WINDOW)..];
    let n = recent.len() as f32;
    let mean = recent.iter().sum::<f32>() / n;
    let variance = recent.iter().map(|f| (f - mean) * (f - mean)).sum::<f32>() / n;
    let score = 100.0 - 2.0 * variance.sqrt();
    score.clamp(0.0, 100.0).round() as u8
}

/// Qualitative description of a stability score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StabilityFeedback {
    RockSteady,
    VeryStable,
    GettingSteady,
    Wavering,
    VeryShaky,
}

impl StabilityFeedback {
    pub fn message(self) -> &'static str {
        match self {
            StabilityFeedback::RockSteady => "Rock steady",
            StabilityFeedback::VeryStable => "Very stable",
            StabilityFeedback::GettingSteady => "Getting steady",
            StabilityFeedback::Wavering => "Wavering",
            StabilityFeedback::VeryShaky => "Very shaky",
        }
    }
}

pub fn stability_feedback(score: u8) -> StabilityFeedback {
    match score {
        90.. => StabilityFeedback::RockSteady,
        70..=89 => StabilityFeedback::VeryStable,
        50..=69 => StabilityFeedback::GettingSteady,
        30..=49 => StabilityFeedback::Wavering,
        _ => StabilityFeedback::VeryShaky,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_drops_oldest_at_capacity() {
        let mut history = PitchHistory::new();
        for i in 0..25 {
            history.record(200.0 + i as f32);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.iter().next(), Some(&205.0));
    }

    #[test]
    fn too_few_samples_score_zero() {
        assert_eq!(stability(&[220.0; 4]), 0);
        assert_eq!(stability(&[100.0, 300.0, 220.0, 10.0]), 0);
        assert_eq!(stability(&[]), 0);
    }

    #[test]
    fn constant_pitch_is_rock_steady() {
        let score = stability(&[220.0; 5]);
        assert_eq!(score, 100);
        assert_eq!(stability_feedback(score), StabilityFeedback::RockSteady);
    }

    #[test]
    fn only_last_window_counts() {
        let mut samples = vec![100.0, 400.0, 100.0, 400.0, 100.0];
        samples.extend([220.0; WINDOW]);
        assert_eq!(stability(&samples), 100);
    }

    #[test]
    fn wider_spread_scores_lower() {
        // Alternating +/- d around 220 has a standard deviation of exactly d.
        let spread = |d: f32| -> Vec<f32> {
            (0..10).map(|i| if i % 2 == 0 { 220.0 + d } else { 220.0 - d }).collect()
        };
        assert_eq!(stability(&spread(5.0)), 90);
        assert_eq!(stability(&spread(20.0)), 60);
        assert_eq!(stability(&spread(60.0)), 0);
        assert!(stability(&spread(10.0)) >= stability(&spread(11.0)));
    }

    #[test]
    fn history_scores_its_recent_window() {
        let mut history = PitchHistory::new();
        for _ in 0..12 {
            history.record(220.0);
        }
        assert_eq!(history.stability(), 100);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.stability(), 0);
    }

    #[test]
    fn feedback_breakpoints() {
        assert_eq!(stability_feedback(90), StabilityFeedback::RockSteady);
        assert_eq!(stability_feedback(70), StabilityFeedback::VeryStable);
        assert_eq!(stability_feedback(50), StabilityFeedback::GettingSteady);
        assert_eq!(stability_feedback(30), StabilityFeedback::Wavering);
        assert_eq!(stability_feedback(29), StabilityFeedback::VeryShaky);
    }
}
