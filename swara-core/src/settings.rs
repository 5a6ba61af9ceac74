//! # Settings Module
//!
//! User-adjustable practice configuration. Stored as JSON under
//! [`crate::persistence::SETTINGS_KEY`]; missing fields fall back to defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::swara::{NotePolicy, TuningSystem};
use crate::tolerance::{self, ToleranceLevel};

pub const MIN_TOLERANCE_CENTS: u32 = 10;
pub const MAX_TOLERANCE_CENTS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeSettings {
    /// Match window around the target, in cents.
    pub tolerance_cents: u32,
    /// How long a note must be held to count.
    pub hold_duration_ms: u64,
    /// Ratio table used for every practice mode.
    pub tuning: TuningSystem,
    pub unknown_note_policy: NotePolicy,
    /// Length of each reference tone played while listening.
    pub reference_tone_ms: u64,
    /// Silence between reference tones of a sequence.
    pub inter_note_gap_ms: u64,
    /// Pause after a mistake before the reference is played again.
    pub retry_delay_ms: u64,
    /// Holds on one note that may break off-pitch before it counts as a mistake.
    pub failed_holds_per_note: u8,
    /// Samples below this confidence are treated as no signal.
    pub min_confidence: f32,
    /// Samples must exceed this confidence to update the detected Sa.
    pub tonic_confidence: f32,
    /// Play the reference again before every note of a sequence.
    pub replay_each_note: bool,
    /// Reference tone volume in `0.0..=1.0`.
    pub volume: f32,
}

impl Default for PracticeSettings {
    fn default() -> Self {
        Self {
            tolerance_cents: 50,
            hold_duration_ms: 2000,
            tuning: TuningSystem::EqualTempered,
            unknown_note_policy: NotePolicy::TreatAsTonic,
            reference_tone_ms: 1500,
            inter_note_gap_ms: 300,
            retry_delay_ms: 1500,
            failed_holds_per_note: 5,
            min_confidence: 0.45,
            tonic_confidence: 0.7,
            replay_each_note: false,
            volume: 0.8,
        }
    }
}

impl PracticeSettings {
    /// Returns a copy with every field clamped into its supported range.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let unit = |v: f32, fallback: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { fallback };
        Self {
            tolerance_cents: self
                .tolerance_cents
                .clamp(MIN_TOLERANCE_CENTS, MAX_TOLERANCE_CENTS),
            hold_duration_ms: self.hold_duration_ms.clamp(500, 10_000),
            tuning: self.tuning,
            unknown_note_policy: self.unknown_note_policy,
            reference_tone_ms: self.reference_tone_ms.clamp(500, 3000),
            inter_note_gap_ms: self.inter_note_gap_ms.min(2000),
            retry_delay_ms: self.retry_delay_ms.min(10_000),
            failed_holds_per_note: self.failed_holds_per_note.clamp(1, 20),
            min_confidence: unit(self.min_confidence, defaults.min_confidence),
            tonic_confidence: unit(self.tonic_confidence, defaults.tonic_confidence),
            replay_each_note: self.replay_each_note,
            volume: unit(self.volume, defaults.volume),
        }
    }

    pub fn hold_duration(&self) -> Duration {
        Duration::from_millis(self.hold_duration_ms)
    }

    pub fn reference_tone(&self) -> Duration {
        Duration::from_millis(self.reference_tone_ms)
    }

    pub fn inter_note_gap(&self) -> Duration {
        Duration::from_millis(self.inter_note_gap_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn tolerance_level(&self) -> ToleranceLevel {
        tolerance::tolerance_level(self.tolerance_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let settings: PracticeSettings =
            serde_json::from_str(r#"{"tolerance_cents": 25, "tuning": "JustIntonation"}"#).unwrap();
        assert_eq!(settings.tolerance_cents, 25);
        assert_eq!(settings.tuning, TuningSystem::JustIntonation);
        assert_eq!(settings.hold_duration_ms, 2000);
        assert_eq!(settings.tolerance_level(), ToleranceLevel::Strict);
    }

    #[test]
    fn sanitized_clamps_out_of_range_values() {
        let wild = PracticeSettings {
            tolerance_cents: 500,
            hold_duration_ms: 0,
            volume: f32::NAN,
            min_confidence: -3.0,
            failed_holds_per_note: 0,
            ..PracticeSettings::default()
        };
        let clean = wild.sanitized();
        assert_eq!(clean.failed_holds_per_note, 1);
        assert_eq!(clean.tolerance_cents, MAX_TOLERANCE_CENTS);
        assert_eq!(clean.hold_duration(), Duration::from_millis(500));
        assert_eq!(clean.volume, 0.8);
        assert_eq!(clean.min_confidence, 0.0);
        assert_eq!(PracticeSettings::default().sanitized(), PracticeSettings::default());
    }
}
