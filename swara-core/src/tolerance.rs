//! # Tolerance Module
//!
//! Judges a cents deviation against the singer's tolerance setting: whether it
//! counts as a match, a graded accuracy percentage and display labels.

use serde::{Deserialize, Serialize};

/// Deviations at or below this are displayed as "Perfect".
pub const PERFECT_CENTS: u32 = 15;
/// Deviations at or below this are displayed as "Very good".
pub const VERY_GOOD_CENTS: u32 = 35;

/// Whether a deviation is within tolerance. The boundary is inclusive.
pub fn is_match(deviation_cents: i32, tolerance_cents: u32) -> bool {
    deviation_cents.unsigned_abs() <= tolerance_cents
}

/// Linear accuracy score in `0..=100`.
///
/// 100 only at an exact match, falling to 0 at the tolerance edge and beyond.
pub fn accuracy_percent(deviation_cents: i32, tolerance_cents: u32) -> u8 {
    let distance = deviation_cents.unsigned_abs();
    if tolerance_cents == 0 {
        return if distance == 0 { 100 } else { 0 };
    }
    let score = 100.0 - distance as f32 * 100.0 / tolerance_cents as f32;
    score.clamp(0.0, 100.0).floor() as u8
}

/// Qualitative name for a tolerance setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToleranceLevel {
    Expert,
    Strict,
    Medium,
    Easy,
    Beginner,
}

impl ToleranceLevel {
    pub fn label(self) -> &'static str {
        match self {
            ToleranceLevel::Expert => "Expert",
            ToleranceLevel::Strict => "Strict",
            ToleranceLevel::Medium => "Medium",
            ToleranceLevel::Easy => "Easy",
            ToleranceLevel::Beginner => "Beginner",
        }
    }
}

/// Maps a tolerance in cents to its qualitative level.
pub fn tolerance_level(tolerance_cents: u32) -> ToleranceLevel {
    match tolerance_cents {
        0..=20 => ToleranceLevel::Expert,
        21..=35 => ToleranceLevel::Strict,
        36..=50 => ToleranceLevel::Medium,
        51..=75 => ToleranceLevel::Easy,
        _ => ToleranceLevel::Beginner,
    }
}

/// Display feedback for a single sung sample. Never drives state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feedback {
    Perfect,
    VeryGood,
    GoodEnough,
    FindTheNote,
}

impl Feedback {
    pub fn message(self) -> &'static str {
        match self {
            Feedback::Perfect => "Perfect!",
            Feedback::VeryGood => "Very good",
            Feedback::GoodEnough => "Good enough",
            Feedback::FindTheNote => "Find the note",
        }
    }
}

/// Grades a deviation for display.
///
/// The fixed bands come first, so a tight tolerance can still show "Perfect"
/// for a sample that does not count as a match.
pub fn feedback(deviation_cents: i32, tolerance_cents: u32) -> Feedback {
    let distance = deviation_cents.unsigned_abs();
    if distance <= PERFECT_CENTS {
        Feedback::Perfect
    } else if distance <= VERY_GOOD_CENTS {
        Feedback::VeryGood
    } else if is_match(deviation_cents, tolerance_cents) {
        Feedback::GoodEnough
    } else {
        Feedback::FindTheNote
    }
}
