//! # Session Module
//!
//! The practice session: setup, Sa detection, listening to the reference,
//! practicing with live pitch, level completion and mistake handling.
//!
//! [`PracticeSession`] is the pure state machine; [`PracticeDriver`] owns the
//! audio, capture and storage collaborators and carries out its effects.

mod driver;
mod machine;
mod plan;

pub use driver::PracticeDriver;
pub use machine::{
    Effect, Event, LiveReading, MAX_MISTAKES, Notice, Phase, Playback, PracticeSession, Retry,
};
pub use plan::{Level, LevelKind, MAX_STARS, PracticeMode, PracticePlan};
