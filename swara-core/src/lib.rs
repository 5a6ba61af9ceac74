// swara-core/src/lib.rs

//! The core logic for the swara vocal trainer.
//! This crate converts sung pitch into intervals relative to the singer's
//! tonic (Sa), judges them against target swaras and runs the practice
//! session. It is completely headless: pitch detection, tone synthesis and
//! storage are collaborators supplied by the host.

pub mod error;
pub mod hold;
pub mod persistence;
pub mod raag;
pub mod services;
pub mod session;
pub mod settings;
pub mod stability;
pub mod swara;
pub mod tolerance;

pub use error::{Result, SwaraError};
pub use services::PitchSample;
pub use session::{Effect, Event, Notice, Phase, PracticeDriver, PracticeMode, PracticeSession};
pub use settings::PracticeSettings;
pub use swara::{Note, Swara, TuningSystem};
