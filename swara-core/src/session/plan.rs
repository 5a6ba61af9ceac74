//! Practice modes and the level plan a session works through.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::raag::{Raag, RaagCatalog, SequenceKind};
use crate::swara::Note;

/// Stars needed to pass a level in the level game.
pub const MAX_STARS: u8 = 5;

/// What the user chose to practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PracticeMode {
    /// Free practice of a single swara.
    Swara(Note),
    /// Level game: vadi, samvadi, arohi, avrohi, pakad.
    RaagLevels { raag: String },
    /// One pass of each unfinished sequence until the raag is mastered.
    RaagSequence { raag: String, start: SequenceKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    Swara,
    Vadi,
    Samvadi,
    Sequence(SequenceKind),
}

impl LevelKind {
    pub fn name(self) -> &'static str {
        match self {
            LevelKind::Swara => "swara",
            LevelKind::Vadi => "vadi",
            LevelKind::Samvadi => "samvadi",
            LevelKind::Sequence(kind) => kind.name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub kind: LevelKind,
    pub notes: Vec<Note>,
    /// Completed passes needed before moving on.
    pub stars_to_pass: u8,
}

/// The resolved levels for a practice mode.
#[derive(Debug, Clone, PartialEq)]
pub struct PracticePlan {
    pub mode: PracticeMode,
    pub raag: Option<Raag>,
    pub levels: Vec<Level>,
    /// Level the session starts on.
    pub start_level: usize,
}

impl PracticePlan {
    /// Resolves `mode` against `catalog`.
    pub fn build(mode: PracticeMode, catalog: &dyn RaagCatalog) -> Result<PracticePlan> {
        let plan = match &mode {
            PracticeMode::Swara(note) => PracticePlan {
                raag: None,
                levels: vec![Level {
                    kind: LevelKind::Swara,
                    notes: vec![*note],
                    stars_to_pass: MAX_STARS,
                }],
                start_level: 0,
                mode,
            },
            PracticeMode::RaagLevels { raag } => {
                let raag = catalog.get(raag)?;
                let mut levels = vec![
                    Level {
                        kind: LevelKind::Vadi,
                        notes: vec![raag.vadi],
                        stars_to_pass: MAX_STARS,
                    },
                    Level {
                        kind: LevelKind::Samvadi,
                        notes: vec![raag.samvadi],
                        stars_to_pass: MAX_STARS,
                    },
                ];
                levels.extend(SequenceKind::ALL.into_iter().map(|kind| Level {
                    kind: LevelKind::Sequence(kind),
                    notes: raag.sequence(kind).to_vec(),
                    stars_to_pass: MAX_STARS,
                }));
                PracticePlan {
                    raag: Some(raag),
                    levels,
                    start_level: 0,
                    mode,
                }
            }
            PracticeMode::RaagSequence { raag, start } => {
                let raag = catalog.get(raag)?;
                let levels = SequenceKind::ALL
                    .into_iter()
                    .map(|kind| Level {
                        kind: LevelKind::Sequence(kind),
                        notes: raag.sequence(kind).to_vec(),
                        stars_to_pass: 1,
                    })
                    .collect();
                PracticePlan {
                    raag: Some(raag),
                    levels,
                    start_level: sequence_level(*start),
                    mode,
                }
            }
        };
        Ok(plan)
    }

    pub fn raag_name(&self) -> Option<&str> {
        self.raag.as_ref().map(|r| r.name.as_str())
    }
}

/// Index of a sequence's level in a sequence-practice plan.
pub(crate) fn sequence_level(kind: SequenceKind) -> usize {
    SequenceKind::ALL.iter().position(|k| *k == kind).unwrap_or(0)
}
