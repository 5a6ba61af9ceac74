//! # Raag Module
//!
//! Raag definitions (arohi, avrohi, pakad, vadi, samvadi), the catalog they
//! are looked up from, and the per-raag progress book that is saved between
//! sessions.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Result, SwaraError};
use crate::swara::{Note, NotePolicy};

/// The three canonical sequences of a raag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceKind {
    /// Ascending line.
    Arohi,
    /// Descending line.
    Avrohi,
    /// Signature phrase.
    Pakad,
}

impl SequenceKind {
    pub const ALL: [SequenceKind; 3] = [SequenceKind::Arohi, SequenceKind::Avrohi, SequenceKind::Pakad];

    pub fn name(self) -> &'static str {
        match self {
            SequenceKind::Arohi => "arohi",
            SequenceKind::Avrohi => "avrohi",
            SequenceKind::Pakad => "pakad",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raag {
    pub name: String,
    pub arohi: Vec<Note>,
    pub avrohi: Vec<Note>,
    pub pakad: Vec<Note>,
    /// Most important note.
    pub vadi: Note,
    /// Second most important note.
    pub samvadi: Note,
}

impl Raag {
    /// Builds a raag from space-delimited sequences (e.g. `"S R G M P D N S'"`).
    pub fn from_notation(
        name: &str,
        arohi: &str,
        avrohi: &str,
        pakad: &str,
        vadi: &str,
        samvadi: &str,
        policy: NotePolicy,
    ) -> Result<Raag> {
        Ok(Raag {
            name: name.to_string(),
            arohi: parse_sequence(arohi, policy)?,
            avrohi: parse_sequence(avrohi, policy)?,
            pakad: parse_sequence(pakad, policy)?,
            vadi: Note::parse_with(vadi, policy)?,
            samvadi: Note::parse_with(samvadi, policy)?,
        })
    }

    pub fn sequence(&self, kind: SequenceKind) -> &[Note] {
        match kind {
            SequenceKind::Arohi => &self.arohi,
            SequenceKind::Avrohi => &self.avrohi,
            SequenceKind::Pakad => &self.pakad,
        }
    }
}

/// Parses a space-delimited list of octave-qualified swaras.
pub fn parse_sequence(text: &str, policy: NotePolicy) -> Result<Vec<Note>> {
    let notes = text
        .split_whitespace()
        .map(|symbol| Note::parse_with(symbol, policy))
        .collect::<Result<Vec<_>>>()?;
    if notes.is_empty() {
        return Err(SwaraError::InvalidNote(text.to_string()));
    }
    Ok(notes)
}

/// Source of raag definitions.
pub trait RaagCatalog {
    fn lookup(&self, name: &str) -> Option<Raag>;

    fn names(&self) -> Vec<String>;

    /// Like [`RaagCatalog::lookup`] but fails with `UnknownRaag`.
    fn get(&self, name: &str) -> Result<Raag> {
        self.lookup(name)
            .ok_or_else(|| SwaraError::UnknownRaag(name.to_string()))
    }
}

/// name, arohi, avrohi, pakad, vadi, samvadi
const BUILTIN_NOTATION: [[&str; 6]; 6] = [
    ["Bilawal", "S R G M P D N S'", "S' N D P M G R S", "G R G P D N S'", "D", "G"],
    ["Yaman", "N. R G m D N S'", "S' N D P m G R S", "N. R G R S P m G R S", "G", "N"],
    ["Bhupali", "S R G P D S'", "S' D P G R S", "G R S D. S R G P G D P G R S", "G", "D"],
    ["Bhairav", "S r G M P d N S'", "S' N d P M G r S", "G M d P G M r S", "d", "r"],
    ["Kafi", "S R g M P D n S'", "S' n D P M g R S", "S R g M P M g R S", "P", "S"],
    ["Khamaj", "S G M P D N S'", "S' n D P M G R S", "n D M P D M G", "G", "N"],
];

static BUILTIN_RAAGS: Lazy<Vec<Raag>> = Lazy::new(|| {
    BUILTIN_NOTATION
        .iter()
        .filter_map(|[name, arohi, avrohi, pakad, vadi, samvadi]| {
            Raag::from_notation(name, arohi, avrohi, pakad, vadi, samvadi, NotePolicy::Reject)
                .map_err(|e| log::error!("built-in raag {name} is malformed: {e}"))
                .ok()
        })
        .collect()
});

/// The raags shipped with the app.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl RaagCatalog for BuiltinCatalog {
    fn lookup(&self, name: &str) -> Option<Raag> {
        BUILTIN_RAAGS
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    fn names(&self) -> Vec<String> {
        BUILTIN_RAAGS.iter().map(|r| r.name.clone()).collect()
    }
}

/// Which sequences of one raag have been completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaagProgress {
    pub arohi: bool,
    pub avrohi: bool,
    pub pakad: bool,
}

impl RaagProgress {
    pub fn is_done(&self, kind: SequenceKind) -> bool {
        match kind {
            SequenceKind::Arohi => self.arohi,
            SequenceKind::Avrohi => self.avrohi,
            SequenceKind::Pakad => self.pakad,
        }
    }

    pub fn mark(&mut self, kind: SequenceKind) {
        match kind {
            SequenceKind::Arohi => self.arohi = true,
            SequenceKind::Avrohi => self.avrohi = true,
            SequenceKind::Pakad => self.pakad = true,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.arohi && self.avrohi && self.pakad
    }

    /// First unfinished sequence at or after `from`, wrapping around.
    pub fn next_pending(&self, from: SequenceKind) -> Option<SequenceKind> {
        let start = SequenceKind::ALL.iter().position(|k| *k == from).unwrap_or(0);
        (0..SequenceKind::ALL.len())
            .map(|i| SequenceKind::ALL[(start + i) % SequenceKind::ALL.len()])
            .find(|k| !self.is_done(*k))
    }
}

/// Progress for every raag practiced, plus the set of mastered raags.
///
/// This is the top-level object saved to and loaded from the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressBook {
    // Sorted maps keep the saved JSON stable.
    pub raags: BTreeMap<String, RaagProgress>,
    /// Only ever grows.
    pub mastered: BTreeSet<String>,
}

impl ProgressBook {
    pub fn progress(&self, raag: &str) -> RaagProgress {
        self.raags.get(raag).copied().unwrap_or_default()
    }

    pub fn is_mastered(&self, raag: &str) -> bool {
        self.mastered.contains(raag)
    }

    /// Records a completed sequence. Returns true if this made the raag mastered.
    pub fn complete_sequence(&mut self, raag: &str, kind: SequenceKind) -> bool {
        let progress = self.raags.entry(raag.to_string()).or_default();
        progress.mark(kind);
        progress.is_complete() && self.mastered.insert(raag.to_string())
    }
}
