//! # Swara Module
//!
//! Maps sargam note symbols to frequencies relative to a user-chosen tonic (Sa),
//! measures cents deviation between two frequencies and classifies a sung
//! frequency as the nearest swara.
//!
//! ## Notation
//! - `S r R g G M m P d D n N`: uppercase is the shuddha (natural) degree,
//!   lowercase is its variant (komal for Re/Ga/Dha/Ni, tivra for Ma).
//! - `'` raises a note by one octave per occurrence (`S'` is upper Sa).
//! - `.` lowers a note by one octave per occurrence (`N.` or `.N` is lower Ni).
//!
//! ## Features
//! - Equal-tempered and just-intonation ratio tables
//! - Cent deviation calculations for singing accuracy
//! - Nearest-swara search across three registers
//! - Piano-key table for manual tonic selection

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SwaraError};

/// Nearest-note searches give up when the best candidate is further than this.
pub const AMBIGUITY_CEILING_CENTS: i32 = 150;

const RAISE_MARKER: char = '\'';
const LOWER_MARKER: char = '.';

/// One of the twelve chromatic scale degrees relative to Sa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Swara {
    Sa,
    KomalRe,
    Re,
    KomalGa,
    Ga,
    Ma,
    TivraMa,
    Pa,
    KomalDha,
    Dha,
    KomalNi,
    Ni,
}

impl Swara {
    /// All twelve swaras in ascending order from Sa.
    pub const ALL: [Swara; 12] = [
        Swara::Sa,
        Swara::KomalRe,
        Swara::Re,
        Swara::KomalGa,
        Swara::Ga,
        Swara::Ma,
        Swara::TivraMa,
        Swara::Pa,
        Swara::KomalDha,
        Swara::Dha,
        Swara::KomalNi,
        Swara::Ni,
    ];

    /// Semitones above Sa (0..=11).
    pub fn semitones(self) -> u8 {
        self as u8
    }

    /// The single-letter sargam symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Swara::Sa => "S",
            Swara::KomalRe => "r",
            Swara::Re => "R",
            Swara::KomalGa => "g",
            Swara::Ga => "G",
            Swara::Ma => "M",
            Swara::TivraMa => "m",
            Swara::Pa => "P",
            Swara::KomalDha => "d",
            Swara::Dha => "D",
            Swara::KomalNi => "n",
            Swara::Ni => "N",
        }
    }

    /// Looks up a bare symbol (no octave markers).
    pub fn from_symbol(symbol: &str) -> Option<Swara> {
        Swara::ALL.into_iter().find(|s| s.symbol() == symbol)
    }

    /// Frequency ratio of this swara over Sa under the given tuning system.
    pub fn ratio(self, tuning: TuningSystem) -> f32 {
        match tuning {
            TuningSystem::EqualTempered => 2.0_f32.powf(self.semitones() as f32 / 12.0),
            TuningSystem::JustIntonation => {
                let (num, den) = JUST_RATIOS[self as usize];
                num / den
            }
        }
    }
}

/// Small-integer ratios for each swara, indexed by semitone offset.
const JUST_RATIOS: [(f32, f32); 12] = [
    (1.0, 1.0),
    (16.0, 15.0),
    (9.0, 8.0),
    (6.0, 5.0),
    (5.0, 4.0),
    (4.0, 3.0),
    (45.0, 32.0),
    (3.0, 2.0),
    (8.0, 5.0),
    (5.0, 3.0),
    (9.0, 5.0),
    (15.0, 8.0),
];

/// How swara ratios are derived from the tonic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuningSystem {
    /// `tonic * 2^(semitones / 12)`
    #[default]
    EqualTempered,
    /// Small-integer ratios (9/8, 5/4, 3/2, ...).
    JustIntonation,
}

/// What to do with a symbol that is not one of the twelve known swaras.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotePolicy {
    /// Resolve unknown symbols to Sa (offset 0).
    #[default]
    TreatAsTonic,
    /// Fail with `SwaraError::InvalidNote`.
    Reject,
}

/// A swara with an octave shift relative to the tonic's register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub swara: Swara,
    /// Positive for raise markers, negative for lower markers.
    pub octave: i8,
}

impl Note {
    pub fn new(swara: Swara, octave: i8) -> Self {
        Self { swara, octave }
    }

    /// Parses a symbol with optional octave markers, rejecting unknown symbols.
    pub fn parse(text: &str) -> Result<Note> {
        Note::parse_with(text, NotePolicy::Reject)
    }

    /// Parses a symbol with optional octave markers.
    ///
    /// Mixing raise and lower markers on the same symbol is always rejected.
    /// Unknown base symbols follow `policy`.
    pub fn parse_with(text: &str, policy: NotePolicy) -> Result<Note> {
        let trimmed = text.trim();
        let raise = trimmed.matches(RAISE_MARKER).count();
        let lower = trimmed.matches(LOWER_MARKER).count();
        if raise > 0 && lower > 0 {
            return Err(SwaraError::InvalidNote(trimmed.to_string()));
        }

        let base: String = trimmed
            .chars()
            .filter(|&c| c != RAISE_MARKER && c != LOWER_MARKER)
            .collect();
        if base.is_empty() {
            return Err(SwaraError::InvalidNote(trimmed.to_string()));
        }

        let swara = match (Swara::from_symbol(&base), policy) {
            (Some(swara), _) => swara,
            (None, NotePolicy::TreatAsTonic) => {
                log::debug!("unknown swara {base:?}, treating as Sa");
                Swara::Sa
            }
            (None, NotePolicy::Reject) => {
                return Err(SwaraError::InvalidNote(trimmed.to_string()));
            }
        };

        let shift = i8::try_from(raise.max(lower))
            .map_err(|_| SwaraError::InvalidNote(trimmed.to_string()))?;
        let octave = if lower > 0 { -shift } else { shift };

        Ok(Note { swara, octave })
    }

    /// Absolute frequency of this note for the given tonic.
    pub fn frequency(&self, tonic_hz: f32, tuning: TuningSystem) -> f32 {
        tonic_hz * self.swara.ratio(tuning) * 2.0_f32.powi(self.octave as i32)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.swara.symbol())?;
        let marker = if self.octave < 0 { LOWER_MARKER } else { RAISE_MARKER };
        for _ in 0..self.octave.unsigned_abs() {
            write!(f, "{marker}")?;
        }
        Ok(())
    }
}

/// Frequency in Hz of an octave-qualified symbol relative to `tonic_hz`.
///
/// # Arguments
/// * `tonic_hz` - The singer's Sa in Hz
/// * `symbol` - Swara symbol with octave markers (e.g. "S", "d.", "R'")
/// * `tuning` - Ratio table to use
/// * `policy` - What to do with an unknown symbol
///
/// # Returns
/// * Target frequency in Hz, or `InvalidNote`/`InvalidInput`
pub fn frequency_of(
    tonic_hz: f32,
    symbol: &str,
    tuning: TuningSystem,
    policy: NotePolicy,
) -> Result<f32> {
    ensure_positive(tonic_hz, "tonic")?;
    let note = Note::parse_with(symbol, policy)?;
    Ok(note.frequency(tonic_hz, tuning))
}

/// Calculates the deviation of `measured` from `target` in whole cents.
///
/// Positive values are sharp, negative values are flat. 100 cents is one
/// equal-tempered semitone and 1200 cents is one octave.
///
/// # Arguments
/// * `measured_hz` - Sung frequency in Hz
/// * `target_hz` - Target frequency in Hz
///
/// # Returns
/// * Rounded cent deviation, or `InvalidInput` for a non-positive frequency
pub fn cents_deviation(measured_hz: f32, target_hz: f32) -> Result<i32> {
    ensure_positive(measured_hz, "measured frequency")?;
    ensure_positive(target_hz, "target frequency")?;
    Ok(cents_between(measured_hz, target_hz).round() as i32)
}

fn cents_between(measured_hz: f32, target_hz: f32) -> f32 {
    1200.0 * (measured_hz / target_hz).log2()
}

fn ensure_positive(hz: f32, what: &str) -> Result<()> {
    if hz.is_finite() && hz > 0.0 {
        Ok(())
    } else {
        Err(SwaraError::InvalidInput(format!("{what} must be > 0 Hz, got {hz}")))
    }
}

/// The swara closest to a sung frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestNote {
    pub note: Note,
    pub deviation_cents: i32,
}

/// Finds the swara closest to `measured_hz`.
///
/// Searches all twelve swaras in the tonic's register and one octave above
/// and below. Returns `Ok(None)` when even the best candidate is further than
/// [`AMBIGUITY_CEILING_CENTS`].
///
/// # Arguments
/// * `measured_hz` - Sung frequency in Hz
/// * `tonic_hz` - The singer's Sa in Hz
/// * `tuning` - Ratio table to use
///
/// # Returns
/// * Closest note and its deviation, if one is within range
pub fn nearest_note(
    measured_hz: f32,
    tonic_hz: f32,
    tuning: TuningSystem,
) -> Result<Option<NearestNote>> {
    ensure_positive(measured_hz, "measured frequency")?;
    ensure_positive(tonic_hz, "tonic")?;

    let best = [-1_i8, 0, 1]
        .into_iter()
        .flat_map(|octave| Swara::ALL.into_iter().map(move |swara| Note::new(swara, octave)))
        .map(|note| (note, cents_between(measured_hz, note.frequency(tonic_hz, tuning))))
        .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));

    Ok(best.and_then(|(note, cents)| {
        let deviation_cents = cents.round() as i32;
        (deviation_cents.abs() <= AMBIGUITY_CEILING_CENTS).then_some(NearestNote {
            note,
            deviation_cents,
        })
    }))
}

/// A piano key offered for manual tonic selection.
#[derive(Debug, Clone)]
pub struct PianoKey {
    /// Key name (e.g., "C3", "F#4")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// Keys C3 through B4, the usual range for a singer's Sa.
///
/// Frequencies use equal temperament with A4 = 440 Hz, indexed the way an
/// 88-key piano is (A0 = 0), so C3 is key 27 and B4 is key 50.
static PIANO_KEYS: Lazy<Vec<PianoKey>> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
    ];
    (27..=50)
        .map(|i: usize| {
            let frequency = 440.0 * 2.0_f32.powf((i as f32 - 48.0) / 12.0);
            // The octave number changes at C.
            let octave = (i + 9) / 12;
            PianoKey {
                name: format!("{}{}", NOTE_NAMES[i % 12], octave),
                frequency,
            }
        })
        .collect()
});

/// All keys available for manual tonic selection, lowest first.
pub fn piano_keys() -> &'static [PianoKey] {
    &PIANO_KEYS
}

/// Looks up a tonic key by name (e.g. "C#3").
pub fn piano_key(name: &str) -> Option<&'static PianoKey> {
    PIANO_KEYS.iter().find(|k| k.name == name)
}

/// The piano key closest to a detected frequency, compared in cents.
pub fn nearest_piano_key(freq: f32) -> Option<&'static PianoKey> {
    if !(freq.is_finite() && freq > 0.0) {
        return None;
    }
    PIANO_KEYS.iter().min_by(|a, b| {
        cents_between(freq, a.frequency)
            .abs()
            .total_cmp(&cents_between(freq, b.frequency).abs())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tonic_symbol_maps_to_tonic() {
        let hz = frequency_of(220.0, "S", TuningSystem::EqualTempered, NotePolicy::Reject).unwrap();
        assert_relative_eq!(hz, 220.0);
    }

    #[test]
    fn raise_marker_doubles_every_swara() {
        for tuning in [TuningSystem::EqualTempered, TuningSystem::JustIntonation] {
            for swara in Swara::ALL {
                let base = frequency_of(196.0, swara.symbol(), tuning, NotePolicy::Reject).unwrap();
                let up = format!("{}'", swara.symbol());
                let raised = frequency_of(196.0, &up, tuning, NotePolicy::Reject).unwrap();
                assert_relative_eq!(raised, 2.0 * base, max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn lower_marker_accepted_on_either_side() {
        let suffix = Note::parse("N.").unwrap();
        let prefix = Note::parse(".N").unwrap();
        assert_eq!(suffix, prefix);
        assert_eq!(suffix, Note::new(Swara::Ni, -1));
        assert_eq!(Note::parse("P..").unwrap().octave, -2);
    }

    #[test]
    fn equal_tempered_pa_is_seven_semitones() {
        let pa = frequency_of(220.0, "P", TuningSystem::EqualTempered, NotePolicy::Reject).unwrap();
        assert_relative_eq!(pa, 329.6276, max_relative = 1e-4);
        let just = frequency_of(220.0, "P", TuningSystem::JustIntonation, NotePolicy::Reject).unwrap();
        assert_relative_eq!(just, 330.0);
    }

    #[test]
    fn mixed_markers_are_rejected() {
        assert!(matches!(Note::parse("S'."), Err(SwaraError::InvalidNote(_))));
        assert!(matches!(
            Note::parse_with(".S'", NotePolicy::TreatAsTonic),
            Err(SwaraError::InvalidNote(_))
        ));
    }

    #[test]
    fn unknown_symbol_follows_policy() {
        let lenient = frequency_of(220.0, "X", TuningSystem::EqualTempered, NotePolicy::TreatAsTonic).unwrap();
        assert_relative_eq!(lenient, 220.0);
        assert_eq!(
            frequency_of(220.0, "X", TuningSystem::EqualTempered, NotePolicy::Reject),
            Err(SwaraError::InvalidNote("X".to_string()))
        );
        assert!(Note::parse_with("''", NotePolicy::TreatAsTonic).is_err());
    }

    #[test]
    fn display_round_trips_markers() {
        assert_eq!(Note::new(Swara::Sa, 1).to_string(), "S'");
        assert_eq!(Note::new(Swara::KomalDha, -1).to_string(), "d.");
        assert_eq!(Note::new(Swara::TivraMa, 0).to_string(), "m");
    }

    #[test]
    fn cents_is_antisymmetric() {
        for (a, b) in [(220.0, 230.0), (110.0, 440.0), (261.6, 259.0)] {
            assert_eq!(cents_deviation(a, b).unwrap(), -cents_deviation(b, a).unwrap());
        }
        assert_eq!(cents_deviation(317.3, 317.3).unwrap(), 0);
        assert_eq!(cents_deviation(440.0, 220.0).unwrap(), 1200);
    }

    #[test]
    fn cents_rejects_non_positive_input() {
        assert!(matches!(cents_deviation(0.0, 220.0), Err(SwaraError::InvalidInput(_))));
        assert!(matches!(cents_deviation(220.0, -1.0), Err(SwaraError::InvalidInput(_))));
        assert!(matches!(cents_deviation(f32::NAN, 220.0), Err(SwaraError::InvalidInput(_))));
    }

    #[test]
    fn nearest_note_finds_ga_in_upper_register() {
        let tonic = 220.0;
        let ga_upper = Note::new(Swara::Ga, 1).frequency(tonic, TuningSystem::EqualTempered);
        let found = nearest_note(ga_upper * 1.005, tonic, TuningSystem::EqualTempered)
            .unwrap()
            .unwrap();
        assert_eq!(found.note, Note::new(Swara::Ga, 1));
        assert_eq!(found.deviation_cents, 9);
    }

    #[test]
    fn nearest_note_gives_up_outside_three_registers() {
        // Two octaves above Sa is far beyond the upper register's Ni.
        let result = nearest_note(220.0 * 4.0 * 1.1, 220.0, TuningSystem::EqualTempered).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn piano_table_spans_c3_to_b4() {
        let keys = piano_keys();
        assert_eq!(keys.len(), 24);
        assert_eq!(keys[0].name, "C3");
        assert_eq!(keys[23].name, "B4");
        assert_relative_eq!(piano_key("A3").unwrap().frequency, 220.0, max_relative = 1e-5);
        assert_eq!(nearest_piano_key(139.0).unwrap().name, "C#3");
        assert!(nearest_piano_key(0.0).is_none());
    }
}
