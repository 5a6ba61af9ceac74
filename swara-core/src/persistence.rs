//! # Persistence Module
//!
//! Shape of the saved state and best-effort load/save through a
//! [`KeyValueStore`]. Every value is stored as JSON under a fixed key.
//! Loads never fail: a missing, unreadable or malformed value falls back to
//! its default and the problem is logged.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{Result, SwaraError};
use crate::raag::ProgressBook;
use crate::services::KeyValueStore;
use crate::session::PracticeMode;
use crate::settings::PracticeSettings;

pub const TONIC_KEY: &str = "swara.tonic";
pub const SETTINGS_KEY: &str = "swara.settings";
pub const PROGRESS_KEY: &str = "swara.raag_progress";
pub const SESSION_KEY: &str = "swara.session";

/// Where the last session stood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub mode: PracticeMode,
    pub level_index: usize,
    pub sequence_index: usize,
    pub stars: u8,
    pub mistakes: u8,
}

/// Everything restored at startup.
#[derive(Debug, Clone, Default)]
pub struct SavedState {
    pub tonic: Option<f32>,
    pub settings: PracticeSettings,
    pub progress: ProgressBook,
    pub session: Option<SessionRecord>,
}

pub fn load_state<S: KeyValueStore + ?Sized>(store: &S) -> SavedState {
    let tonic = load_json::<f32, _>(store, TONIC_KEY).filter(|hz| {
        let valid = hz.is_finite() && *hz > 0.0;
        if !valid {
            log::warn!("ignoring stored tonic {hz}");
        }
        valid
    });
    SavedState {
        tonic,
        settings: load_json(store, SETTINGS_KEY).unwrap_or_default(),
        progress: load_json(store, PROGRESS_KEY).unwrap_or_default(),
        session: load_json(store, SESSION_KEY),
    }
}

/// Reads and decodes `key`, returning `None` (and logging) on any problem.
pub fn load_json<T, S>(store: &S, key: &str) -> Option<T>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("failed to read {key}: {e:#}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("discarding malformed {key}: {e}");
            None
        }
    }
}

/// Encodes `value` and writes it under `key`.
pub fn save_json<T, S>(store: &mut S, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let raw = serde_json::to_string(value)
        .map_err(|e| SwaraError::PersistenceFailure(format!("{key}: {e}")))?;
    store
        .set(key, &raw)
        .map_err(|e| SwaraError::PersistenceFailure(format!("{key}: {e:#}")))
}
