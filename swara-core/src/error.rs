//! # Error Module
//!
//! Typed errors for the practice core. The algorithmic modules fail fast with
//! these; only the session layer turns them into user-facing notices.

use thiserror::Error;

/// Errors produced by the swara practice core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SwaraError {
    /// Microphone access was refused by the user or the platform.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// A note frequency was requested before a tonic (Sa) was committed.
    #[error("no tonic (Sa) has been set")]
    NoTonicSet,

    /// A note symbol could not be resolved and the fallback is disabled.
    #[error("invalid note symbol: {0:?}")]
    InvalidNote(String),

    /// A numeric argument was outside its domain (e.g. a non-positive frequency).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A pitch sample was too quiet or uncertain to be judged.
    #[error("signal too weak (confidence {confidence:.2})")]
    SignalTooWeak { confidence: f32 },

    /// A key-value store read or write failed.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// The session received an event that is not valid in its current phase.
    #[error("event {event} is not valid in phase {phase}")]
    InvalidTransition {
        phase: &'static str,
        event: &'static str,
    },

    /// The raag catalog has no entry with this name.
    #[error("unknown raag: {0}")]
    UnknownRaag(String),
}

/// Result alias used across the core.
pub type Result<T> = std::result::Result<T, SwaraError>;
