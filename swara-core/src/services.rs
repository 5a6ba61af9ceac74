//! # Services Module
//!
//! The collaborators the practice core talks to: a pitch source (microphone
//! plus pitch estimator), a tone synthesizer for reference notes and a
//! key-value store. They report failures as `anyhow` errors; the session
//! driver logs those and carries on.
//!
//! Also provides in-process implementations: a channel-fed pitch source that
//! a capture thread pushes samples into, and an in-memory store.

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::SwaraError;

/// Number of samples buffered between the capture thread and the session.
pub const SAMPLE_QUEUE_SIZE: usize = 64;

/// One estimate from the pitch detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchSample {
    /// Fundamental frequency in Hz; `<= 0` means no pitch was found.
    pub frequency: f32,
    /// Detector confidence in `0.0..=1.0`.
    pub confidence: f32,
    pub timestamp: Instant,
}

impl PitchSample {
    pub fn new(frequency: f32, confidence: f32, timestamp: Instant) -> Self {
        Self { frequency, confidence, timestamp }
    }

    /// False for silence or a failed estimate.
    pub fn has_signal(&self) -> bool {
        self.frequency.is_finite() && self.frequency > 0.0
    }
}

/// Microphone permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Undetermined,
}

/// Live pitch estimates from the microphone.
pub trait PitchSource {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn permission(&self) -> Permission;
    /// Asks the user for microphone access.
    fn request_permission(&mut self) -> Result<Permission>;
    /// Samples in arrival order.
    fn samples(&self) -> &Receiver<PitchSample>;
}

/// Reference tone playback. Only one tone plays at a time.
pub trait ToneSynth {
    fn play(&mut self, frequency_hz: f32, duration: Duration) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn set_volume(&mut self, volume: f32) -> Result<()>;
}

/// Best-effort string storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Handle a capture thread uses to push samples into a [`ChannelPitchSource`].
#[derive(Debug, Clone)]
pub struct PitchFeed {
    sender: Sender<PitchSample>,
    active: Arc<AtomicBool>,
}

impl PitchFeed {
    /// Queues a sample. Returns false when capture is stopped or the queue is full.
    pub fn push(&self, sample: PitchSample) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        match self.sender.try_send(sample) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::trace!("pitch queue full, dropping sample");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// A pitch source fed over a bounded channel by whatever runs the detector.
#[derive(Debug)]
pub struct ChannelPitchSource {
    sender: Sender<PitchSample>,
    receiver: Receiver<PitchSample>,
    active: Arc<AtomicBool>,
    permission: Permission,
}

impl ChannelPitchSource {
    pub fn new(permission: Permission) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(SAMPLE_QUEUE_SIZE);
        Self {
            sender,
            receiver,
            active: Arc::new(AtomicBool::new(false)),
            permission,
        }
    }

    pub fn feed(&self) -> PitchFeed {
        PitchFeed {
            sender: self.sender.clone(),
            active: Arc::clone(&self.active),
        }
    }

    pub fn set_permission(&mut self, permission: Permission) {
        self.permission = permission;
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl PitchSource for ChannelPitchSource {
    fn start(&mut self) -> Result<()> {
        if self.permission != Permission::Granted {
            return Err(SwaraError::PermissionDenied.into());
        }
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.active.store(false, Ordering::Release);
        // Anything still queued belongs to the capture that just ended.
        let stale = self.receiver.try_iter().count();
        if stale > 0 {
            log::debug!("discarded {stale} queued pitch samples on stop");
        }
        Ok(())
    }

    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Result<Permission> {
        Ok(self.permission)
    }

    fn samples(&self) -> &Receiver<PitchSample> {
        &self.receiver
    }
}

/// A [`KeyValueStore`] that lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_is_ignored_until_started() {
        let mut source = ChannelPitchSource::new(Permission::Granted);
        let feed = source.feed();
        let now = Instant::now();
        assert!(!feed.push(PitchSample::new(220.0, 0.9, now)));

        source.start().unwrap();
        assert!(feed.push(PitchSample::new(220.0, 0.9, now)));
        assert!(feed.push(PitchSample::new(221.0, 0.9, now)));
        let got: Vec<f32> = source.samples().try_iter().map(|s| s.frequency).collect();
        assert_eq!(got, vec![220.0, 221.0]);
    }

    #[test]
    fn stop_discards_queued_samples() {
        let mut source = ChannelPitchSource::new(Permission::Granted);
        let feed = source.feed();
        source.start().unwrap();
        feed.push(PitchSample::new(220.0, 0.9, Instant::now()));
        source.stop().unwrap();
        assert!(source.samples().try_recv().is_err());
        assert!(!source.is_active());
    }

    #[test]
    fn start_requires_permission() {
        let mut source = ChannelPitchSource::new(Permission::Denied);
        let err = source.start().unwrap_err();
        assert_eq!(err.downcast_ref::<SwaraError>(), Some(&SwaraError::PermissionDenied));
        assert!(!source.is_active());
        source.set_permission(Permission::Granted);
        assert!(source.start().is_ok());
    }

    #[test]
    fn silence_has_no_signal() {
        let now = Instant::now();
        assert!(!PitchSample::new(0.0, 1.0, now).has_signal());
        assert!(!PitchSample::new(-5.0, 1.0, now).has_signal());
        assert!(PitchSample::new(110.0, 0.1, now).has_signal());
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
