//! Runs a [`PracticeSession`] against real collaborators.
//!
//! The host owns one driver, feeds it user actions through [`PracticeDriver::dispatch`]
//! and calls [`PracticeDriver::pump`] every 50-100 ms. Collaborator failures
//! are logged and skipped; they never abort the session.

use std::collections::VecDeque;
use std::time::Instant;

use crate::error::{Result, SwaraError};
use crate::persistence::{self, PROGRESS_KEY, SESSION_KEY, SETTINGS_KEY, SessionRecord, TONIC_KEY};
use crate::raag::{BuiltinCatalog, RaagCatalog};
use crate::services::{KeyValueStore, Permission, PitchSource, ToneSynth};

use super::machine::{Effect, Event, Notice, PracticeSession};
use super::plan::{PracticeMode, PracticePlan};

pub struct PracticeDriver<P, T, S, C = BuiltinCatalog>
where
    P: PitchSource,
    T: ToneSynth,
    S: KeyValueStore,
    C: RaagCatalog,
{
    session: PracticeSession,
    pitch: P,
    synth: T,
    store: S,
    catalog: C,
    capturing: bool,
    notices: Vec<Notice>,
    last_record: Option<SessionRecord>,
}

impl<P, T, S, C> PracticeDriver<P, T, S, C>
where
    P: PitchSource,
    T: ToneSynth,
    S: KeyValueStore,
    C: RaagCatalog,
{
    /// Restores saved state from `store` and prepares a session in Setup.
    pub fn new(pitch: P, mut synth: T, store: S, catalog: C) -> Self {
        let saved = persistence::load_state(&store);
        let mut session = PracticeSession::new(saved.settings, saved.tonic, saved.progress);
        session.set_microphone_permission(pitch.permission() == Permission::Granted);
        if let Err(e) = synth.set_volume(session.settings().volume) {
            log::warn!("failed to set reference volume: {e:#}");
        }
        Self {
            session,
            pitch,
            synth,
            store,
            catalog,
            capturing: false,
            notices: Vec::new(),
            last_record: saved.session,
        }
    }

    pub fn session(&self) -> &PracticeSession {
        &self.session
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn pitch_source(&self) -> &P {
        &self.pitch
    }

    pub fn pitch_source_mut(&mut self) -> &mut P {
        &mut self.pitch
    }

    pub fn synth(&self) -> &T {
        &self.synth
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Where the previous run of the app left off, if it was saved.
    pub fn last_record(&self) -> Option<&SessionRecord> {
        self.last_record.as_ref()
    }

    /// Notices raised since the last call, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Resolves `mode` against the catalog and selects it.
    pub fn select_mode(&mut self, mode: PracticeMode, now: Instant) -> Result<()> {
        let plan = PracticePlan::build(mode, &self.catalog)?;
        self.dispatch(Event::SelectMode(plan), now)
    }

    /// Applies a user action and carries out its effects.
    ///
    /// Only the action itself can fail; follow-up events raised by the
    /// effects (such as a permission answer) are logged if rejected.
    pub fn dispatch(&mut self, event: Event, now: Instant) -> Result<()> {
        let effects = self.session.handle(event, now)?;
        let mut follow_ups = VecDeque::new();
        self.apply(effects, &mut follow_ups);
        while let Some(event) = follow_ups.pop_front() {
            match self.session.handle(event, now) {
                Ok(effects) => self.apply(effects, &mut follow_ups),
                Err(e) => log::warn!("follow-up event rejected: {e}"),
            }
        }
        Ok(())
    }

    /// Feeds queued pitch samples to the session in arrival order, then ticks.
    ///
    /// Once a sample moves the session to a new target, the rest of the batch
    /// was sung against the old one and is dropped.
    pub fn pump(&mut self, now: Instant) {
        let samples: Vec<_> = self.pitch.samples().try_iter().collect();
        let epoch = self.session.target_epoch();
        for (i, sample) in samples.iter().enumerate() {
            if self.session.target_epoch() != epoch {
                log::debug!("dropping {} samples from the previous target", samples.len() - i);
                break;
            }
            if let Err(e) = self.dispatch(Event::Pitch(*sample), now) {
                log::warn!("pitch sample rejected: {e}");
            }
        }
        if let Err(e) = self.dispatch(Event::Tick, now) {
            log::warn!("tick rejected: {e}");
        }
    }

    /// Stops capture and playback unconditionally.
    pub fn shutdown(&mut self) {
        self.stop_capture();
        self.stop_tone();
    }

    fn apply(&mut self, effects: Vec<Effect>, follow_ups: &mut VecDeque<Event>) {
        for effect in effects {
            match effect {
                Effect::PlayTone { frequency, duration } => {
                    if let Err(e) = self.synth.play(frequency, duration) {
                        log::warn!("failed to play {frequency:.2} Hz: {e:#}");
                    }
                }
                Effect::StopTone => self.stop_tone(),
                Effect::SetVolume(volume) => {
                    if let Err(e) = self.synth.set_volume(volume) {
                        log::warn!("failed to set reference volume: {e:#}");
                    }
                }
                Effect::StartCapture => self.start_capture(),
                Effect::StopCapture => self.stop_capture(),
                Effect::RequestPermission => match self.pitch.request_permission() {
                    Ok(Permission::Granted) => follow_ups.push_back(Event::PermissionResolved(true)),
                    Ok(Permission::Denied) => follow_ups.push_back(Event::PermissionResolved(false)),
                    // The platform prompt is still open; the host reports the answer.
                    Ok(Permission::Undetermined) => {}
                    Err(e) => {
                        log::warn!("permission request failed: {e:#}");
                        follow_ups.push_back(Event::PermissionResolved(false));
                    }
                },
                Effect::SaveTonic(hz) => self.save(TONIC_KEY, &hz),
                Effect::SaveSettings => {
                    let settings = self.session.settings().clone();
                    self.save(SETTINGS_KEY, &settings);
                }
                Effect::SaveProgress => {
                    let progress = self.session.progress().clone();
                    self.save(PROGRESS_KEY, &progress);
                }
                Effect::SaveSession => {
                    if let Some(record) = self.session.record() {
                        self.save(SESSION_KEY, &record);
                    }
                }
                Effect::Notify(notice) => {
                    log::info!("notice: {notice:?}");
                    self.notices.push(notice);
                }
            }
        }
    }

    fn start_capture(&mut self) {
        if self.capturing {
            return;
        }
        match self.pitch.start() {
            Ok(()) => self.capturing = true,
            Err(e) if e.downcast_ref::<SwaraError>() == Some(&SwaraError::PermissionDenied) => {
                log::warn!("pitch capture refused: {e}");
                self.notices.push(Notice::PermissionDenied);
            }
            Err(e) => log::warn!("failed to start pitch capture: {e:#}"),
        }
    }

    fn stop_capture(&mut self) {
        if let Err(e) = self.pitch.stop() {
            log::warn!("failed to stop pitch capture: {e:#}");
        }
        self.capturing = false;
    }

    fn stop_tone(&mut self) {
        if let Err(e) = self.synth.stop() {
            log::warn!("failed to stop reference tone: {e:#}");
        }
    }

    fn save<V: serde::Serialize>(&mut self, key: &str, value: &V) {
        if let Err(e) = persistence::save_json(&mut self.store, key, value) {
            log::warn!("{e}; continuing with in-memory state");
        }
    }
}

impl<P, T, S, C> Drop for PracticeDriver<P, T, S, C>
where
    P: PitchSource,
    T: ToneSynth,
    S: KeyValueStore,
    C: RaagCatalog,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
