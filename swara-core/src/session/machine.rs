//! The practice session state machine.
//!
//! All behavior goes through [`PracticeSession::handle`], which takes the
//! current phase and an event and returns the side effects for the caller to
//! carry out. The session itself never touches audio or storage.

use std::time::Instant;

use crate::error::{Result, SwaraError};
use crate::hold::{HoldEvent, HoldTimer};
use crate::persistence::SessionRecord;
use crate::raag::{ProgressBook, SequenceKind};
use crate::services::PitchSample;
use crate::settings::PracticeSettings;
use crate::stability::{PitchHistory, StabilityFeedback, stability_feedback};
use crate::swara::{self, NearestNote, Note};
use crate::tolerance::{self, Feedback, ToleranceLevel};

use super::plan::{Level, LevelKind, PracticeMode, PracticePlan, sequence_level};

/// Consecutive mistakes that reset the current level.
pub const MAX_MISTAKES: u8 = 3;

/// How a mistake is being handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Replay the reference once this instant has passed.
    At(Instant),
    /// The level was reset; waiting for the user to acknowledge.
    AwaitingAcknowledgement,
}

/// Reference tones still to be played before practice starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Playback {
    pending: Vec<f32>,
    /// When the current tone (or gap) is over.
    next_at: Instant,
    finished: bool,
    awaiting_permission: bool,
}

impl Playback {
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Setup,
    SaDetection { candidate: Option<f32> },
    Listening(Playback),
    Practicing,
    Paused,
    LevelComplete { stars: u8, advanced: bool },
    MistakeHandling(Retry),
    Completed,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Setup => "Setup",
            Phase::SaDetection { .. } => "SaDetection",
            Phase::Listening(_) => "Listening",
            Phase::Practicing => "Practicing",
            Phase::Paused => "Paused",
            Phase::LevelComplete { .. } => "LevelComplete",
            Phase::MistakeHandling(_) => "MistakeHandling",
            Phase::Completed => "Completed",
        }
    }

    fn captures(&self) -> bool {
        matches!(self, Phase::Practicing | Phase::SaDetection { .. })
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    /// Start listening for the singer's Sa.
    DetectTonic,
    /// Commit the detected candidate as the tonic.
    ConfirmTonic,
    /// Commit a tonic directly (e.g. from a piano key).
    SelectTonic(f32),
    SelectMode(PracticePlan),
    StartSession,
    Pitch(PitchSample),
    /// Periodic clock tick.
    Tick,
    PermissionResolved(bool),
    Pause,
    Resume,
    Skip,
    Acknowledge,
    Continue,
    Reset,
    Restart,
    UpdateSettings(PracticeSettings),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::DetectTonic => "DetectTonic",
            Event::ConfirmTonic => "ConfirmTonic",
            Event::SelectTonic(_) => "SelectTonic",
            Event::SelectMode(_) => "SelectMode",
            Event::StartSession => "StartSession",
            Event::Pitch(_) => "Pitch",
            Event::Tick => "Tick",
            Event::PermissionResolved(_) => "PermissionResolved",
            Event::Pause => "Pause",
            Event::Resume => "Resume",
            Event::Skip => "Skip",
            Event::Acknowledge => "Acknowledge",
            Event::Continue => "Continue",
            Event::Reset => "Reset",
            Event::Restart => "Restart",
            Event::UpdateSettings(_) => "UpdateSettings",
        }
    }
}

/// User-facing messages raised by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    TonicRequired,
    PermissionRequired,
    PermissionDenied,
    TryAgain,
    LevelComplete { stars: u8 },
    RaagMastered(String),
    SessionComplete,
}

/// Work for the caller to carry out, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PlayTone { frequency: f32, duration: std::time::Duration },
    StopTone,
    SetVolume(f32),
    StartCapture,
    StopCapture,
    RequestPermission,
    SaveTonic(f32),
    SaveSettings,
    SaveProgress,
    SaveSession,
    Notify(Notice),
}

/// Everything the UI shows about the latest sample.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveReading {
    pub frequency: f32,
    pub target_frequency: f32,
    pub deviation_cents: i32,
    pub is_match: bool,
    pub accuracy: u8,
    pub feedback: Feedback,
    pub stability: u8,
    pub stability_feedback: StabilityFeedback,
    pub hold_progress: u8,
    pub nearest: Option<NearestNote>,
}

pub struct PracticeSession {
    phase: Phase,
    settings: PracticeSettings,
    tonic: Option<f32>,
    microphone: bool,
    plan: Option<PracticePlan>,
    level_index: usize,
    sequence_index: usize,
    stars: u8,
    mistakes: u8,
    /// Holds broken by an off-pitch sample since the target was set.
    failed_holds: u8,
    history: PitchHistory,
    hold: HoldTimer,
    reading: Option<LiveReading>,
    /// Samples taken before this instant belong to an earlier target.
    target_since: Option<Instant>,
    /// Bumped every time the target note changes.
    target_epoch: u64,
    progress: ProgressBook,
}

impl PracticeSession {
    pub fn new(settings: PracticeSettings, tonic: Option<f32>, progress: ProgressBook) -> Self {
        let settings = settings.sanitized();
        let tonic = tonic.filter(|hz| hz.is_finite() && *hz > 0.0);
        Self {
            phase: Phase::Setup,
            hold: HoldTimer::new(settings.hold_duration()),
            settings,
            tonic,
            microphone: false,
            plan: None,
            level_index: 0,
            sequence_index: 0,
            stars: 0,
            mistakes: 0,
            failed_holds: 0,
            history: PitchHistory::new(),
            reading: None,
            target_since: None,
            target_epoch: 0,
            progress,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn settings(&self) -> &PracticeSettings {
        &self.settings
    }

    pub fn tonic(&self) -> Option<f32> {
        self.tonic
    }

    pub fn plan(&self) -> Option<&PracticePlan> {
        self.plan.as_ref()
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn level(&self) -> Option<&Level> {
        self.plan.as_ref()?.levels.get(self.level_index)
    }

    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn stars(&self) -> u8 {
        self.stars
    }

    pub fn mistakes(&self) -> u8 {
        self.mistakes
    }

    pub fn hold_progress(&self) -> u8 {
        self.hold.progress()
    }

    pub fn reading(&self) -> Option<&LiveReading> {
        self.reading.as_ref()
    }

    pub fn history(&self) -> &PitchHistory {
        &self.history
    }

    pub fn progress(&self) -> &ProgressBook {
        &self.progress
    }

    pub fn tolerance_level(&self) -> ToleranceLevel {
        self.settings.tolerance_level()
    }

    pub fn target_epoch(&self) -> u64 {
        self.target_epoch
    }

    pub fn set_microphone_permission(&mut self, granted: bool) {
        self.microphone = granted;
    }

    pub fn target_note(&self) -> Option<Note> {
        self.level()?.notes.get(self.sequence_index).copied()
    }

    pub fn target_frequency(&self) -> Result<f32> {
        let tonic = self.tonic.ok_or(SwaraError::NoTonicSet)?;
        let note = self
            .target_note()
            .ok_or_else(|| SwaraError::InvalidInput("no practice target selected".into()))?;
        Ok(note.frequency(tonic, self.settings.tuning))
    }

    /// Position to save, if a mode has been chosen.
    pub fn record(&self) -> Option<SessionRecord> {
        let plan = self.plan.as_ref()?;
        Some(SessionRecord {
            mode: plan.mode.clone(),
            level_index: self.level_index,
            sequence_index: self.sequence_index,
            stars: self.stars,
            mistakes: self.mistakes,
        })
    }

    /// Applies `event` at `now` and returns the effects to carry out.
    ///
    /// Events that make no sense in the current phase fail with
    /// `InvalidTransition` and leave the session untouched.
    pub fn handle(&mut self, event: Event, now: Instant) -> Result<Vec<Effect>> {
        let from = self.phase.name();
        let effects = match event {
            Event::UpdateSettings(settings) => Ok(self.update_settings(settings)),
            Event::Reset => Ok(self.reset()),
            Event::Pitch(sample) => self.on_pitch(sample),
            Event::Tick => Ok(self.on_tick(now)),
            Event::PermissionResolved(granted) => Ok(self.on_permission(granted, now)),
            event => self.on_action(event, now),
        }?;
        if self.phase.name() != from {
            log::debug!("session {from} -> {}", self.phase.name());
        }
        Ok(effects)
    }

    fn invalid(&self, event: &Event) -> SwaraError {
        SwaraError::InvalidTransition {
            phase: self.phase.name(),
            event: event.name(),
        }
    }

    /// User actions, validated against the current phase.
    fn on_action(&mut self, event: Event, now: Instant) -> Result<Vec<Effect>> {
        match (&self.phase, event) {
            (Phase::Setup, Event::DetectTonic) => Ok(self.enter_sa_detection()),
            (Phase::SaDetection { candidate }, Event::ConfirmTonic) => {
                let hz = candidate.ok_or(SwaraError::NoTonicSet)?;
                Ok(self.commit_tonic(hz))
            }
            (Phase::Setup | Phase::SaDetection { .. }, Event::SelectTonic(hz)) => {
                if !(hz.is_finite() && hz > 0.0) {
                    return Err(SwaraError::InvalidInput(format!("tonic must be > 0 Hz, got {hz}")));
                }
                Ok(self.commit_tonic(hz))
            }
            (Phase::Setup, Event::SelectMode(plan)) => {
                log::debug!("selected {:?}", plan.mode);
                self.level_index = plan.start_level;
                self.plan = Some(plan);
                self.clear_counters();
                Ok(Vec::new())
            }
            (Phase::Setup, Event::StartSession) => self.start_session(now),
            (Phase::Practicing, Event::Pause) => {
                self.phase = Phase::Paused;
                self.clear_target_state(now);
                Ok(vec![Effect::StopCapture, Effect::StopTone])
            }
            (Phase::Paused, Event::Resume) => {
                self.phase = Phase::Practicing;
                self.clear_target_state(now);
                Ok(vec![Effect::StartCapture])
            }
            (Phase::Listening(_) | Phase::Practicing, Event::Skip) => Ok(self.on_mistake(now)),
            (Phase::MistakeHandling(Retry::AwaitingAcknowledgement), Event::Acknowledge) => {
                Ok(self.begin_listening(now))
            }
            (Phase::LevelComplete { .. }, Event::Continue) => Ok(self.begin_listening(now)),
            (Phase::Completed, Event::Restart) => {
                self.phase = Phase::Setup;
                self.level_index = self.plan.as_ref().map_or(0, |p| p.start_level);
                self.clear_counters();
                Ok(Vec::new())
            }
            (_, event) => Err(self.invalid(&event)),
        }
    }

    fn enter_sa_detection(&mut self) -> Vec<Effect> {
        self.phase = Phase::SaDetection { candidate: None };
        if self.microphone {
            vec![Effect::StartCapture]
        } else {
            vec![Effect::RequestPermission, Effect::Notify(Notice::PermissionRequired)]
        }
    }

    fn commit_tonic(&mut self, hz: f32) -> Vec<Effect> {
        log::info!("tonic set to {hz:.2} Hz");
        let mut effects = Vec::new();
        if self.phase.captures() {
            effects.push(Effect::StopCapture);
        }
        self.tonic = Some(hz);
        self.phase = Phase::Setup;
        effects.push(Effect::SaveTonic(hz));
        effects
    }

    fn start_session(&mut self, now: Instant) -> Result<Vec<Effect>> {
        let start_level = self
            .plan
            .as_ref()
            .map(|p| p.start_level)
            .ok_or_else(|| SwaraError::InvalidInput("no practice mode selected".into()))?;
        if self.tonic.is_none() {
            let mut effects = vec![Effect::Notify(Notice::TonicRequired)];
            effects.extend(self.enter_sa_detection());
            return Ok(effects);
        }
        self.level_index = start_level;
        self.clear_counters();
        Ok(self.begin_listening(now))
    }

    /// Enters Listening for the current level and plays the first reference tone.
    fn begin_listening(&mut self, now: Instant) -> Vec<Effect> {
        self.clear_target_state(now);
        let notes = self.level().map(|level| level.notes.clone());
        let (Some(tonic), Some(notes)) = (self.tonic, notes) else {
            log::warn!("cannot listen without a tonic and a level");
            self.phase = Phase::Setup;
            return vec![Effect::StopTone, Effect::StopCapture];
        };
        let from = self.sequence_index.min(notes.len());
        let wanted = if self.settings.replay_each_note {
            &notes[from..(from + 1).min(notes.len())]
        } else {
            &notes[from..]
        };
        // Played back to front with `pop`.
        let pending = wanted
            .iter()
            .rev()
            .map(|n| n.frequency(tonic, self.settings.tuning))
            .collect();
        let mut playback = Playback {
            pending,
            next_at: now,
            finished: false,
            awaiting_permission: false,
        };
        let mut effects = vec![Effect::StopCapture];
        self.advance_playback(&mut playback, now, &mut effects);
        self.phase = Phase::Listening(playback);
        effects
    }

    /// Plays the next tone once the current one is over, or finishes.
    fn advance_playback(&self, playback: &mut Playback, now: Instant, effects: &mut Vec<Effect>) {
        if playback.finished || now < playback.next_at {
            return;
        }
        effects.push(Effect::StopTone);
        match playback.pending.pop() {
            Some(frequency) => {
                let duration = self.settings.reference_tone();
                effects.push(Effect::PlayTone { frequency, duration });
                let gap = if playback.pending.is_empty() {
                    std::time::Duration::ZERO
                } else {
                    self.settings.inter_note_gap()
                };
                playback.next_at = now + duration + gap;
            }
            None => playback.finished = true,
        }
    }

    fn on_tick(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.phase.clone() {
            Phase::Listening(mut playback) => {
                self.advance_playback(&mut playback, now, &mut effects);
                if playback.finished && !playback.awaiting_permission {
                    if self.microphone {
                        self.start_practicing(now, &mut effects);
                        return effects;
                    }
                    playback.awaiting_permission = true;
                    effects.push(Effect::RequestPermission);
                    effects.push(Effect::Notify(Notice::PermissionRequired));
                }
                self.phase = Phase::Listening(playback);
            }
            Phase::MistakeHandling(Retry::At(at)) if now >= at => {
                effects = self.begin_listening(now);
            }
            _ => {}
        }
        effects
    }

    fn on_permission(&mut self, granted: bool, now: Instant) -> Vec<Effect> {
        self.microphone = granted;
        if !granted {
            log::warn!("microphone permission denied");
            return vec![Effect::Notify(Notice::PermissionDenied)];
        }
        let mut effects = Vec::new();
        let playback_done = matches!(&self.phase, Phase::Listening(playback) if playback.finished);
        if playback_done {
            self.start_practicing(now, &mut effects);
        } else if matches!(self.phase, Phase::SaDetection { .. }) {
            effects.push(Effect::StartCapture);
        }
        effects
    }

    fn start_practicing(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        self.phase = Phase::Practicing;
        self.clear_target_state(now);
        effects.push(Effect::StartCapture);
    }

    fn on_pitch(&mut self, sample: PitchSample) -> Result<Vec<Effect>> {
        if let Phase::SaDetection { candidate } = &mut self.phase {
            if sample.has_signal() && sample.confidence > self.settings.tonic_confidence {
                *candidate = Some(sample.frequency);
            }
            return Ok(Vec::new());
        }
        if self.phase == Phase::Practicing {
            self.practice_sample(sample)
        } else {
            // Late samples from a capture that has already been stopped.
            Ok(Vec::new())
        }
    }

    /// Runs one sample through deviation, tolerance, stability and hold.
    fn practice_sample(&mut self, sample: PitchSample) -> Result<Vec<Effect>> {
        if self.target_since.is_some_and(|since| sample.timestamp < since) {
            log::trace!("dropping sample from a previous target");
            return Ok(Vec::new());
        }
        let tonic = self.tonic.ok_or(SwaraError::NoTonicSet)?;
        let target_hz = self.target_frequency()?;

        let (heard, matched) = match self.evaluate(sample, target_hz, tonic) {
            Ok(reading) => {
                let matched = reading.is_match;
                self.reading = Some(reading);
                (true, matched)
            }
            Err(SwaraError::SignalTooWeak { confidence }) => {
                log::trace!("no reliable signal (confidence {confidence:.2})");
                (false, false)
            }
            Err(e) => return Err(e),
        };

        let event = self.hold.update(matched, sample.timestamp);
        if let Some(reading) = self.reading.as_mut() {
            reading.hold_progress = self.hold.progress();
        }
        match event {
            HoldEvent::Completed => Ok(self.on_hold_complete(sample.timestamp)),
            // Dropouts break a hold but are not the singer's fault.
            HoldEvent::Cancelled if heard => {
                self.failed_holds += 1;
                log::debug!("hold broken off-pitch ({} so far)", self.failed_holds);
                if self.failed_holds >= self.settings.failed_holds_per_note {
                    Ok(self.on_mistake(sample.timestamp))
                } else {
                    Ok(Vec::new())
                }
            }
            _ => Ok(Vec::new()),
        }
    }

    fn evaluate(&mut self, sample: PitchSample, target_hz: f32, tonic: f32) -> Result<LiveReading> {
        if !sample.has_signal() || sample.confidence < self.settings.min_confidence {
            return Err(SwaraError::SignalTooWeak { confidence: sample.confidence });
        }
        let tolerance_cents = self.settings.tolerance_cents;
        let deviation_cents = swara::cents_deviation(sample.frequency, target_hz)?;
        let is_match = tolerance::is_match(deviation_cents, tolerance_cents);
        self.history.record(sample.frequency);
        let stability = self.history.stability();
        Ok(LiveReading {
            frequency: sample.frequency,
            target_frequency: target_hz,
            deviation_cents,
            is_match,
            accuracy: tolerance::accuracy_percent(deviation_cents, tolerance_cents),
            feedback: tolerance::feedback(deviation_cents, tolerance_cents),
            stability,
            stability_feedback: stability_feedback(stability),
            hold_progress: self.hold.progress(),
            nearest: swara::nearest_note(sample.frequency, tonic, self.settings.tuning)?,
        })
    }

    fn on_hold_complete(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = vec![Effect::SaveSession];
        self.sequence_index += 1;
        self.clear_target_state(now);

        let remaining = self
            .level()
            .is_some_and(|level| self.sequence_index < level.notes.len());
        if !remaining {
            effects.extend(self.finish_sequence(now));
        } else if self.settings.replay_each_note {
            effects.extend(self.begin_listening(now));
        } else {
            log::debug!("next note {:?}", self.target_note());
        }
        effects
    }

    /// The whole sequence of the current level was held through.
    fn finish_sequence(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = vec![Effect::StopCapture, Effect::StopTone];
        let (kind, stars_to_pass, last_level) = match (self.level(), &self.plan) {
            (Some(level), Some(plan)) => (
                level.kind,
                level.stars_to_pass,
                self.level_index + 1 >= plan.levels.len(),
            ),
            _ => return effects,
        };
        let raag = self.plan.as_ref().and_then(|p| p.raag_name()).map(str::to_string);
        let sequence_mode = matches!(
            self.plan.as_ref().map(|p| &p.mode),
            Some(PracticeMode::RaagSequence { .. })
        );

        self.sequence_index = 0;
        self.mistakes = 0;
        self.stars = (self.stars + 1).min(stars_to_pass);
        self.clear_target_state(now);

        if let (LevelKind::Sequence(seq), Some(raag)) = (kind, raag.as_deref()) {
            if self.progress.complete_sequence(raag, seq) {
                log::info!("raag {raag} mastered");
                effects.push(Effect::Notify(Notice::RaagMastered(raag.to_string())));
            }
            effects.push(Effect::SaveProgress);

            if sequence_mode {
                let progress = self.progress.progress(raag);
                match progress.next_pending(seq) {
                    None => {
                        effects.push(Effect::Notify(Notice::SessionComplete));
                        self.phase = Phase::Setup;
                        self.level_index = sequence_level(SequenceKind::Arohi);
                        self.clear_counters();
                    }
                    Some(next) => {
                        self.level_index = sequence_level(next);
                        self.phase = Phase::LevelComplete { stars: self.stars, advanced: true };
                        effects.push(Effect::Notify(Notice::LevelComplete { stars: self.stars }));
                        self.stars = 0;
                    }
                }
                effects.push(Effect::SaveSession);
                return effects;
            }
        }

        let passed = self.stars >= stars_to_pass;
        if passed && last_level {
            log::info!("session complete");
            self.phase = Phase::Completed;
            effects.push(Effect::Notify(Notice::SessionComplete));
        } else {
            log::info!("level {} now at {} stars", kind.name(), self.stars);
            effects.push(Effect::Notify(Notice::LevelComplete { stars: self.stars }));
            self.phase = Phase::LevelComplete { stars: self.stars, advanced: passed };
            if passed {
                self.level_index += 1;
                self.stars = 0;
            }
        }
        effects.push(Effect::SaveSession);
        effects
    }

    fn on_mistake(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = vec![Effect::StopTone];
        if self.phase.captures() {
            effects.push(Effect::StopCapture);
        }
        self.mistakes = (self.mistakes + 1).min(MAX_MISTAKES);
        self.sequence_index = 0;
        self.clear_target_state(now);

        if self.mistakes >= MAX_MISTAKES {
            log::info!("{MAX_MISTAKES} mistakes, resetting level score");
            self.stars = 0;
            self.mistakes = 0;
            self.phase = Phase::MistakeHandling(Retry::AwaitingAcknowledgement);
            effects.push(Effect::Notify(Notice::TryAgain));
        } else {
            self.phase = Phase::MistakeHandling(Retry::At(now + self.settings.retry_delay()));
        }
        effects.push(Effect::SaveSession);
        effects
    }

    fn update_settings(&mut self, settings: PracticeSettings) -> Vec<Effect> {
        self.settings = settings.sanitized();
        self.hold.set_target(self.settings.hold_duration());
        vec![Effect::SetVolume(self.settings.volume), Effect::SaveSettings]
    }

    fn reset(&mut self) -> Vec<Effect> {
        self.phase = Phase::Setup;
        self.level_index = self.plan.as_ref().map_or(0, |p| p.start_level);
        self.clear_counters();
        self.history.clear();
        self.hold.reset();
        self.reading = None;
        vec![Effect::StopTone, Effect::StopCapture]
    }

    fn clear_counters(&mut self) {
        self.sequence_index = 0;
        self.stars = 0;
        self.mistakes = 0;
    }

    /// Forgets everything measured against the previous target.
    fn clear_target_state(&mut self, now: Instant) {
        self.history.clear();
        self.hold.reset();
        self.reading = None;
        self.failed_holds = 0;
        self.target_since = Some(now);
        self.target_epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raag::BuiltinCatalog;
    use crate::swara::Swara;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn swara_session(tonic: Option<f32>) -> PracticeSession {
        let mut session = PracticeSession::new(PracticeSettings::default(), tonic, ProgressBook::default());
        session.set_microphone_permission(true);
        let plan = PracticePlan::build(PracticeMode::Swara(Note::new(Swara::Sa, 0)), &BuiltinCatalog).unwrap();
        session.handle(Event::SelectMode(plan), Instant::now()).unwrap();
        session
    }

    #[test]
    fn start_without_tonic_forces_detection() {
        let mut session = swara_session(None);
        let effects = session.handle(Event::StartSession, Instant::now()).unwrap();
        assert!(matches!(session.phase(), Phase::SaDetection { candidate: None }));
        assert_eq!(effects[0], Effect::Notify(Notice::TonicRequired));
        assert!(effects.contains(&Effect::StartCapture));
        assert_eq!(session.target_frequency(), Err(SwaraError::NoTonicSet));
    }

    #[test]
    fn detection_only_trusts_confident_samples() {
        let mut session = swara_session(None);
        let t0 = Instant::now();
        session.handle(Event::DetectTonic, t0).unwrap();
        session.handle(Event::Pitch(PitchSample::new(150.0, 0.5, t0)), t0).unwrap();
        assert_eq!(session.phase(), &Phase::SaDetection { candidate: None });
        session.handle(Event::Pitch(PitchSample::new(146.8, 0.9, t0)), t0).unwrap();
        assert_eq!(session.phase(), &Phase::SaDetection { candidate: Some(146.8) });

        let effects = session.handle(Event::ConfirmTonic, t0).unwrap();
        assert_eq!(effects, vec![Effect::StopCapture, Effect::SaveTonic(146.8)]);
        assert_eq!(session.tonic(), Some(146.8));
        assert_eq!(session.phase(), &Phase::Setup);
    }

    #[test]
    fn confirm_without_candidate_fails() {
        let mut session = swara_session(None);
        session.handle(Event::DetectTonic, Instant::now()).unwrap();
        assert_eq!(session.handle(Event::ConfirmTonic, Instant::now()), Err(SwaraError::NoTonicSet));
        assert!(matches!(session.phase(), Phase::SaDetection { .. }));
    }

    #[test]
    fn manual_tonic_rejects_nonsense() {
        let mut session = swara_session(None);
        let err = session.handle(Event::SelectTonic(-1.0), Instant::now()).unwrap_err();
        assert!(matches!(err, SwaraError::InvalidInput(_)));
        assert_eq!(session.tonic(), None);
    }

    #[test]
    fn illegal_events_leave_state_alone() {
        let mut session = swara_session(Some(220.0));
        let err = session.handle(Event::Pause, Instant::now()).unwrap_err();
        assert_eq!(err, SwaraError::InvalidTransition { phase: "Setup", event: "Pause" });
        assert_eq!(session.phase(), &Phase::Setup);
    }

    #[test]
    fn listening_plays_then_hands_over_to_practice() {
        let mut session = swara_session(Some(220.0));
        let t0 = Instant::now();
        let effects = session.handle(Event::StartSession, t0).unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::StopCapture,
                Effect::StopTone,
                Effect::PlayTone { frequency: 220.0, duration: ms(1500) },
            ]
        );

        assert!(session.handle(Event::Tick, t0 + ms(1000)).unwrap().is_empty());
        assert!(matches!(session.phase(), Phase::Listening(_)));

        let effects = session.handle(Event::Tick, t0 + ms(1500)).unwrap();
        assert_eq!(effects, vec![Effect::StopTone, Effect::StartCapture]);
        assert_eq!(session.phase(), &Phase::Practicing);
    }

    #[test]
    fn listening_waits_for_permission() {
        let mut session = swara_session(Some(220.0));
        session.set_microphone_permission(false);
        let t0 = Instant::now();
        session.handle(Event::StartSession, t0).unwrap();
        let effects = session.handle(Event::Tick, t0 + ms(1500)).unwrap();
        assert!(effects.contains(&Effect::Notify(Notice::PermissionRequired)));
        assert!(matches!(session.phase(), Phase::Listening(p) if p.is_finished()));

        // Asked once only.
        assert!(session.handle(Event::Tick, t0 + ms(1600)).unwrap().is_empty());

        let effects = session.handle(Event::PermissionResolved(false), t0).unwrap();
        assert_eq!(effects, vec![Effect::Notify(Notice::PermissionDenied)]);
        assert!(matches!(session.phase(), Phase::Listening(_)));

        session.handle(Event::PermissionResolved(true), t0 + ms(2000)).unwrap();
        assert_eq!(session.phase(), &Phase::Practicing);
    }

    #[test]
    fn pause_and_resume_keep_position() {
        let mut session = swara_session(Some(220.0));
        let t0 = Instant::now();
        session.handle(Event::StartSession, t0).unwrap();
        session.handle(Event::Tick, t0 + ms(1500)).unwrap();
        session.handle(Event::Pitch(PitchSample::new(220.0, 0.9, t0 + ms(1600))), t0).unwrap();
        assert!(session.reading().is_some());

        let effects = session.handle(Event::Pause, t0 + ms(1700)).unwrap();
        assert_eq!(effects, vec![Effect::StopCapture, Effect::StopTone]);
        assert_eq!(session.hold_progress(), 0);
        assert!(session.history().is_empty());
        // Samples arriving while paused are ignored.
        session.handle(Event::Pitch(PitchSample::new(220.0, 0.9, t0 + ms(1800))), t0).unwrap();
        assert_eq!(session.phase(), &Phase::Paused);

        let effects = session.handle(Event::Resume, t0 + ms(2000)).unwrap();
        assert_eq!(effects, vec![Effect::StartCapture]);
        assert_eq!(session.phase(), &Phase::Practicing);
        assert_eq!(session.sequence_index(), 0);
    }

    #[test]
    fn weak_signal_breaks_a_hold() {
        let mut session = swara_session(Some(220.0));
        let t0 = Instant::now();
        session.handle(Event::StartSession, t0).unwrap();
        session.handle(Event::Tick, t0 + ms(1500)).unwrap();
        let at = |n: u64| t0 + ms(2000 + n);
        session.handle(Event::Pitch(PitchSample::new(221.0, 0.9, at(0))), at(0)).unwrap();
        session.handle(Event::Pitch(PitchSample::new(221.0, 0.9, at(1000))), at(1000)).unwrap();
        assert_eq!(session.hold_progress(), 50);
        session.handle(Event::Pitch(PitchSample::new(221.0, 0.1, at(1100))), at(1100)).unwrap();
        assert_eq!(session.hold_progress(), 0);
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn settings_update_applies_immediately() {
        let mut session = swara_session(Some(220.0));
        let settings = PracticeSettings { tolerance_cents: 5, volume: 2.0, ..PracticeSettings::default() };
        let effects = session.handle(Event::UpdateSettings(settings), Instant::now()).unwrap();
        assert_eq!(effects, vec![Effect::SetVolume(1.0), Effect::SaveSettings]);
        assert_eq!(session.settings().tolerance_cents, 10);
        assert_eq!(session.tolerance_level(), ToleranceLevel::Expert);
    }

    #[test]
    fn reset_from_anywhere_stops_audio() {
        let mut session = swara_session(Some(220.0));
        let t0 = Instant::now();
        session.handle(Event::StartSession, t0).unwrap();
        let effects = session.handle(Event::Reset, t0).unwrap();
        assert_eq!(effects, vec![Effect::StopTone, Effect::StopCapture]);
        assert_eq!(session.phase(), &Phase::Setup);
        assert!(session.record().is_some());
    }
}
