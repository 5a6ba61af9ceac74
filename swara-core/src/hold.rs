//! # Hold Module
//!
//! "Sustain the correct note for T seconds". The timer is an accumulator
//! sampled on every pitch update against a monotonic clock, so there is no
//! free-running interval to drift or to cancel asynchronously.
//!
//! `Idle -> Holding -> { Completed | Idle (cancelled) }`
//!
//! Cancelling discards all accumulated time: a brief touch of the right note
//! followed by a wrong one earns nothing.

use std::time::{Duration, Instant};

/// Where the timer currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    Idle,
    Holding { since: Instant },
    /// Reached the target; stays here until [`HoldTimer::reset`].
    Completed,
}

/// What a single update produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldEvent {
    /// Nothing changed (no match while idle, or already completed).
    None,
    /// A match started a new hold.
    Started,
    /// Still holding, progress in `0..=99`.
    Progress(u8),
    /// The target duration was reached. Emitted exactly once per hold.
    Completed,
    /// The match was lost; progress is back to 0.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct HoldTimer {
    target: Duration,
    state: HoldState,
    progress: u8,
}

impl HoldTimer {
    pub fn new(target: Duration) -> Self {
        Self {
            target,
            state: HoldState::Idle,
            progress: 0,
        }
    }

    pub fn state(&self) -> HoldState {
        self.state
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    /// Changes the hold duration. A hold already running is measured against
    /// the new target from the next update.
    pub fn set_target(&mut self, target: Duration) {
        self.target = target;
    }

    /// Progress towards the target in `0..=100`.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Returns to idle with no accumulated time, without emitting an event.
    pub fn reset(&mut self) {
        self.state = HoldState::Idle;
        self.progress = 0;
    }

    /// Feeds the match decision for a sample taken at `now`.
    pub fn update(&mut self, matched: bool, now: Instant) -> HoldEvent {
        match (self.state, matched) {
            (HoldState::Completed, _) => HoldEvent::None,
            (HoldState::Idle, false) => HoldEvent::None,
            (HoldState::Idle, true) => {
                self.state = HoldState::Holding { since: now };
                self.progress = 0;
                if self.target.is_zero() {
                    self.complete()
                } else {
                    HoldEvent::Started
                }
            }
            (HoldState::Holding { .. }, false) => {
                self.reset();
                HoldEvent::Cancelled
            }
            (HoldState::Holding { since }, true) => {
                let held = now.saturating_duration_since(since);
                if held >= self.target {
                    self.complete()
                } else {
                    let pct = (held.as_secs_f64() / self.target.as_secs_f64() * 100.0) as u8;
                    self.progress = pct.min(99);
                    HoldEvent::Progress(self.progress)
                }
            }
        }
    }

    fn complete(&mut self) -> HoldEvent {
        self.state = HoldState::Completed;
        self.progress = 100;
        HoldEvent::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn continuous_match_completes_exactly_once() {
        let t0 = Instant::now();
        let mut timer = HoldTimer::new(ms(2000));
        let mut completions = 0;
        for step in 0..=40 {
            if timer.update(true, t0 + ms(step * 50)) == HoldEvent::Completed {
                completions += 1;
            }
        }
        // Keep singing well past the target.
        for step in 41..80 {
            assert_eq!(timer.update(true, t0 + ms(step * 50)), HoldEvent::None);
        }
        assert_eq!(completions, 1);
        assert_eq!(timer.progress(), 100);
        assert_eq!(timer.state(), HoldState::Completed);
    }

    #[test]
    fn completes_at_exact_target() {
        let t0 = Instant::now();
        let mut timer = HoldTimer::new(ms(1000));
        assert_eq!(timer.update(true, t0), HoldEvent::Started);
        assert_eq!(timer.update(true, t0 + ms(500)), HoldEvent::Progress(50));
        assert_eq!(timer.update(true, t0 + ms(1000)), HoldEvent::Completed);
    }

    #[test]
    fn interruption_discards_progress() {
        let t0 = Instant::now();
        let mut timer = HoldTimer::new(ms(1000));
        timer.update(true, t0);
        timer.update(true, t0 + ms(900));
        assert_eq!(timer.progress(), 90);

        assert_eq!(timer.update(false, t0 + ms(950)), HoldEvent::Cancelled);
        assert_eq!(timer.progress(), 0);
        assert_eq!(timer.state(), HoldState::Idle);

        // A fresh hold starts from scratch.
        assert_eq!(timer.update(true, t0 + ms(1000)), HoldEvent::Started);
        assert_eq!(timer.update(true, t0 + ms(1900)), HoldEvent::Progress(90));
        assert_eq!(timer.update(false, t0 + ms(1950)), HoldEvent::Cancelled);
    }

    #[test]
    fn no_match_while_idle_is_quiet() {
        let mut timer = HoldTimer::new(ms(1000));
        assert_eq!(timer.update(false, Instant::now()), HoldEvent::None);
        assert_eq!(timer.progress(), 0);
    }

    #[test]
    fn reset_rearms_after_completion() {
        let t0 = Instant::now();
        let mut timer = HoldTimer::new(ms(100));
        timer.update(true, t0);
        assert_eq!(timer.update(true, t0 + ms(100)), HoldEvent::Completed);
        timer.reset();
        assert_eq!(timer.update(true, t0 + ms(200)), HoldEvent::Started);
    }

    #[test]
    fn out_of_order_timestamps_do_not_underflow() {
        let t0 = Instant::now() + ms(1000);
        let mut timer = HoldTimer::new(ms(1000));
        timer.update(true, t0);
        assert_eq!(timer.update(true, t0 - ms(500)), HoldEvent::Progress(0));
    }

    #[test]
    fn shorter_target_applies_to_a_running_hold() {
        let t0 = Instant::now();
        let mut timer = HoldTimer::new(ms(2000));
        timer.update(true, t0);
        assert_eq!(timer.update(true, t0 + ms(500)), HoldEvent::Progress(25));
        timer.set_target(ms(600));
        assert_eq!(timer.update(true, t0 + ms(600)), HoldEvent::Completed);
    }
}
