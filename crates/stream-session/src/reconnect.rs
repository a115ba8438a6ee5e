//! Reconnection state machine.
//!
//! ```text
//!            failure (attempts < max)            playing
//!   Idle ─────────────────────────────▶ Reconnecting ─────────▶ Idle
//!                                           │
//!                                           │ failure, attempts reach max
//!                                           ▼
//!                                       Exhausted  (sticky until reset)
//! ```
//!
//! The controller only does bookkeeping: it decides *whether* and *when* to
//! retry and hands back a [`ReconnectPlan`].  Arming the timer and touching
//! the media element is the session manager's job.
use std::time::Duration;

use stream_proto::config::SessionConfig;
use stream_proto::protocol::ReconnectPhase;
use tracing::{debug, info, warn};

use crate::media::MediaErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts,
            base_delay: config.reconnect_base_delay(),
            max_delay: config.reconnect_max_delay(),
        }
    }

    /// Delay before the given 1-based attempt: 0 for the first, then
    /// `min(base * 2^(attempt-2), cap)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = (attempt - 2).min(31);
        let factor = 1u32 << exp;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Why the stream is considered broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSignal {
    MediaError(Option<MediaErrorCode>),
    /// Position stopped advancing with an empty buffer and no error raised.
    SilentFreeze,
    /// Element reports no source and holds nothing.
    NoSource,
    /// A live stream reported `ended` while we still wanted audio.
    UnexpectedEnd,
}

/// Outcome of a failure signal; consumed immediately by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPlan {
    pub attempt: u32,
    pub delay: Duration,
    /// Attempts exhausted: do not arm anything, report unavailable.
    pub terminal: bool,
}

#[derive(Debug)]
pub struct ReconnectionController {
    policy: ReconnectPolicy,
    phase: ReconnectPhase,
    attempts: u32,
    /// A reconnect timer is armed and has not fired yet.
    timer_pending: bool,
}

impl ReconnectionController {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            phase: ReconnectPhase::Idle,
            attempts: 0,
            timer_pending: false,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn phase(&self) -> ReconnectPhase {
        self.phase
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_timer_pending(&self) -> bool {
        self.timer_pending
    }

    /// Feed a failure.  Returns `None` when the signal is absorbed: a retry
    /// is already scheduled, or the controller is exhausted.
    pub fn on_failure(&mut self, signal: FailureSignal) -> Option<ReconnectPlan> {
        match self.phase {
            ReconnectPhase::Exhausted => {
                debug!("reconnect: exhausted, ignoring {:?}", signal);
                return None;
            }
            ReconnectPhase::Reconnecting if self.timer_pending => {
                debug!("reconnect: attempt already scheduled, coalescing {:?}", signal);
                return None;
            }
            _ => {}
        }

        if self.attempts >= self.policy.max_attempts {
            warn!(
                "reconnect: {:?} after attempt {}/{}, giving up",
                signal, self.attempts, self.policy.max_attempts
            );
            self.phase = ReconnectPhase::Exhausted;
            self.timer_pending = false;
            return Some(ReconnectPlan {
                attempt: self.attempts,
                delay: Duration::ZERO,
                terminal: true,
            });
        }

        self.attempts += 1;
        let attempt = self.attempts;

        let delay = self.policy.delay_for(attempt);
        info!(
            "reconnect: {:?} → attempt {}/{} in {:?}",
            signal, attempt, self.policy.max_attempts, delay
        );
        self.phase = ReconnectPhase::Reconnecting;
        self.timer_pending = true;
        Some(ReconnectPlan {
            attempt,
            delay,
            terminal: false,
        })
    }

    /// The reconnect timer fired.  Returns the attempt number to execute, or
    /// `None` if nothing was pending.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.phase == ReconnectPhase::Reconnecting && self.timer_pending {
            self.timer_pending = false;
            Some(self.attempts)
        } else {
            None
        }
    }

    /// Confirmed `playing`.  Returns true if this ended a reconnect cycle.
    pub fn on_playing(&mut self) -> bool {
        let recovered = self.phase != ReconnectPhase::Idle || self.attempts > 0;
        if recovered {
            info!("reconnect: recovered after {} attempt(s)", self.attempts);
        }
        self.reset();
        recovered
    }

    /// The armed timer was cancelled (user pause).  The counter survives.
    pub fn cancel_pending(&mut self) {
        self.timer_pending = false;
    }

    /// Back to Idle with a zero counter.  Used on every new session.
    pub fn reset(&mut self) {
        self.phase = ReconnectPhase::Idle;
        self.attempts = 0;
        self.timer_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: max,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(3000),
        }
    }

    #[test]
    fn delays_follow_backoff_and_cap() {
        let p = policy(10);
        assert_eq!(p.delay_for(1), Duration::ZERO);
        assert_eq!(p.delay_for(2), Duration::from_millis(500));
        assert_eq!(p.delay_for(3), Duration::from_millis(1000));
        assert_eq!(p.delay_for(4), Duration::from_millis(2000));
        assert_eq!(p.delay_for(5), Duration::from_millis(3000));
        for attempt in 1..64 {
            assert!(p.delay_for(attempt) <= p.max_delay);
        }
    }

    #[test]
    fn pending_timer_coalesces_failures() {
        let mut c = ReconnectionController::new(policy(5));
        let first = c.on_failure(FailureSignal::SilentFreeze).unwrap();
        assert_eq!(first.attempt, 1);
        assert_eq!(first.delay, Duration::ZERO);
        assert!(c.on_failure(FailureSignal::NoSource).is_none());
        assert_eq!(c.attempts(), 1);

        assert_eq!(c.begin_attempt(), Some(1));
        assert_eq!(c.begin_attempt(), None);

        let second = c.on_failure(FailureSignal::UnexpectedEnd).unwrap();
        assert_eq!(second.attempt, 2);
        assert_eq!(second.delay, Duration::from_millis(500));
    }

    #[test]
    fn exhausts_after_max_attempts_and_stays_exhausted() {
        let mut c = ReconnectionController::new(policy(3));
        let net = FailureSignal::MediaError(Some(MediaErrorCode::Network));
        for expected in 1..=3 {
            let plan = c.on_failure(net).unwrap();
            assert!(!plan.terminal);
            assert_eq!(plan.attempt, expected);
            assert_eq!(c.begin_attempt(), Some(expected));
        }
        let last = c.on_failure(net).unwrap();
        assert!(last.terminal);
        assert_eq!(last.attempt, 3);
        assert_eq!(c.phase(), ReconnectPhase::Exhausted);
        assert!(!c.is_timer_pending());

        assert!(c.on_failure(net).is_none());
        assert_eq!(c.attempts(), 3);
        assert_eq!(c.begin_attempt(), None);
    }

    #[test]
    fn playing_resets_counter() {
        let mut c = ReconnectionController::new(policy(5));
        c.on_failure(FailureSignal::SilentFreeze);
        c.begin_attempt();
        c.on_failure(FailureSignal::SilentFreeze);
        assert_eq!(c.attempts(), 2);
        assert!(c.on_playing());
        assert_eq!(c.attempts(), 0);
        assert_eq!(c.phase(), ReconnectPhase::Idle);
        assert!(!c.on_playing());
    }

    #[test]
    fn reset_leaves_exhausted() {
        let mut c = ReconnectionController::new(policy(1));
        assert!(!c.on_failure(FailureSignal::NoSource).unwrap().terminal);
        c.begin_attempt();
        assert!(c.on_failure(FailureSignal::NoSource).unwrap().terminal);
        c.reset();
        assert_eq!(c.phase(), ReconnectPhase::Idle);
        assert!(c.on_failure(FailureSignal::NoSource).is_some());
    }
}
