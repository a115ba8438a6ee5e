//! Timer requests.
//!
//! The core never sleeps.  It asks a scheduler to deliver
//! `SessionEvent::TimerFired(id)` after a delay.  At most one timer per
//! `TimerKind` is outstanding: arming a kind replaces any pending one.
//! Every id carries the session generation it was armed for so a fire that
//! races a station switch is recognised as stale.
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// ~1 Hz buffer / ready-state sampler.
    HealthTick,
    /// ~1 Hz position-progress check while playing.
    Heartbeat,
    Reconnect,
    /// Next step of the "attempt play until ready" task.
    Autoplay,
    /// Rate-limited resume after a pause the user did not ask for.
    AutoResume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    pub kind: TimerKind,
    pub generation: u64,
}

pub trait TimerScheduler {
    fn arm(&mut self, id: TimerId, delay: Duration);
    fn cancel(&mut self, kind: TimerKind);
    fn cancel_all(&mut self);
}
