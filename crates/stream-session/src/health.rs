//! Playback health sampling.
//!
//! Two periodic checks run against the media element while a session is
//! live:
//!
//! - the **health tick** classifies network quality from buffer-ahead,
//!   detects an element that lost its source, and nudges an element that
//!   paused itself with a healthy buffer;
//! - the **heartbeat** (only while playing) watches the playhead.  A live
//!   stream whose position stops advancing while the buffer runs dry and no
//!   error was raised is a *silent freeze*: an edge stopped sending bytes but
//!   kept the connection open.
//!
//! The monitor never schedules anything; it returns a [`HealthAction`] and
//! the session manager decides what to do with it.
use std::time::{Duration, Instant};

use stream_proto::config::SessionConfig;
use stream_proto::protocol::NetworkQuality;
use tracing::{debug, warn};

use crate::media::{MediaState, NetworkState, ReadyState};
use crate::reconnect::FailureSignal;

const GOOD_BUFFER_SECS: f64 = 10.0;
const SLOW_BUFFER_SECS: f64 = 3.0;
const OFFLINE_BUFFER_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
    pub stall_threshold: Duration,
    pub freeze_buffer_secs: f64,
    pub user_pause_window: Duration,
    pub resume_idle_window: Duration,
    pub resume_min_buffer_secs: f64,
    pub auto_resume_max_attempts: u32,
    pub auto_resume_cooldown: Duration,
    pub auto_resume_min_buffer_secs: f64,
}

impl HealthThresholds {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            stall_threshold: config.stall_threshold(),
            freeze_buffer_secs: config.freeze_buffer_secs,
            user_pause_window: config.user_pause_window(),
            resume_idle_window: config.resume_idle_window(),
            resume_min_buffer_secs: config.resume_min_buffer_secs,
            auto_resume_max_attempts: config.auto_resume_max_attempts,
            auto_resume_cooldown: config.auto_resume_cooldown(),
            auto_resume_min_buffer_secs: config.auto_resume_min_buffer_secs,
        }
    }
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthAction {
    None,
    Reconnect(FailureSignal),
    /// Call `play()` and ignore the outcome.
    ResumePlay,
}

/// Context from the session that the monitor does not own.
#[derive(Debug, Clone, Copy)]
pub struct PlayIntent {
    pub intends_to_play: bool,
    pub last_user_interaction: Option<Instant>,
}

#[derive(Debug)]
pub struct PlaybackHealthMonitor {
    thresholds: HealthThresholds,
    network_quality: NetworkQuality,
    last_buffer_ahead: f64,
    last_position: Option<f64>,
    /// Last time the playhead was seen moving.
    last_play_time: Option<Instant>,
    auto_resume_attempts: u32,
    last_auto_resume: Option<Instant>,
}

impl PlaybackHealthMonitor {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            thresholds,
            network_quality: NetworkQuality::Good,
            last_buffer_ahead: 0.0,
            last_position: None,
            last_play_time: None,
            auto_resume_attempts: 0,
            last_auto_resume: None,
        }
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    pub fn network_quality(&self) -> NetworkQuality {
        self.network_quality
    }

    pub fn set_network_quality(&mut self, quality: NetworkQuality) {
        self.network_quality = quality;
    }

    pub fn last_buffer_ahead(&self) -> f64 {
        self.last_buffer_ahead
    }

    pub fn last_play_time(&self) -> Option<Instant> {
        self.last_play_time
    }

    pub fn auto_resume_attempts(&self) -> u32 {
        self.auto_resume_attempts
    }

    /// Forget everything; called when a new session starts.
    pub fn reset(&mut self) {
        *self = Self::new(self.thresholds);
    }

    /// Rebase the freeze detector on the current position, e.g. on `playing`
    /// or right after a recovery attempt reloaded the stream.
    pub fn mark_progress(&mut self, media: &MediaState, now: Instant) {
        self.last_position = Some(media.current_time);
        self.last_play_time = Some(now);
    }

    /// True if a user action happened within the user-pause window.
    pub fn is_user_initiated(&self, intent: &PlayIntent, now: Instant) -> bool {
        within(intent.last_user_interaction, now, self.thresholds.user_pause_window)
    }

    fn update_buffer(&mut self, media: &MediaState) -> f64 {
        let ahead = media.buffer_ahead();
        self.last_buffer_ahead = ahead;

        let quality = if ahead > GOOD_BUFFER_SECS {
            Some(NetworkQuality::Good)
        } else if ahead > SLOW_BUFFER_SECS {
            Some(NetworkQuality::Slow)
        } else if ahead < OFFLINE_BUFFER_SECS {
            Some(NetworkQuality::Offline)
        } else {
            None
        };
        if let Some(q) = quality {
            if q != self.network_quality {
                debug!("health: network {:?} → {:?} (ahead={:.1}s)", self.network_quality, q, ahead);
                self.network_quality = q;
            }
        }
        ahead
    }

    /// Periodic health tick.
    pub fn sample(&mut self, media: &MediaState, now: Instant, intent: &PlayIntent) -> HealthAction {
        let ahead = self.update_buffer(media);

        if media.network_state == NetworkState::NoSource
            && media.ready_state == ReadyState::Nothing
            && !media.paused
        {
            warn!("health: element has no source while unpaused");
            return HealthAction::Reconnect(FailureSignal::NoSource);
        }

        if media.paused
            && !media.ended
            && intent.intends_to_play
            && ahead > self.thresholds.resume_min_buffer_secs
            && media.ready_state >= ReadyState::SomeData
            && !within(intent.last_user_interaction, now, self.thresholds.resume_idle_window)
        {
            debug!("health: paused with {:.1}s buffered, resuming", ahead);
            return HealthAction::ResumePlay;
        }

        HealthAction::None
    }

    /// Heartbeat while playing.
    pub fn heartbeat(&mut self, media: &MediaState, now: Instant) -> HealthAction {
        let ahead = self.update_buffer(media);

        let advanced = match self.last_position {
            None => true,
            Some(last) => media.current_time > last,
        };
        if advanced || media.paused {
            // A paused playhead is not a freeze; restart the window.
            self.mark_progress(media, now);
            return HealthAction::None;
        }

        let since = self
            .last_play_time
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default();

        if since > self.thresholds.stall_threshold
            && ahead < self.thresholds.freeze_buffer_secs
            && media.ready_state < ReadyState::Enough
            && !media.ended
        {
            warn!(
                "health: silent freeze at {:.1}s (no progress for {:?}, ahead={:.2}s, {:?})",
                media.current_time, since, ahead, media.ready_state
            );
            return HealthAction::Reconnect(FailureSignal::SilentFreeze);
        }

        HealthAction::None
    }

    /// The element reported `ended`.  Live streams never end on their own,
    /// so unless the user just paused this is treated as a dropped connection.
    pub fn on_ended(&self, now: Instant, intent: &PlayIntent) -> HealthAction {
        if intent.intends_to_play && !self.is_user_initiated(intent, now) {
            HealthAction::Reconnect(FailureSignal::UnexpectedEnd)
        } else {
            HealthAction::None
        }
    }

    /// A `pause` the session did not request.  Returns true if an auto-resume
    /// may be scheduled; the caller must then call [`Self::record_auto_resume`].
    pub fn should_auto_resume(&self, media: &MediaState, now: Instant, intent: &PlayIntent) -> bool {
        if media.ended || !intent.intends_to_play || self.is_user_initiated(intent, now) {
            return false;
        }
        if self.auto_resume_attempts >= self.thresholds.auto_resume_max_attempts {
            debug!("health: auto-resume limit reached ({})", self.auto_resume_attempts);
            return false;
        }
        if within(self.last_auto_resume, now, self.thresholds.auto_resume_cooldown) {
            debug!("health: auto-resume cooling down");
            return false;
        }
        media.buffer_ahead() > self.thresholds.auto_resume_min_buffer_secs
    }

    pub fn record_auto_resume(&mut self, now: Instant) {
        self.auto_resume_attempts += 1;
        self.last_auto_resume = Some(now);
    }
}

fn within(at: Option<Instant>, now: Instant, window: Duration) -> bool {
    at.is_some_and(|t| now.saturating_duration_since(t) < window)
}
