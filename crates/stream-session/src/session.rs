//! SessionManager: single owner of the live playback session.
//!
//! All mutation goes through [`SessionManager::dispatch`] (or the thin public
//! wrappers around it).  The manager owns exactly one [`PlaybackSession`] at
//! a time; selecting a station bumps the generation counter and cancels every
//! timer before anything for the new station is armed, and every timer fire
//! is checked against the current generation before it may touch state.
use std::time::{Duration, Instant};

use stream_proto::config::SessionConfig;
use stream_proto::prefs::{PreferenceStore, KEY_FAVORITE, KEY_QUALITY, KEY_VOLUME};
use stream_proto::protocol::{
    NetworkQuality, PlaybackStatus, QualityTier, ReconnectPhase, SessionSnapshot,
    StationDescriptor,
};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::display::DisplayAdapter;
use crate::error::SessionError;
use crate::event::{SessionEvent, UserAction};
use crate::health::{HealthAction, HealthThresholds, PlayIntent, PlaybackHealthMonitor};
use crate::media::{MediaElement, MediaErrorCode, MediaEvent, NetworkState, PlayError};
use crate::reconnect::{FailureSignal, ReconnectPolicy, ReconnectionController};
use crate::timer::{TimerId, TimerKind, TimerScheduler};
use crate::url;

/// Delay before an auto-resume attempt after an unrequested pause.
const AUTO_RESUME_DELAY: Duration = Duration::from_millis(500);

const DEFAULT_VOLUME: f32 = 0.5;

/// State of the stream currently assigned to the media element.
#[derive(Debug)]
pub struct PlaybackSession {
    generation: u64,
    station: StationDescriptor,
    url: String,
    intends_to_play: bool,
    last_user_interaction: Option<Instant>,
    /// Set by a user pause, cleared by the next play.
    user_paused: bool,
    controller: ReconnectionController,
    monitor: PlaybackHealthMonitor,
    /// Index of the next autoplay retry delay; `None` when no autoplay task runs.
    autoplay_step: Option<usize>,
    /// Status shown before a probe switched the display to `Checking`.
    checking_from: Option<PlaybackStatus>,
}

impl PlaybackSession {
    fn new(
        generation: u64,
        station: StationDescriptor,
        url: String,
        intends_to_play: bool,
        policy: ReconnectPolicy,
        thresholds: HealthThresholds,
    ) -> Self {
        Self {
            generation,
            station,
            url,
            intends_to_play,
            last_user_interaction: None,
            user_paused: false,
            controller: ReconnectionController::new(policy),
            monitor: PlaybackHealthMonitor::new(thresholds),
            autoplay_step: None,
            checking_from: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn station(&self) -> &StationDescriptor {
        &self.station
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn intends_to_play(&self) -> bool {
        self.intends_to_play
    }

    pub fn controller(&self) -> &ReconnectionController {
        &self.controller
    }

    pub fn monitor(&self) -> &PlaybackHealthMonitor {
        &self.monitor
    }

    fn is_exhausted(&self) -> bool {
        self.controller.phase() == ReconnectPhase::Exhausted
    }

    fn intent(&self) -> PlayIntent {
        PlayIntent {
            intends_to_play: self.intends_to_play,
            last_user_interaction: self.last_user_interaction,
        }
    }
}

/// Diagnostic probe the host should run for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub generation: u64,
    pub url: String,
}

pub struct SessionManager<M, D, T> {
    config: SessionConfig,
    stations: Vec<StationDescriptor>,
    media: M,
    display: D,
    timers: T,
    clock: Box<dyn Clock>,
    prefs: Box<dyn PreferenceStore>,
    quality: QualityTier,
    volume: f32,
    generation: u64,
    session: Option<PlaybackSession>,
    status: PlaybackStatus,
    detail: String,
    /// Status to restore when connectivity comes back.
    status_before_offline: Option<PlaybackStatus>,
    now_playing: Option<String>,
    rev: u64,
}

impl<M, D, T> SessionManager<M, D, T>
where
    M: MediaElement,
    D: DisplayAdapter,
    T: TimerScheduler,
{
    /// Build a manager.  Quality and volume are read once from `prefs`.
    pub fn new(
        config: SessionConfig,
        stations: Vec<StationDescriptor>,
        mut media: M,
        display: D,
        timers: T,
        clock: Box<dyn Clock>,
        prefs: Box<dyn PreferenceStore>,
    ) -> Self {
        let quality = prefs
            .get(KEY_QUALITY)
            .and_then(|q| match q.parse::<QualityTier>() {
                Ok(q) => Some(q),
                Err(e) => {
                    warn!("session: ignoring stored quality: {}", e);
                    None
                }
            })
            .unwrap_or_default();
        let volume = prefs
            .get(KEY_VOLUME)
            .and_then(|v| v.parse::<f32>().ok())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_VOLUME);
        media.set_volume(volume);

        Self {
            config,
            stations,
            media,
            display,
            timers,
            clock,
            prefs,
            quality,
            volume,
            generation: 0,
            session: None,
            status: PlaybackStatus::Idle,
            detail: String::new(),
            status_before_offline: None,
            now_playing: None,
            rev: 1,
        }
    }

    // ── accessors ─────────────────────────────────────────────────────────────

    pub fn stations(&self) -> &[StationDescriptor] {
        &self.stations
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn active_station(&self) -> Option<&StationDescriptor> {
        self.session.as_ref().map(|s| &s.station)
    }

    pub fn current_url(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.url.as_str())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn quality(&self) -> QualityTier {
        self.quality
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.session
            .as_ref()
            .map(|s| s.controller.attempts())
            .unwrap_or(0)
    }

    pub fn reconnect_phase(&self) -> ReconnectPhase {
        self.session
            .as_ref()
            .map(|s| s.controller.phase())
            .unwrap_or_default()
    }

    pub fn network_quality(&self) -> NetworkQuality {
        self.session
            .as_ref()
            .map(|s| s.monitor.network_quality())
            .unwrap_or_default()
    }

    pub fn intends_to_play(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.intends_to_play)
    }

    pub fn favorite(&self) -> Option<String> {
        self.prefs.get(KEY_FAVORITE)
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            rev: self.rev,
            stations: self.stations.clone(),
            active_station: self.active_station().map(|s| s.id.clone()),
            stream_url: self.current_url().map(str::to_string),
            quality: self.quality,
            status: self.status,
            detail: self.detail.clone(),
            network_quality: self.network_quality(),
            reconnect_phase: self.reconnect_phase(),
            reconnect_attempts: self.reconnect_attempts(),
            intends_to_play: self.intends_to_play(),
            favorite: self.favorite(),
            volume: self.volume,
            now_playing: self.now_playing.clone(),
        }
    }

    // ── dispatch ──────────────────────────────────────────────────────────────

    /// Apply one event.  Never fails: errors are logged and reflected in the
    /// reported status.
    pub fn dispatch(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Media(evt) => self.on_media_event(evt),
            SessionEvent::TimerFired(id) => self.on_timer(id),
            SessionEvent::User(action) => {
                if let Err(e) = self.on_user_action(action) {
                    warn!("session: {}", e);
                }
            }
            SessionEvent::Connectivity(online) => self.on_connectivity(online),
            SessionEvent::ProbeCompleted {
                generation,
                available,
            } => self.on_probe_completed(generation, available),
            SessionEvent::NowPlaying { generation, title } => {
                if generation == self.generation && title != self.now_playing {
                    debug!("session: now playing {:?}", title);
                    self.now_playing = title;
                    self.rev += 1;
                }
            }
        }
    }

    fn on_user_action(&mut self, action: UserAction) -> Result<(), SessionError> {
        match action {
            UserAction::SelectStation {
                station_id,
                autoplay,
            } => self.select_station(&station_id, autoplay),
            UserAction::SetQuality(tier) => self.set_quality(tier),
            UserAction::Play => self.play(),
            UserAction::Pause => self.pause(),
            UserAction::Retry => self.retry(),
            UserAction::SetFavorite(id) => self.set_favorite(&id),
            UserAction::SetVolume(v) => {
                self.set_volume(v);
                Ok(())
            }
        }
    }

    // ── public operations ─────────────────────────────────────────────────────

    /// Mark the startup station active without touching the network.
    ///
    /// Prefers the persisted favorite, then the station flagged `active`.
    pub fn prepare_initial(&mut self) {
        let favorite = self.favorite();
        let station = favorite
            .and_then(|id| self.stations.iter().find(|s| s.id == id))
            .or_else(|| self.stations.iter().find(|s| s.active))
            .cloned();
        let Some(station) = station else {
            debug!("session: no initial station");
            return;
        };

        self.teardown();
        let url = url::station_url(&station, self.quality);
        info!("session: initial station '{}' ({})", station.name, url);
        self.display.set_active_station(Some(&station.id));
        self.session = Some(self.new_session(station, url, false));
        self.set_status(
            PlaybackStatus::Ready,
            "click play when the station is available",
        );
    }

    /// Switch to `station_id`, tearing down whatever was playing.
    pub fn select_station(&mut self, station_id: &str, autoplay: bool) -> Result<(), SessionError> {
        let station = self
            .stations
            .iter()
            .find(|s| s.id == station_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownStation(station_id.to_string()))?;

        self.teardown();
        let url = url::station_url(&station, self.quality);
        info!(
            "session: gen={} station '{}' → {} (autoplay={})",
            self.generation, station.name, url, autoplay
        );

        self.display.set_active_station(Some(&station.id));
        self.session = Some(self.new_session(station, url.clone(), autoplay));
        self.set_status(PlaybackStatus::Loading, "");

        self.media.set_source(Some(&url));
        self.media.load();
        self.arm(TimerKind::HealthTick, self.config.health_interval());

        if autoplay {
            if let Some(session) = self.session.as_mut() {
                session.autoplay_step = Some(0);
            }
            self.attempt_autoplay();
        } else {
            self.set_status(PlaybackStatus::Ready, "click play to listen");
        }
        Ok(())
    }

    /// Persist the tier and, if a station is loaded, reacquire it at the new
    /// bitrate keeping the current play intent.
    pub fn set_quality(&mut self, tier: QualityTier) -> Result<(), SessionError> {
        if tier == self.quality {
            debug!("session: quality already {}", tier);
            return Ok(());
        }
        info!("session: quality {} → {}", self.quality, tier);
        self.quality = tier;
        self.persist(KEY_QUALITY, &tier.to_string());
        self.rev += 1;

        let Some((station_id, was_playing)) = self
            .session
            .as_ref()
            .map(|s| (s.station.id.clone(), s.intends_to_play))
        else {
            return Ok(());
        };
        self.select_station(&station_id, was_playing)
    }

    pub fn play(&mut self) -> Result<(), SessionError> {
        let now = self.clock.now();
        let session = self.session.as_mut().ok_or(SessionError::NoActiveStation)?;
        session.last_user_interaction = Some(now);

        if session.controller.phase() == ReconnectPhase::Exhausted {
            info!("session: play after exhaustion, retrying '{}'", session.station.name);
            return self.retry();
        }

        session.intends_to_play = true;
        session.user_paused = false;
        session.autoplay_step = None;
        let url = session.url.clone();

        self.timers.cancel(TimerKind::Autoplay);
        self.timers.cancel(TimerKind::AutoResume);
        self.arm(TimerKind::HealthTick, self.config.health_interval());

        let state = self.media.state();
        let needs_reload = state.ended
            || state.network_state == NetworkState::NoSource
            || self.media.source().as_deref() != Some(url.as_str());
        if needs_reload {
            if state.ended {
                self.media.set_source(None);
            }
            self.media.set_source(Some(&url));
            self.media.load();
            self.set_status(PlaybackStatus::Loading, "");
        }

        match self.media.play() {
            Ok(()) => {}
            Err(PlayError::AutoplayBlocked) => {
                self.set_status(PlaybackStatus::Ready, "click play to listen");
            }
            Err(e) => {
                warn!("session: play rejected: {}", e);
                self.report_failure(FailureSignal::MediaError(None));
            }
        }
        Ok(())
    }

    /// User pause.  Suppresses auto-resume and reconnection until the next
    /// play.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        let now = self.clock.now();
        let session = self.session.as_mut().ok_or(SessionError::NoActiveStation)?;
        session.last_user_interaction = Some(now);
        session.intends_to_play = false;
        session.user_paused = true;
        session.autoplay_step = None;
        session.controller.cancel_pending();

        for kind in [
            TimerKind::Reconnect,
            TimerKind::Heartbeat,
            TimerKind::HealthTick,
            TimerKind::AutoResume,
            TimerKind::Autoplay,
        ] {
            self.timers.cancel(kind);
        }

        self.media.pause();
        self.set_status(PlaybackStatus::Paused, "");
        Ok(())
    }

    /// Manual retry: reacquire the active station from scratch.
    pub fn retry(&mut self) -> Result<(), SessionError> {
        let station_id = self
            .active_station()
            .map(|s| s.id.clone())
            .ok_or(SessionError::NoActiveStation)?;
        self.select_station(&station_id, true)
    }

    pub fn set_favorite(&mut self, station_id: &str) -> Result<(), SessionError> {
        if !self.stations.iter().any(|s| s.id == station_id) {
            return Err(SessionError::UnknownStation(station_id.to_string()));
        }
        self.persist(KEY_FAVORITE, station_id);
        self.rev += 1;
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.volume = volume;
        self.media.set_volume(volume);
        self.persist(KEY_VOLUME, &format!("{:.2}", volume));
        self.rev += 1;
    }

    /// Switch the display to `Checking` and hand back what to probe.  A
    /// session that neither wants audio nor has its source assigned (the
    /// startup station) is not probed.
    pub fn begin_probe(&mut self) -> Option<ProbeRequest> {
        let current = self.status;
        let source = self.media.source();
        let session = self.session.as_mut()?;
        if !session.intends_to_play && source.as_deref() != Some(session.url.as_str()) {
            debug!("session: '{}' not loaded yet, skipping probe", session.station.name);
            return None;
        }
        let request = ProbeRequest {
            generation: session.generation,
            url: session.url.clone(),
        };
        if matches!(current, PlaybackStatus::Loading | PlaybackStatus::Ready) {
            session.checking_from = Some(current);
            self.set_status(PlaybackStatus::Checking, "verifying availability...");
        }
        Some(request)
    }

    // ── session lifecycle ─────────────────────────────────────────────────────

    fn new_session(&self, station: StationDescriptor, url: String, autoplay: bool) -> PlaybackSession {
        PlaybackSession::new(
            self.generation,
            station,
            url,
            autoplay,
            ReconnectPolicy::from_config(&self.config),
            HealthThresholds::from_config(&self.config),
        )
    }

    /// Invalidate the current session: new generation, no timers.
    fn teardown(&mut self) {
        self.timers.cancel_all();
        self.generation = self.generation.wrapping_add(1);
        if let Some(old) = self.session.take() {
            debug!(
                "session: dropped gen={} '{}' (attempts={})",
                old.generation,
                old.station.name,
                old.controller.attempts()
            );
        }
        self.now_playing = None;
        self.status_before_offline = None;
    }

    fn arm(&mut self, kind: TimerKind, delay: Duration) {
        let id = TimerId {
            kind,
            generation: self.generation,
        };
        self.timers.arm(id, delay);
    }

    fn set_status(&mut self, status: PlaybackStatus, detail: impl Into<String>) {
        let detail = detail.into();
        let name = self
            .session
            .as_ref()
            .map(|s| s.station.name.clone())
            .unwrap_or_default();
        if status != self.status {
            info!("session: status {:?} → {:?} {}", self.status, status, detail);
        }
        self.status = status;
        self.detail = detail;
        self.rev += 1;
        self.display.update_status(&name, status, &self.detail);
    }

    fn persist(&mut self, key: &str, value: &str) {
        if let Err(e) = self.prefs.set(key, value) {
            warn!("session: failed to persist {}: {}", key, e);
        }
    }

    // ── autoplay task ─────────────────────────────────────────────────────────

    /// One step of "attempt play until ready or cancelled".
    fn attempt_autoplay(&mut self) {
        let Some(step) = self.session.as_ref().and_then(|s| s.autoplay_step) else {
            return;
        };

        match self.media.play() {
            Ok(()) => {
                debug!("session: autoplay accepted at step {}", step);
                self.finish_autoplay();
            }
            Err(PlayError::AutoplayBlocked) => {
                info!("session: autoplay blocked by policy");
                self.finish_autoplay();
                if let Some(session) = self.session.as_mut() {
                    session.intends_to_play = false;
                }
                self.set_status(PlaybackStatus::Ready, "click play to listen");
            }
            Err(e) => {
                let delays = self.config.autoplay_retry_delays();
                match delays.get(step) {
                    Some(delay) => {
                        debug!("session: autoplay step {} failed ({}), retry in {:?}", step, e, delay);
                        if let Some(session) = self.session.as_mut() {
                            session.autoplay_step = Some(step + 1);
                        }
                        self.arm(TimerKind::Autoplay, *delay);
                    }
                    None => {
                        warn!("session: autoplay gave up after {} attempts: {}", step + 1, e);
                        self.finish_autoplay();
                    }
                }
            }
        }
    }

    fn finish_autoplay(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.autoplay_step = None;
        }
        self.timers.cancel(TimerKind::Autoplay);
    }

    // ── media events ──────────────────────────────────────────────────────────

    fn on_media_event(&mut self, event: MediaEvent) {
        let Some(session) = self.session.as_ref() else {
            debug!("session: {:?} with no session, ignored", event);
            return;
        };
        let intent = session.intent();
        let now = self.clock.now();
        debug!("session: media {:?}", event);

        match event {
            MediaEvent::Playing => self.on_playing(now),
            MediaEvent::Pause => self.on_pause(now, intent),
            MediaEvent::Play => {}
            MediaEvent::Waiting | MediaEvent::Stalled => {
                if matches!(
                    self.status,
                    PlaybackStatus::Playing | PlaybackStatus::Loading | PlaybackStatus::Buffering
                ) {
                    self.set_status(PlaybackStatus::Buffering, "loading stream...");
                }
            }
            MediaEvent::Error(code) => self.on_media_error(code),
            MediaEvent::LoadedData | MediaEvent::CanPlay | MediaEvent::CanPlayThrough => {
                if session.autoplay_step.is_some() {
                    self.finish_autoplay();
                    self.final_autoplay_attempt();
                }
                if event == MediaEvent::CanPlay
                    && self.media.state().paused
                    && matches!(self.status, PlaybackStatus::Loading | PlaybackStatus::Buffering)
                {
                    self.set_status(PlaybackStatus::Ready, "");
                }
            }
            MediaEvent::Ended => {
                let action = session.monitor.on_ended(now, &intent);
                match action {
                    HealthAction::Reconnect(signal) => {
                        warn!("session: live stream ended unexpectedly");
                        self.report_failure(signal);
                    }
                    _ => self.set_status(PlaybackStatus::Paused, ""),
                }
            }
            MediaEvent::LoadStart | MediaEvent::LoadedMetadata | MediaEvent::Progress => {}
        }
    }

    /// Ready-state events end the autoplay task with one last attempt.
    fn final_autoplay_attempt(&mut self) {
        match self.media.play() {
            Ok(()) => debug!("session: autoplay accepted on ready"),
            Err(PlayError::AutoplayBlocked) => {
                if let Some(session) = self.session.as_mut() {
                    session.intends_to_play = false;
                }
                self.set_status(PlaybackStatus::Ready, "click play to listen");
            }
            Err(e) => debug!("session: play on ready rejected: {}", e),
        }
    }

    fn on_playing(&mut self, now: Instant) {
        let state = self.media.state();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.intends_to_play = true;
        session.autoplay_step = None;
        session.controller.on_playing();
        session.monitor.mark_progress(&state, now);

        self.timers.cancel(TimerKind::Autoplay);
        self.timers.cancel(TimerKind::Reconnect);
        self.timers.cancel(TimerKind::AutoResume);
        self.arm(TimerKind::Heartbeat, self.config.heartbeat_interval());
        self.arm(TimerKind::HealthTick, self.config.health_interval());
        self.set_status(PlaybackStatus::Playing, "");
    }

    fn on_pause(&mut self, now: Instant, intent: PlayIntent) {
        let state = self.media.state();
        if state.ended {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !intent.intends_to_play || session.monitor.is_user_initiated(&intent, now) {
            self.set_status(PlaybackStatus::Paused, "");
            return;
        }

        info!("session: pause not requested by user");
        if session.monitor.should_auto_resume(&state, now, &intent) {
            session.monitor.record_auto_resume(now);
            let attempt = session.monitor.auto_resume_attempts();
            self.arm(TimerKind::AutoResume, AUTO_RESUME_DELAY);
            self.set_status(PlaybackStatus::Paused, format!("resuming ({})", attempt));
        } else {
            self.set_status(PlaybackStatus::Paused, "");
        }
    }

    fn on_media_error(&mut self, code: Option<MediaErrorCode>) {
        warn!("session: media error {:?}", code);
        if self.session.as_ref().is_some_and(PlaybackSession::is_exhausted) {
            debug!("session: exhausted, keeping {:?}", self.status);
            return;
        }
        match code {
            Some(MediaErrorCode::Aborted) => {
                self.set_status(PlaybackStatus::Aborted, "connection cancelled");
                return;
            }
            Some(MediaErrorCode::Decode) => {
                self.set_status(PlaybackStatus::DecodeError, "could not decode the stream");
            }
            Some(MediaErrorCode::SrcNotSupported) => {
                self.set_status(
                    PlaybackStatus::NotSupported,
                    "format not supported or stream unavailable",
                );
            }
            Some(MediaErrorCode::Network) | None => {}
        }
        self.report_failure(FailureSignal::MediaError(code));
    }

    // ── failure / recovery ────────────────────────────────────────────────────

    fn report_failure(&mut self, signal: FailureSignal) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.intends_to_play {
            debug!("session: {:?} while not playing, no reconnect", signal);
            return;
        }
        let Some(plan) = session.controller.on_failure(signal) else {
            return;
        };
        let max = session.controller.policy().max_attempts;

        if plan.terminal {
            session.autoplay_step = None;
            for kind in [
                TimerKind::Reconnect,
                TimerKind::Heartbeat,
                TimerKind::HealthTick,
                TimerKind::AutoResume,
                TimerKind::Autoplay,
            ] {
                self.timers.cancel(kind);
            }
            self.set_status(
                PlaybackStatus::Unavailable,
                "stream unavailable, select the station again to retry",
            );
            return;
        }

        self.arm(TimerKind::Reconnect, plan.delay);
        self.set_status(
            PlaybackStatus::Reconnecting,
            format!("attempt {}/{}", plan.attempt, max),
        );
    }

    /// The reconnect timer fired: re-acquire the stream.
    fn run_recovery(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(attempt) = session.controller.begin_attempt() else {
            return;
        };
        let url = session.url.clone();
        let state = self.media.state();
        info!(
            "session: recovery attempt {} (ended={} paused={})",
            attempt, state.ended, state.paused
        );

        let result = if state.ended {
            // An ended element ignores a plain reload; clear the slot first.
            self.media.set_source(None);
            self.reload_and_play(&url)
        } else if state.paused {
            match self.media.play() {
                Err(PlayError::AutoplayBlocked) => Err(PlayError::AutoplayBlocked),
                Err(e) => {
                    debug!("session: resume rejected ({}), reloading", e);
                    self.reload_and_play(&url)
                }
                Ok(()) => Ok(()),
            }
        } else {
            self.reload_and_play(&url)
        };

        let now = self.clock.now();
        let state = self.media.state();
        if let Some(session) = self.session.as_mut() {
            session.monitor.mark_progress(&state, now);
        }

        match result {
            Ok(()) => {}
            Err(PlayError::AutoplayBlocked) => {
                if let Some(session) = self.session.as_mut() {
                    session.intends_to_play = false;
                }
                self.set_status(PlaybackStatus::Ready, "stream available, click play");
            }
            Err(e) => {
                warn!("session: recovery attempt {} failed: {}", attempt, e);
                self.report_failure(FailureSignal::MediaError(None));
            }
        }
    }

    fn reload_and_play(&mut self, url: &str) -> Result<(), PlayError> {
        self.media.set_source(Some(url));
        self.media.load();
        self.media.play()
    }

    // ── timers ────────────────────────────────────────────────────────────────

    fn on_timer(&mut self, id: TimerId) {
        if id.generation != self.generation || self.session.is_none() {
            debug!(
                "session: stale {:?} timer gen={} (current {})",
                id.kind, id.generation, self.generation
            );
            return;
        }
        match id.kind {
            TimerKind::HealthTick => self.health_tick(),
            TimerKind::Heartbeat => self.heartbeat_tick(),
            TimerKind::Reconnect => self.run_recovery(),
            TimerKind::Autoplay => self.attempt_autoplay(),
            TimerKind::AutoResume => self.auto_resume(),
        }
    }

    fn health_tick(&mut self) {
        let state = self.media.state();
        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.user_paused {
            debug!("session: health tick during user pause, not re-armed");
            return;
        }
        let intent = session.intent();
        let action = session.monitor.sample(&state, now, &intent);
        self.arm(TimerKind::HealthTick, self.config.health_interval());

        match action {
            HealthAction::None => {}
            HealthAction::Reconnect(signal) => self.report_failure(signal),
            HealthAction::ResumePlay => {
                if let Err(e) = self.media.play() {
                    debug!("session: resume-if-stuck rejected: {}", e);
                }
            }
        }
    }

    fn heartbeat_tick(&mut self) {
        let state = self.media.state();
        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.intends_to_play {
            return;
        }
        let action = session.monitor.heartbeat(&state, now);
        self.arm(TimerKind::Heartbeat, self.config.heartbeat_interval());

        if let HealthAction::Reconnect(signal) = action {
            self.report_failure(signal);
        }
    }

    fn auto_resume(&mut self) {
        let state = self.media.state();
        let now = self.clock.now();
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let intent = session.intent();
        if !intent.intends_to_play
            || !state.paused
            || state.ended
            || session.monitor.is_user_initiated(&intent, now)
        {
            return;
        }
        let min_buffer = session.monitor.thresholds().auto_resume_min_buffer_secs;
        if state.buffer_ahead() <= min_buffer {
            debug!(
                "session: buffer drained to {:.1}s, auto-resume dropped",
                state.buffer_ahead()
            );
            return;
        }
        if let Err(e) = self.media.play() {
            debug!("session: auto-resume rejected: {}", e);
        }
    }

    // ── connectivity & diagnostics ────────────────────────────────────────────

    fn on_connectivity(&mut self, online: bool) {
        let exhausted = self.session.as_ref().is_some_and(PlaybackSession::is_exhausted);
        if online {
            info!("session: connection restored");
            let previous = self.status_before_offline.take();
            if self.status != PlaybackStatus::Offline {
                debug!("session: status moved on to {:?} while offline", self.status);
                return;
            }
            self.set_status(previous.unwrap_or(PlaybackStatus::Idle), "connection restored");
        } else {
            warn!("session: offline");
            if let Some(session) = self.session.as_mut() {
                session.monitor.set_network_quality(NetworkQuality::Offline);
            }
            if exhausted {
                self.rev += 1;
                return;
            }
            if self.status != PlaybackStatus::Offline {
                self.status_before_offline = Some(self.status);
            }
            self.set_status(PlaybackStatus::Offline, "no internet connection");
        }
    }

    fn on_probe_completed(&mut self, generation: u64, available: bool) {
        if generation != self.generation {
            debug!("session: stale probe result for gen={}", generation);
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let restore = session.checking_from.take();
        if available {
            debug!("session: probe ok for {}", session.url);
        } else {
            warn!("session: probe failed for {}", session.url);
        }

        let detail = if available { "" } else { "stream may be unavailable" };
        match (self.status, restore) {
            (PlaybackStatus::Checking, Some(previous)) => self.set_status(previous, detail),
            (PlaybackStatus::Loading | PlaybackStatus::Ready, _) if !available => {
                self.set_status(self.status, detail)
            }
            _ => {}
        }
    }
}
