//! Shared fakes for the session integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use stream_proto::config::SessionConfig;
use stream_proto::prefs::MemoryStore;
use stream_proto::protocol::{PlaybackStatus, StationDescriptor};
use stream_session::media::{NetworkState, ReadyState};
use stream_session::{
    DisplayAdapter, ManualClock, MediaElement, MediaEvent, MediaState, PlayError, SessionEvent,
    SessionManager, TimerId, TimerKind, TimerScheduler,
};

// ── media element ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum MediaCall {
    SetSource(Option<String>),
    Load,
    Play,
    Pause,
}

/// Scriptable media element.  `play()` pops from `play_results` and succeeds
/// when the queue is empty.
#[derive(Debug, Default)]
pub struct FakeMedia {
    pub state: MediaState,
    pub source: Option<String>,
    pub play_results: VecDeque<Result<(), PlayError>>,
    pub calls: Vec<MediaCall>,
    pub volume: f32,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self {
            state: MediaState {
                paused: true,
                ..MediaState::default()
            },
            ..Self::default()
        }
    }

    pub fn count(&self, call: &MediaCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn loads(&self) -> usize {
        self.count(&MediaCall::Load)
    }

    /// Pretend audio is flowing at `position` with `ahead` seconds buffered.
    pub fn set_playing_at(&mut self, position: f64, ahead: f64) {
        self.state.current_time = position;
        self.state.buffered_end = Some(position + ahead);
        self.state.ready_state = ReadyState::SomeData;
        self.state.network_state = NetworkState::Loading;
        self.state.paused = false;
        self.state.ended = false;
    }
}

impl MediaElement for FakeMedia {
    fn state(&self) -> MediaState {
        self.state
    }

    fn source(&self) -> Option<String> {
        self.source.clone()
    }

    fn set_source(&mut self, url: Option<&str>) {
        self.calls.push(MediaCall::SetSource(url.map(str::to_string)));
        self.source = url.map(str::to_string);
    }

    fn load(&mut self) {
        self.calls.push(MediaCall::Load);
        self.state = MediaState {
            paused: true,
            network_state: if self.source.is_some() {
                NetworkState::Loading
            } else {
                NetworkState::NoSource
            },
            ..MediaState::default()
        };
    }

    fn play(&mut self) -> Result<(), PlayError> {
        self.calls.push(MediaCall::Play);
        let result = self.play_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.state.paused = false;
            self.state.ended = false;
        }
        result
    }

    fn pause(&mut self) {
        self.calls.push(MediaCall::Pause);
        self.state.paused = true;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }
}

// ── display ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub updates: Vec<(String, PlaybackStatus, String)>,
    pub active: Vec<Option<String>>,
}

impl RecordingDisplay {
    pub fn last(&self) -> Option<&(String, PlaybackStatus, String)> {
        self.updates.last()
    }

    pub fn saw(&self, status: PlaybackStatus) -> bool {
        self.updates.iter().any(|(_, s, _)| *s == status)
    }
}

impl DisplayAdapter for RecordingDisplay {
    fn update_status(&mut self, station_name: &str, status: PlaybackStatus, detail: &str) {
        self.updates
            .push((station_name.to_string(), status, detail.to_string()));
    }

    fn set_active_station(&mut self, station_id: Option<&str>) {
        self.active.push(station_id.map(str::to_string));
    }
}

// ── timers ────────────────────────────────────────────────────────────────────

/// Records every arm and keeps at most one pending timer per kind.
#[derive(Debug, Default)]
pub struct RecordingTimers {
    pub armed: Vec<(TimerId, Duration)>,
    pub pending: HashMap<TimerKind, (TimerId, Duration)>,
    pub cancel_all_calls: usize,
}

impl RecordingTimers {
    pub fn armed_count(&self, kind: TimerKind) -> usize {
        self.armed.iter().filter(|(id, _)| id.kind == kind).count()
    }

    pub fn delays(&self, kind: TimerKind) -> Vec<Duration> {
        self.armed
            .iter()
            .filter(|(id, _)| id.kind == kind)
            .map(|(_, d)| *d)
            .collect()
    }

    pub fn pending_id(&self, kind: TimerKind) -> Option<TimerId> {
        self.pending.get(&kind).map(|(id, _)| *id)
    }

    /// Remove the pending timer of `kind`, as if it fired.
    pub fn take(&mut self, kind: TimerKind) -> Option<TimerId> {
        self.pending.remove(&kind).map(|(id, _)| id)
    }
}

impl TimerScheduler for RecordingTimers {
    fn arm(&mut self, id: TimerId, delay: Duration) {
        self.armed.push((id, delay));
        self.pending.insert(id.kind, (id, delay));
    }

    fn cancel(&mut self, kind: TimerKind) {
        self.pending.remove(&kind);
    }

    fn cancel_all(&mut self) {
        self.cancel_all_calls += 1;
        self.pending.clear();
    }
}

// ── harness ───────────────────────────────────────────────────────────────────

pub type TestManager = SessionManager<FakeMedia, RecordingDisplay, RecordingTimers>;

pub const DEEP_BASE: &str = "https://radio.example.com";

pub fn stations() -> Vec<StationDescriptor> {
    vec![
        StationDescriptor {
            id: "deep".to_string(),
            name: "Deep".to_string(),
            base_url: DEEP_BASE.to_string(),
            mount: "deep".to_string(),
            active: true,
        },
        StationDescriptor {
            id: "jazz".to_string(),
            name: "Jazz".to_string(),
            base_url: "https://jazz.example.com/".to_string(),
            mount: "jazz".to_string(),
            active: false,
        },
    ]
}

pub struct Harness {
    pub mgr: TestManager,
    pub clock: ManualClock,
    pub prefs: MemoryStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(SessionConfig::default(), MemoryStore::new())
    }

    pub fn with(config: SessionConfig, prefs: MemoryStore) -> Self {
        let clock = ManualClock::new();
        let mgr = SessionManager::new(
            config,
            stations(),
            FakeMedia::new(),
            RecordingDisplay::default(),
            RecordingTimers::default(),
            Box::new(clock.clone()),
            Box::new(prefs.clone()),
        );
        Self { mgr, clock, prefs }
    }

    pub fn media_event(&mut self, event: MediaEvent) {
        self.mgr.dispatch(SessionEvent::Media(event));
    }

    /// Fire the pending timer of `kind`.  Returns false if none was armed.
    pub fn fire(&mut self, kind: TimerKind) -> bool {
        match self.mgr.timers_mut().take(kind) {
            Some(id) => {
                self.mgr.dispatch(SessionEvent::TimerFired(id));
                true
            }
            None => false,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn media(&mut self) -> &mut FakeMedia {
        self.mgr.media_mut()
    }

    /// Select `station` with autoplay and confirm `playing` at `position`.
    pub fn start_playing(&mut self, station: &str, position: f64, ahead: f64) {
        self.mgr.select_station(station, true).unwrap();
        self.media().set_playing_at(position, ahead);
        self.media_event(MediaEvent::Playing);
    }
}
