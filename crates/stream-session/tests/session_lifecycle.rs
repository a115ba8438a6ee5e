mod common;

use std::time::Duration;

use common::{Harness, MediaCall, DEEP_BASE};
use stream_proto::config::SessionConfig;
use stream_proto::prefs::{MemoryStore, PreferenceStore, KEY_FAVORITE, KEY_QUALITY, KEY_VOLUME};
use stream_proto::protocol::{PlaybackStatus, QualityTier, ReconnectPhase};
use stream_session::{MediaErrorCode, MediaEvent, PlayError, SessionError, SessionEvent, TimerKind};

#[test]
fn stream_url_follows_quality_tier() {
    let mut h = Harness::new();
    h.mgr.select_station("deep", false).unwrap();
    assert_eq!(
        h.mgr.current_url(),
        Some(format!("{}/deep320", DEEP_BASE).as_str())
    );

    h.mgr.set_quality(QualityTier::Kbps192).unwrap();
    assert_eq!(
        h.mgr.current_url(),
        Some(format!("{}/deep192", DEEP_BASE).as_str())
    );
    assert_eq!(h.mgr.media().source.as_deref(), h.mgr.current_url());
    assert_eq!(h.prefs.get(KEY_QUALITY).as_deref(), Some("192"));
}

#[test]
fn trailing_slash_on_base_is_not_doubled() {
    let mut h = Harness::new();
    h.mgr.select_station("jazz", false).unwrap();
    assert_eq!(h.mgr.current_url(), Some("https://jazz.example.com/jazz320"));
}

#[test]
fn quality_switch_keeps_playing_intent() {
    let mut h = Harness::new();
    h.start_playing("deep", 12.0, 6.0);
    let gen = h.mgr.generation();

    h.mgr.set_quality(QualityTier::Kbps192).unwrap();

    assert!(h.mgr.generation() > gen);
    assert!(h.mgr.intends_to_play());
    assert_eq!(h.mgr.media().calls.last(), Some(&MediaCall::Play));
    assert!(h.mgr.media().source.as_deref().unwrap().ends_with("/deep192"));
}

#[test]
fn quality_switch_while_stopped_does_not_start_audio() {
    let mut h = Harness::new();
    h.mgr.select_station("deep", false).unwrap();
    let plays = h.mgr.media().count(&MediaCall::Play);

    h.mgr.set_quality(QualityTier::Kbps192).unwrap();

    assert!(!h.mgr.intends_to_play());
    assert_eq!(h.mgr.media().count(&MediaCall::Play), plays);
    assert_eq!(h.mgr.status(), PlaybackStatus::Ready);
}

#[test]
fn same_quality_is_a_no_op() {
    let mut h = Harness::new();
    h.mgr.select_station("deep", false).unwrap();
    let gen = h.mgr.generation();
    h.mgr.set_quality(QualityTier::Kbps320).unwrap();
    assert_eq!(h.mgr.generation(), gen);
}

#[test]
fn switching_stations_leaves_one_active_session() {
    let mut h = Harness::new();
    h.mgr.select_station("deep", true).unwrap();
    h.mgr.select_station("jazz", true).unwrap();

    assert_eq!(h.mgr.active_station().map(|s| s.id.as_str()), Some("jazz"));
    assert_eq!(
        h.mgr.display().active.last(),
        Some(&Some("jazz".to_string()))
    );
    assert_eq!(h.mgr.timers().cancel_all_calls, 2);

    let tick = h.mgr.timers().pending_id(TimerKind::HealthTick).unwrap();
    assert_eq!(tick.generation, h.mgr.generation());
}

#[test]
fn unknown_station_is_rejected() {
    let mut h = Harness::new();
    assert_eq!(
        h.mgr.select_station("nope", true),
        Err(SessionError::UnknownStation("nope".to_string()))
    );
    assert!(h.mgr.active_station().is_none());
    assert_eq!(h.mgr.play(), Err(SessionError::NoActiveStation));
}

#[test]
fn stale_reconnect_timer_is_ignored_after_switch() {
    let mut h = Harness::new();
    h.start_playing("deep", 30.0, 4.0);
    h.media_event(MediaEvent::Error(Some(MediaErrorCode::Network)));
    let stale = h.mgr.timers().pending_id(TimerKind::Reconnect).unwrap();

    h.mgr.select_station("jazz", true).unwrap();
    let loads = h.mgr.media().loads();
    let status = h.mgr.status();

    h.mgr.dispatch(SessionEvent::TimerFired(stale));

    assert_eq!(h.mgr.media().loads(), loads);
    assert_eq!(h.mgr.status(), status);
    assert_eq!(h.mgr.reconnect_attempts(), 0);
    assert_eq!(h.mgr.reconnect_phase(), ReconnectPhase::Idle);
}

#[test]
fn blocked_autoplay_waits_for_user() {
    let mut h = Harness::new();
    h.media().play_results.push_back(Err(PlayError::AutoplayBlocked));

    h.mgr.select_station("deep", true).unwrap();

    assert_eq!(h.mgr.status(), PlaybackStatus::Ready);
    assert_eq!(h.mgr.detail(), "click play to listen");
    assert!(!h.mgr.intends_to_play());
    assert!(h.mgr.timers().pending_id(TimerKind::Autoplay).is_none());

    h.mgr.play().unwrap();
    h.media_event(MediaEvent::Playing);
    assert_eq!(h.mgr.status(), PlaybackStatus::Playing);
}

#[test]
fn autoplay_retries_on_schedule() {
    let mut h = Harness::new();
    for _ in 0..2 {
        h.media()
            .play_results
            .push_back(Err(PlayError::Other("not ready".into())));
    }

    h.mgr.select_station("deep", true).unwrap();
    assert!(h.fire(TimerKind::Autoplay));
    assert!(h.fire(TimerKind::Autoplay));

    assert_eq!(
        h.mgr.timers().delays(TimerKind::Autoplay),
        vec![Duration::from_millis(100), Duration::from_millis(300)]
    );
    assert!(h.mgr.timers().pending_id(TimerKind::Autoplay).is_none());
    assert_eq!(h.mgr.media().count(&MediaCall::Play), 3);
}

#[test]
fn ready_event_ends_autoplay_with_one_last_attempt() {
    let mut h = Harness::new();
    h.media()
        .play_results
        .push_back(Err(PlayError::Other("not ready".into())));
    h.mgr.select_station("deep", true).unwrap();
    assert!(h.mgr.timers().pending_id(TimerKind::Autoplay).is_some());

    h.media_event(MediaEvent::CanPlay);

    assert!(h.mgr.timers().pending_id(TimerKind::Autoplay).is_none());
    assert_eq!(h.mgr.media().count(&MediaCall::Play), 2);
    assert!(!h.fire(TimerKind::Autoplay));
}

#[test]
fn preferences_are_restored_and_written() {
    let prefs = MemoryStore::with(&[
        (KEY_QUALITY, "192"),
        (KEY_FAVORITE, "jazz"),
        (KEY_VOLUME, "0.80"),
    ]);
    let mut h = Harness::with(SessionConfig::default(), prefs);
    assert_eq!(h.mgr.quality(), QualityTier::Kbps192);
    assert!((h.mgr.volume() - 0.8).abs() < f32::EPSILON);
    assert!((h.mgr.media().volume - 0.8).abs() < f32::EPSILON);

    h.mgr.set_volume(1.7);
    assert_eq!(h.prefs.get(KEY_VOLUME).as_deref(), Some("1.00"));

    assert!(h.mgr.set_favorite("nope").is_err());
    h.mgr.set_favorite("deep").unwrap();
    assert_eq!(h.mgr.favorite().as_deref(), Some("deep"));
}

#[test]
fn initial_station_loads_nothing_until_play() {
    let prefs = MemoryStore::with(&[(KEY_FAVORITE, "jazz")]);
    let mut h = Harness::with(SessionConfig::default(), prefs);

    h.mgr.prepare_initial();
    assert_eq!(h.mgr.active_station().map(|s| s.id.as_str()), Some("jazz"));
    assert_eq!(h.mgr.status(), PlaybackStatus::Ready);
    assert_eq!(h.mgr.media().loads(), 0);
    assert!(h.mgr.begin_probe().is_none());
    assert_eq!(h.mgr.status(), PlaybackStatus::Ready);

    h.mgr.play().unwrap();
    assert_eq!(h.mgr.media().loads(), 1);
    assert_eq!(
        h.mgr.media().source.as_deref(),
        Some("https://jazz.example.com/jazz320")
    );
    assert!(h.mgr.intends_to_play());
}

#[test]
fn probe_result_annotates_and_stale_results_are_dropped() {
    let mut h = Harness::new();
    h.mgr.select_station("deep", false).unwrap();
    let req = h.mgr.begin_probe().unwrap();
    assert_eq!(req.url, format!("{}/deep320", DEEP_BASE));
    assert_eq!(h.mgr.status(), PlaybackStatus::Checking);

    h.mgr.dispatch(SessionEvent::ProbeCompleted {
        generation: req.generation - 1,
        available: false,
    });
    assert_eq!(h.mgr.status(), PlaybackStatus::Checking);

    h.mgr.dispatch(SessionEvent::ProbeCompleted {
        generation: req.generation,
        available: false,
    });
    assert_eq!(h.mgr.status(), PlaybackStatus::Ready);
    assert_eq!(h.mgr.detail(), "stream may be unavailable");
}

#[test]
fn now_playing_is_scoped_to_generation() {
    let mut h = Harness::new();
    h.mgr.select_station("deep", true).unwrap();
    let gen = h.mgr.generation();

    h.mgr.dispatch(SessionEvent::NowPlaying {
        generation: gen,
        title: Some("Artist - Track".into()),
    });
    assert_eq!(h.mgr.snapshot().now_playing.as_deref(), Some("Artist - Track"));

    h.mgr.select_station("jazz", true).unwrap();
    h.mgr.dispatch(SessionEvent::NowPlaying {
        generation: gen,
        title: Some("Old".into()),
    });
    assert_eq!(h.mgr.snapshot().now_playing, None);
}

#[test]
fn connectivity_changes_are_reported() {
    let mut h = Harness::new();
    h.start_playing("deep", 5.0, 8.0);

    h.mgr.dispatch(SessionEvent::Connectivity(false));
    assert_eq!(h.mgr.status(), PlaybackStatus::Offline);
    assert_eq!(h.mgr.detail(), "no internet connection");

    h.mgr.dispatch(SessionEvent::Connectivity(true));
    assert_eq!(h.mgr.status(), PlaybackStatus::Playing);
    assert_eq!(h.mgr.detail(), "connection restored");
}

#[test]
fn snapshot_reflects_session() {
    let mut h = Harness::new();
    h.start_playing("deep", 1.0, 12.0);
    let snap = h.mgr.snapshot();
    assert_eq!(snap.active_station.as_deref(), Some("deep"));
    assert_eq!(snap.status, PlaybackStatus::Playing);
    assert!(snap.intends_to_play);
    assert_eq!(snap.stations.len(), 2);
    assert!(snap.rev > 1);
}
