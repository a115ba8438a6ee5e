//! PlayerCore: single-owner event loop around the session manager.
//!
//! Every input (client commands, timer fires, mpv pushes, probe and metadata
//! results, liveness ticks) arrives as a `PlayerEvent` on one channel.  The
//! core owns the `SessionManager`, the mpv driver and the published
//! snapshot; no other task touches them.
//!
//! After each event the snapshot is republished if its revision moved, and
//! `BroadcastMessage::StateUpdated` is sent to listeners.  A change of
//! session generation restarts the per-station side tasks (availability
//! probe, Icecast stats poller).
use std::sync::Arc;
use std::time::Duration;

use stream_proto::config::Config;
use stream_proto::prefs::{JsonFileStore, PreferenceStore, KEY_VOLUME};
use stream_proto::protocol::{Command, QualityTier, SessionSnapshot};
use stream_proto::stations::load_stations_from_toml;
use stream_session::metadata::{fetch_now_playing, NowPlaying};
use stream_session::{
    AvailabilityProbe, HttpProbe, MediaErrorCode, MediaEvent, SessionEvent, SessionManager,
    SystemClock, UserAction,
};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::display::BroadcastDisplay;
use crate::element::{ElementNotice, MpvElement};
use crate::mpv::{MpvDriver, MpvEvent};
use crate::timers::TokioTimers;
use crate::BroadcastMessage;

const LIVENESS_INTERVAL: Duration = Duration::from_secs(10);

// ── PlayerEvent ───────────────────────────────────────────────────────────────

/// All inputs into the PlayerCore loop.
#[derive(Debug)]
pub enum PlayerEvent {
    /// A command from a TCP client or the HTTP API.
    Client(Command),
    /// Timer fires and probe results, already in session terms.
    Session(SessionEvent),
    /// Raw mpv push (forwarded from the reader task).
    Mpv(MpvEvent),
    /// Icecast stats for a given session generation.
    Metadata { generation: u64, info: NowPlaying },
    /// Check that mpv is still alive.
    LivenessTick,
}

pub type PlayerSession = SessionManager<MpvElement, BroadcastDisplay, TokioTimers>;

// ── PlayerCore ────────────────────────────────────────────────────────────────

pub struct PlayerCore {
    config: Config,
    session: PlayerSession,
    mpv_driver: MpvDriver,
    event_tx: mpsc::Sender<PlayerEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    client: reqwest::Client,
    /// Cancels the stats poller of the current session.
    metadata_cancel: Option<CancellationToken>,
    last_rev: u64,
}

impl PlayerCore {
    pub fn new(
        config: Config,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<PlayerEvent>,
    ) -> anyhow::Result<Self> {
        let stations = load_stations_from_toml(&config.stations.stations_toml)?;
        info!(
            "Loaded {} stations from {:?}",
            stations.len(),
            config.stations.stations_toml
        );

        let mut prefs = JsonFileStore::open(config.daemon.state_file.clone());
        if prefs.get(KEY_VOLUME).is_none() {
            let volume = format!("{:.2}", config.mpv.default_volume.clamp(0.0, 1.0));
            if let Err(e) = prefs.set(KEY_VOLUME, &volume) {
                warn!("PlayerCore: could not seed volume: {}", e);
            }
        }
        let session = SessionManager::new(
            config.session.clone(),
            stations,
            MpvElement::new(),
            BroadcastDisplay::new(broadcast_tx.clone()),
            TokioTimers::new(event_tx.clone()),
            Box::new(SystemClock),
            Box::new(prefs),
        );

        let mut mpv_driver = MpvDriver::new();
        mpv_driver.last_volume = session.volume();

        let snapshot = Arc::new(RwLock::new(session.snapshot()));
        Ok(Self {
            config,
            session,
            mpv_driver,
            event_tx,
            broadcast_tx,
            snapshot,
            client: reqwest::Client::new(),
            metadata_cancel: None,
            last_rev: 0,
        })
    }

    /// Shared snapshot for the socket and HTTP servers.
    pub fn snapshot(&self) -> Arc<RwLock<SessionSnapshot>> {
        Arc::clone(&self.snapshot)
    }

    /// Run until the event channel closes.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<PlayerEvent>) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");

        let liveness_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(LIVENESS_INTERVAL).await;
                if liveness_tx.send(PlayerEvent::LivenessTick).await.is_err() {
                    break;
                }
            }
        });

        if !self.ensure_mpv().await {
            warn!("PlayerCore: starting without mpv, will retry on the next liveness tick");
        }
        self.session.prepare_initial();
        self.after_event(None).await;

        while let Some(evt) = event_rx.recv().await {
            let generation = self.session.generation();
            match evt {
                PlayerEvent::Client(cmd) => {
                    info!("PlayerCore: command {:?}", cmd);
                    self.handle_command(cmd);
                }
                PlayerEvent::Session(evt) => self.session.dispatch(evt),
                PlayerEvent::Mpv(evt) => self.handle_mpv_event(evt),
                PlayerEvent::Metadata { generation, info } => {
                    self.handle_metadata(generation, info)
                }
                PlayerEvent::LivenessTick => self.check_liveness().await,
            }
            self.after_event(Some(generation)).await;
        }

        info!("PlayerCore: event channel closed, shutting down");
        self.cleanup().await;
        Ok(())
    }

    // ── inputs ────────────────────────────────────────────────────────────────

    fn handle_command(&mut self, cmd: Command) {
        let action = match cmd {
            Command::Select {
                station_id,
                autoplay,
            } => UserAction::SelectStation {
                station_id,
                autoplay,
            },
            Command::Play => UserAction::Play,
            Command::Pause => UserAction::Pause,
            Command::Retry => UserAction::Retry,
            Command::SetQuality { kbps } => match QualityTier::try_from(kbps) {
                Ok(tier) => UserAction::SetQuality(tier),
                Err(e) => {
                    warn!("PlayerCore: {}", e);
                    return;
                }
            },
            Command::SetFavorite { station_id } => UserAction::SetFavorite(station_id),
            Command::Volume { value } => UserAction::SetVolume(value),
            Command::GetState => {
                let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
                return;
            }
        };
        self.session.dispatch(SessionEvent::User(action));
    }

    fn handle_mpv_event(&mut self, evt: MpvEvent) {
        let notices = self.session.media_mut().apply_event(&evt);
        for notice in notices {
            match notice {
                ElementNotice::Media(media_evt) => {
                    self.session.dispatch(SessionEvent::Media(media_evt))
                }
                ElementNotice::IcyTitle(title) => {
                    let generation = self.session.generation();
                    self.session
                        .dispatch(SessionEvent::NowPlaying { generation, title: title.clone() });
                    let _ = self.broadcast_tx.send(BroadcastMessage::NowPlaying {
                        title,
                        listeners: None,
                    });
                }
            }
        }
    }

    fn handle_metadata(&mut self, generation: u64, info: NowPlaying) {
        if generation != self.session.generation() {
            debug!("PlayerCore: stale stats for gen={}", generation);
            return;
        }
        self.session.dispatch(SessionEvent::NowPlaying {
            generation,
            title: info.title.clone(),
        });
        let _ = self.broadcast_tx.send(BroadcastMessage::NowPlaying {
            title: info.title,
            listeners: info.listeners,
        });
    }

    // ── mpv lifecycle ─────────────────────────────────────────────────────────

    async fn check_liveness(&mut self) {
        let attached = self.session.media().is_attached();
        if attached && !self.mpv_driver.process_alive() {
            warn!("PlayerCore: mpv process died");
            self.session.media_mut().detach();
        }
        if !self.session.media().is_attached() && self.ensure_mpv().await && attached {
            // Whatever was playing is gone; let the session recover it.
            self.session
                .dispatch(SessionEvent::Media(MediaEvent::Error(Some(MediaErrorCode::Network))));
        }
    }

    /// Spawn mpv if needed and attach it to the element.  Returns true if a
    /// fresh connection was made.
    async fn ensure_mpv(&mut self) -> bool {
        if self.session.media().is_attached() {
            return false;
        }

        let (mpv_tx, mut mpv_rx) = mpsc::channel::<MpvEvent>(64);
        let core_tx = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(evt) = mpv_rx.recv().await {
                if core_tx.send(PlayerEvent::Mpv(evt)).await.is_err() {
                    break;
                }
            }
        });

        self.mpv_driver.last_volume = self.session.volume();
        match self.mpv_driver.spawn_and_connect(mpv_tx).await {
            Ok(handle) => {
                handle.observe_all_properties().await;
                if let Err(e) = handle.ping().await {
                    warn!("PlayerCore: mpv ping failed: {}", e);
                }
                self.session.media_mut().attach(handle);
                true
            }
            Err(e) => {
                error!("PlayerCore: failed to start mpv: {}", e);
                false
            }
        }
    }

    // ── side tasks ────────────────────────────────────────────────────────────

    /// Republish state and restart per-session tasks when the generation moved.
    async fn after_event(&mut self, previous_generation: Option<u64>) {
        if previous_generation != Some(self.session.generation()) {
            self.on_new_session();
        }

        let snap = self.session.snapshot();
        if snap.rev != self.last_rev {
            self.last_rev = snap.rev;
            *self.snapshot.write().await = snap;
            let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
        }
    }

    fn on_new_session(&mut self) {
        if let Some(token) = self.metadata_cancel.take() {
            token.cancel();
        }
        let Some(station) = self.session.active_station().cloned() else {
            return;
        };
        let generation = self.session.generation();

        if self.config.session.probe_on_select {
            if let Some(req) = self.session.begin_probe() {
                let tx = self.event_tx.clone();
                let timeout = self.config.session.probe_timeout();
                let client = self.client.clone();
                tokio::spawn(async move {
                    let available = HttpProbe::new(client).probe(&req.url, timeout).await;
                    let _ = tx
                        .send(PlayerEvent::Session(SessionEvent::ProbeCompleted {
                            generation: req.generation,
                            available,
                        }))
                        .await;
                });
            }
        }

        let poll_secs = self.config.session.metadata_poll_secs;
        if poll_secs == 0 {
            return;
        }
        let token = CancellationToken::new();
        self.metadata_cancel = Some(token.clone());
        let tx = self.event_tx.clone();
        let client = self.client.clone();
        let stream_path = format!("{}{}", station.mount, self.session.quality().kbps());
        tokio::spawn(async move {
            loop {
                if let Some(info) = fetch_now_playing(&client, &station.base_url, &stream_path).await {
                    if tx.send(PlayerEvent::Metadata { generation, info }).await.is_err() {
                        break;
                    }
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(poll_secs)) => {}
                }
            }
            debug!("metadata: poller for gen={} stopped", generation);
        });
    }

    async fn cleanup(&mut self) {
        if let Some(token) = self.metadata_cancel.take() {
            token.cancel();
        }
        self.mpv_driver.kill().await;
    }
}
