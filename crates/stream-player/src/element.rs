/// `MediaElement` backed by mpv.
///
/// The session core is synchronous, so every command is posted to the mpv
/// writer queue and the observable state is rebuilt from mpv's pushed
/// property changes.  `apply_event` translates those pushes into the coarse
/// `MediaEvent`s the session understands.
use serde_json::{json, Value};
use stream_session::media::{NetworkState, ReadyState};
use stream_session::{MediaElement, MediaErrorCode, MediaEvent, MediaState, PlayError};
use tracing::{debug, warn};

use crate::mpv::{
    MpvEvent, MpvHandle, OBS_CACHE_TIME, OBS_CORE_IDLE, OBS_EOF_REACHED, OBS_ICY_TITLE, OBS_PAUSE,
    OBS_PAUSED_FOR_CACHE, OBS_TIME_POS,
};

/// Buffered seconds beyond which the element reports `Enough`.
const ENOUGH_AHEAD_SECS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LoadPhase {
    /// Nothing handed to mpv since the last source change.
    #[default]
    Empty,
    Loading,
    Loaded,
    /// Load failed or mpv went away.
    Failed,
}

/// Something the element learned that is not a `MediaEvent`.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementNotice {
    Media(MediaEvent),
    IcyTitle(Option<String>),
}

#[derive(Default)]
pub struct MpvElement {
    handle: Option<MpvHandle>,
    source: Option<String>,
    phase: LoadPhase,
    pause: bool,
    core_idle: bool,
    paused_for_cache: bool,
    eof: bool,
    time_pos: Option<f64>,
    cache_time: Option<f64>,
    icy_title: Option<String>,
}

impl MpvElement {
    pub fn new() -> Self {
        Self {
            pause: true,
            core_idle: true,
            ..Self::default()
        }
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    /// Fresh mpv connection.  mpv starts idle and paused with nothing loaded.
    pub fn attach(&mut self, handle: MpvHandle) {
        self.handle = Some(handle);
        self.pause = true;
        self.core_idle = true;
        self.reset_playback();
        if self.source.is_some() {
            self.phase = LoadPhase::Failed;
        }
    }

    /// mpv died.  Whatever was loaded is gone.
    pub fn detach(&mut self) {
        self.handle = None;
        self.reset_playback();
        self.phase = LoadPhase::Failed;
    }

    fn reset_playback(&mut self) {
        self.phase = LoadPhase::Empty;
        self.paused_for_cache = false;
        self.eof = false;
        self.time_pos = None;
        self.cache_time = None;
    }

    fn post(&self, command: Value) {
        match &self.handle {
            Some(h) => {
                if let Err(e) = h.post(command) {
                    warn!("element: {}", e);
                }
            }
            None => debug!("element: mpv not attached, dropped {}", command),
        }
    }

    fn load_current(&mut self) {
        let Some(url) = self.source.clone() else {
            return;
        };
        self.reset_playback();
        self.phase = LoadPhase::Loading;
        self.post(json!(["loadfile", url, "replace"]));
    }

    /// Fold one mpv push into the element and report what it means.
    pub fn apply_event(&mut self, evt: &MpvEvent) -> Vec<ElementNotice> {
        let mut out = Vec::new();
        if let Some((id, data)) = evt.as_property_change() {
            self.apply_property(id, data, &mut out);
            return out;
        }

        match evt.event_name() {
            Some("start-file") => {
                out.push(ElementNotice::Media(MediaEvent::LoadStart));
            }
            Some("file-loaded") => {
                self.phase = LoadPhase::Loaded;
                out.extend(
                    [MediaEvent::LoadedMetadata, MediaEvent::LoadedData, MediaEvent::CanPlay]
                        .into_iter()
                        .map(ElementNotice::Media),
                );
            }
            Some("end-file") => self.on_end_file(evt, &mut out),
            _ => {}
        }
        out
    }

    fn apply_property(&mut self, id: u64, data: &Value, out: &mut Vec<ElementNotice>) {
        match id {
            OBS_PAUSE => {
                let pause = data.as_bool().unwrap_or(true);
                if pause != self.pause {
                    self.pause = pause;
                    out.push(ElementNotice::Media(if pause {
                        MediaEvent::Pause
                    } else {
                        MediaEvent::Play
                    }));
                }
            }
            OBS_CORE_IDLE => {
                let idle = data.as_bool().unwrap_or(true);
                if idle != self.core_idle {
                    self.core_idle = idle;
                    if !idle && !self.pause {
                        self.eof = false;
                        out.push(ElementNotice::Media(MediaEvent::Playing));
                    } else if idle && !self.pause && self.phase == LoadPhase::Loaded {
                        out.push(ElementNotice::Media(MediaEvent::Waiting));
                    }
                }
            }
            OBS_PAUSED_FOR_CACHE => {
                let waiting = data.as_bool().unwrap_or(false);
                if waiting != self.paused_for_cache {
                    self.paused_for_cache = waiting;
                    if waiting {
                        out.push(ElementNotice::Media(MediaEvent::Stalled));
                    }
                }
            }
            OBS_TIME_POS => self.time_pos = data.as_f64(),
            OBS_CACHE_TIME => {
                let t = data.as_f64();
                if t.is_some() && t != self.cache_time {
                    out.push(ElementNotice::Media(MediaEvent::Progress));
                }
                self.cache_time = t;
            }
            OBS_EOF_REACHED => {
                let eof = data.as_bool().unwrap_or(false);
                if eof && !self.eof {
                    self.eof = true;
                    out.push(ElementNotice::Media(MediaEvent::Ended));
                }
            }
            OBS_ICY_TITLE => {
                let title = data
                    .as_str()
                    .map(str::trim)
                    .filter(|t| !t.trim_matches('-').trim().is_empty())
                    .map(str::to_string);
                if title != self.icy_title {
                    self.icy_title = title.clone();
                    out.push(ElementNotice::IcyTitle(title));
                }
            }
            _ => {}
        }
    }

    fn on_end_file(&mut self, evt: &MpvEvent, out: &mut Vec<ElementNotice>) {
        let reason = evt.str_field("reason").unwrap_or("unknown");
        debug!("element: end-file reason={}", reason);
        match reason {
            "eof" => {
                if !self.eof {
                    self.eof = true;
                    out.push(ElementNotice::Media(MediaEvent::Ended));
                }
            }
            "error" => {
                self.phase = LoadPhase::Failed;
                let code = classify_file_error(evt.str_field("file_error"));
                out.push(ElementNotice::Media(MediaEvent::Error(Some(code))));
            }
            "quit" => {
                self.phase = LoadPhase::Failed;
                out.push(ElementNotice::Media(MediaEvent::Error(Some(MediaErrorCode::Aborted))));
            }
            // "stop" / "redirect": replaced by our own loadfile.
            _ => {}
        }
    }
}

fn classify_file_error(file_error: Option<&str>) -> MediaErrorCode {
    let msg = file_error.unwrap_or_default().to_ascii_lowercase();
    if msg.contains("unrecognized") || msg.contains("format") {
        MediaErrorCode::SrcNotSupported
    } else if msg.contains("no audio") || msg.contains("decod") {
        MediaErrorCode::Decode
    } else {
        MediaErrorCode::Network
    }
}

impl MediaElement for MpvElement {
    fn state(&self) -> MediaState {
        let current_time = self.time_pos.unwrap_or(0.0);
        let ahead = match (self.cache_time, self.time_pos) {
            (Some(end), Some(pos)) => (end - pos).max(0.0),
            _ => 0.0,
        };

        let ready_state = match self.phase {
            LoadPhase::Empty | LoadPhase::Failed => ReadyState::Nothing,
            LoadPhase::Loading => ReadyState::Nothing,
            LoadPhase::Loaded if self.time_pos.is_none() => ReadyState::Metadata,
            LoadPhase::Loaded if ahead >= ENOUGH_AHEAD_SECS && !self.paused_for_cache => {
                ReadyState::Enough
            }
            LoadPhase::Loaded => ReadyState::SomeData,
        };
        let network_state = match (self.source.is_some(), self.phase) {
            (false, _) | (true, LoadPhase::Failed) => NetworkState::NoSource,
            (true, LoadPhase::Loading) | (true, LoadPhase::Loaded) => NetworkState::Loading,
            (true, LoadPhase::Empty) => NetworkState::Idle,
        };

        MediaState {
            buffered_end: self.cache_time,
            current_time,
            ready_state,
            network_state,
            paused: self.pause,
            ended: self.eof,
        }
    }

    fn source(&self) -> Option<String> {
        self.source.clone()
    }

    fn set_source(&mut self, url: Option<&str>) {
        self.source = url.map(str::to_string);
        self.reset_playback();
        if self.source.is_none() {
            self.post(json!(["stop"]));
        }
    }

    fn load(&mut self) {
        self.pause = true;
        self.post(json!(["set_property", "pause", true]));
        self.load_current();
    }

    fn play(&mut self) -> Result<(), PlayError> {
        if self.source.is_none() {
            return Err(PlayError::NoSource);
        }
        if self.handle.is_none() {
            return Err(PlayError::Other("mpv not running".to_string()));
        }
        if matches!(self.phase, LoadPhase::Empty | LoadPhase::Failed) {
            self.load_current();
        }
        self.pause = false;
        self.post(json!(["set_property", "pause", false]));
        Ok(())
    }

    fn pause(&mut self) {
        self.pause = true;
        self.post(json!(["set_property", "pause", true]));
    }

    fn set_volume(&mut self, volume: f32) {
        let pct = (volume * 100.0).clamp(0.0, 100.0);
        self.post(json!(["set_property", "volume", pct]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(id: u64, data: Value) -> MpvEvent {
        MpvEvent {
            raw: json!({"event": "property-change", "id": id, "data": data}),
        }
    }

    fn named(raw: Value) -> MpvEvent {
        MpvEvent { raw }
    }

    fn media(notices: Vec<ElementNotice>) -> Vec<MediaEvent> {
        notices
            .into_iter()
            .filter_map(|n| match n {
                ElementNotice::Media(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn loaded_element() -> MpvElement {
        let mut el = MpvElement::new();
        el.set_source(Some("https://radio.example.com/deep320"));
        el.load();
        el.apply_event(&named(json!({"event": "file-loaded"})));
        el
    }

    #[test]
    fn unpaused_core_activity_means_playing() {
        let mut el = loaded_element();
        assert_eq!(media(el.apply_event(&prop(OBS_PAUSE, json!(false)))), vec![MediaEvent::Play]);
        assert_eq!(
            media(el.apply_event(&prop(OBS_CORE_IDLE, json!(false)))),
            vec![MediaEvent::Playing]
        );
        assert_eq!(
            media(el.apply_event(&prop(OBS_CORE_IDLE, json!(true)))),
            vec![MediaEvent::Waiting]
        );
    }

    #[test]
    fn buffer_ahead_comes_from_demuxer_cache() {
        let mut el = loaded_element();
        el.apply_event(&prop(OBS_TIME_POS, json!(42.0)));
        el.apply_event(&prop(OBS_CACHE_TIME, json!(42.2)));
        let state = el.state();
        assert!((state.buffer_ahead() - 0.2).abs() < 1e-9);
        assert_eq!(state.ready_state, ReadyState::SomeData);
        assert_eq!(state.network_state, NetworkState::Loading);

        el.apply_event(&prop(OBS_CACHE_TIME, json!(60.0)));
        assert_eq!(el.state().ready_state, ReadyState::Enough);
    }

    #[test]
    fn end_file_reasons_map_to_media_events() {
        let mut el = loaded_element();
        let notices = el.apply_event(&named(
            json!({"event": "end-file", "reason": "error", "file_error": "unrecognized file format"}),
        ));
        assert_eq!(
            media(notices),
            vec![MediaEvent::Error(Some(MediaErrorCode::SrcNotSupported))]
        );
        let state = el.state();
        assert_eq!(state.network_state, NetworkState::NoSource);
        assert_eq!(state.ready_state, ReadyState::Nothing);

        let mut el = loaded_element();
        let notices = el.apply_event(&named(json!({"event": "end-file", "reason": "eof"})));
        assert_eq!(media(notices), vec![MediaEvent::Ended]);
        assert!(el.state().ended);

        let mut el = loaded_element();
        assert!(el
            .apply_event(&named(json!({"event": "end-file", "reason": "stop"})))
            .is_empty());
    }

    #[test]
    fn icy_title_changes_are_reported_once() {
        let mut el = loaded_element();
        assert_eq!(
            el.apply_event(&prop(OBS_ICY_TITLE, json!("Artist - Track"))),
            vec![ElementNotice::IcyTitle(Some("Artist - Track".into()))]
        );
        assert!(el.apply_event(&prop(OBS_ICY_TITLE, json!("Artist - Track"))).is_empty());
        assert_eq!(
            el.apply_event(&prop(OBS_ICY_TITLE, json!(" - "))),
            vec![ElementNotice::IcyTitle(None)]
        );
    }

    #[test]
    fn play_without_mpv_is_refused() {
        let mut el = MpvElement::new();
        assert_eq!(el.play(), Err(PlayError::NoSource));
        el.set_source(Some("https://radio.example.com/deep320"));
        assert!(matches!(el.play(), Err(PlayError::Other(_))));
        assert_eq!(el.state().network_state, NetworkState::Idle);
    }
}
