//! The media element seam.
//!
//! The core never decodes audio.  It drives something that behaves like an
//! HTML audio element: a source slot, `load()`, `play()`/`pause()`, a handful
//! of observable properties and a stream of coarse events.
use serde::{Deserialize, Serialize};

/// How much media data the element holds, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum ReadyState {
    #[default]
    Nothing,
    Metadata,
    SomeData,
    /// Enough buffered to play through without stalling.
    Enough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NetworkState {
    #[default]
    Idle,
    Loading,
    NoSource,
}

/// Coded media error, mirroring the four HTML `MediaError` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
}

/// Events the element reports.  `Error(None)` is an error without a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaEvent {
    Play,
    Pause,
    Playing,
    Waiting,
    Stalled,
    Error(Option<MediaErrorCode>),
    LoadStart,
    LoadedMetadata,
    LoadedData,
    CanPlay,
    CanPlayThrough,
    Progress,
    Ended,
}

/// Point-in-time view of the element's observable properties.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MediaState {
    /// End of the buffered range containing the playhead, in seconds.
    pub buffered_end: Option<f64>,
    pub current_time: f64,
    pub ready_state: ReadyState,
    pub network_state: NetworkState,
    pub paused: bool,
    pub ended: bool,
}

impl MediaState {
    /// Seconds of downloaded audio beyond the playhead; never negative.
    pub fn buffer_ahead(&self) -> f64 {
        self.buffered_end
            .map(|end| (end - self.current_time).max(0.0))
            .unwrap_or(0.0)
    }
}

/// Why `play()` was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayError {
    /// Platform autoplay policy; needs a user gesture.  Not a stream fault.
    #[error("playback requires a user gesture")]
    AutoplayBlocked,
    /// Interrupted by a new `load()` or source change.
    #[error("play request aborted")]
    Aborted,
    #[error("no source assigned")]
    NoSource,
    #[error("play failed: {0}")]
    Other(String),
}

pub trait MediaElement {
    fn state(&self) -> MediaState;
    fn source(&self) -> Option<String>;
    /// Assign or clear (`None`) the source.  Does not start loading.
    fn set_source(&mut self, url: Option<&str>);
    fn load(&mut self);
    fn play(&mut self) -> Result<(), PlayError>;
    fn pause(&mut self);
    fn set_volume(&mut self, volume: f32);
}
