use stream_proto::protocol::QualityTier;

use crate::media::MediaEvent;
use crate::timer::TimerId;

/// Everything that can move the session state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Media(MediaEvent),
    TimerFired(TimerId),
    User(UserAction),
    /// Host connectivity changed (`true` = online).
    Connectivity(bool),
    /// Result of a diagnostic availability probe for a given session.
    ProbeCompleted { generation: u64, available: bool },
    /// Stream title from the stats endpoint; purely informational.
    NowPlaying { generation: u64, title: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    SelectStation { station_id: String, autoplay: bool },
    SetQuality(QualityTier),
    Play,
    Pause,
    Retry,
    SetFavorite(String),
    SetVolume(f32),
}
