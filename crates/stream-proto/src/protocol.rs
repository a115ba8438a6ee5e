use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current protocol version.  Bump this when the wire format changes in a
/// breaking way.
pub const PROTOCOL_VERSION: u32 = 1;

// ── stations & quality ────────────────────────────────────────────────────────

/// A station as configured at startup.  Immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StationDescriptor {
    pub id: String,
    pub name: String,
    /// Server address without trailing mount, e.g. `https://radio.example.com`.
    pub base_url: String,
    /// Mount name; the quality suffix is appended to it.
    pub mount: String,
    /// Station marked active at startup.
    #[serde(default)]
    pub active: bool,
}

/// Bitrate variant of a mount, in kbps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum QualityTier {
    Kbps192,
    #[default]
    Kbps320,
}

impl QualityTier {
    pub const ALL: [QualityTier; 2] = [QualityTier::Kbps192, QualityTier::Kbps320];

    pub fn kbps(self) -> u32 {
        match self {
            QualityTier::Kbps192 => 192,
            QualityTier::Kbps320 => 320,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kbps())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported quality tier: {0}")]
pub struct UnknownQuality(pub String);

impl TryFrom<u32> for QualityTier {
    type Error = UnknownQuality;

    fn try_from(kbps: u32) -> Result<Self, Self::Error> {
        QualityTier::ALL
            .into_iter()
            .find(|q| q.kbps() == kbps)
            .ok_or_else(|| UnknownQuality(kbps.to_string()))
    }
}

impl From<QualityTier> for u32 {
    fn from(q: QualityTier) -> u32 {
        q.kbps()
    }
}

impl FromStr for QualityTier {
    type Err = UnknownQuality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches("kbps");
        trimmed
            .parse::<u32>()
            .map_err(|_| UnknownQuality(s.to_string()))
            .and_then(QualityTier::try_from)
    }
}

// ── status ────────────────────────────────────────────────────────────────────

/// What the display layer is told about the active station.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Checking,
    Ready,
    Playing,
    Paused,
    Buffering,
    Reconnecting,
    /// Reconnect attempts exhausted; sticky until the user acts.
    Unavailable,
    Aborted,
    DecodeError,
    NotSupported,
    Offline,
}

impl PlaybackStatus {
    pub fn label(self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "Idle",
            PlaybackStatus::Loading => "Loading...",
            PlaybackStatus::Checking => "Checking...",
            PlaybackStatus::Ready => "Ready",
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Buffering => "Buffering...",
            PlaybackStatus::Reconnecting => "Reconnecting...",
            PlaybackStatus::Unavailable => "Unavailable",
            PlaybackStatus::Aborted => "Aborted",
            PlaybackStatus::DecodeError => "Decode Error",
            PlaybackStatus::NotSupported => "Not Supported",
            PlaybackStatus::Offline => "Offline",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse network classification derived from buffer-ahead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum NetworkQuality {
    #[default]
    Good,
    Slow,
    Offline,
}

/// Externally visible phase of the reconnection controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ReconnectPhase {
    #[default]
    Idle,
    Reconnecting,
    Exhausted,
}

/// Read model of the session manager, pushed to clients on every change.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionSnapshot {
    /// Monotonic revision counter, incremented on every state change.
    #[serde(default)]
    pub rev: u64,
    pub stations: Vec<StationDescriptor>,
    pub active_station: Option<String>,
    pub stream_url: Option<String>,
    pub quality: QualityTier,
    pub status: PlaybackStatus,
    #[serde(default)]
    pub detail: String,
    pub network_quality: NetworkQuality,
    pub reconnect_phase: ReconnectPhase,
    pub reconnect_attempts: u32,
    /// True while the session wants audio (autoplay requested or user pressed play).
    pub intends_to_play: bool,
    pub favorite: Option<String>,
    pub volume: f32,
    #[serde(default)]
    pub now_playing: Option<String>,
}

// ── wire protocol ─────────────────────────────────────────────────────────────

/// Messages sent from a client to the player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    Select { station_id: String, autoplay: bool },
    Play,
    Pause,
    Retry,
    SetQuality { kbps: u32 },
    SetFavorite { station_id: String },
    Volume { value: f32 },
    GetState,
}

/// Messages pushed from the player to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "broadcast")]
pub enum Broadcast {
    /// Sent immediately on connect: protocol version + full snapshot.
    Hello {
        protocol_version: u32,
        rev: u64,
        state: SessionSnapshot,
    },
    State {
        data: SessionSnapshot,
    },
    Status {
        station: String,
        status: PlaybackStatus,
        detail: String,
    },
    NowPlaying {
        title: Option<String>,
        listeners: Option<u64>,
    },
    Log {
        message: String,
    },
}

/// Wrapper for socket communication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Command(Command),
    Broadcast(Broadcast),
}

impl Message {
    /// 4-byte big-endian length prefix followed by the JSON body.
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let len = u32::try_from(json.len())?;
        let mut result = Vec::with_capacity(4 + json.len());
        result.extend_from_slice(&len.to_be_bytes());
        result.extend_from_slice(&json);
        Ok(result)
    }

    /// Returns the decoded message and the number of bytes consumed.
    pub fn decode(data: &[u8]) -> anyhow::Result<(Self, usize)> {
        if data.len() < 4 {
            anyhow::bail!("Insufficient data for length header");
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if data.len() < 4 + len {
            anyhow::bail!("Insufficient data for message");
        }
        let msg: Self = serde_json::from_slice(&data[4..4 + len])?;
        Ok((msg, 4 + len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_parsing() {
        assert_eq!("320".parse::<QualityTier>(), Ok(QualityTier::Kbps320));
        assert_eq!("192kbps".parse::<QualityTier>(), Ok(QualityTier::Kbps192));
        assert!("128".parse::<QualityTier>().is_err());
        assert!(QualityTier::try_from(256).is_err());
        assert_eq!(QualityTier::default(), QualityTier::Kbps320);
    }

    #[test]
    fn test_quality_serializes_as_number() {
        assert_eq!(serde_json::to_string(&QualityTier::Kbps192).unwrap(), "192");
        let q: QualityTier = serde_json::from_str("320").unwrap();
        assert_eq!(q, QualityTier::Kbps320);
        assert!(serde_json::from_str::<QualityTier>("64").is_err());
    }

    #[test]
    fn test_command_encode_decode() {
        let msg = Message::Command(Command::Select {
            station_id: "deep".into(),
            autoplay: true,
        });
        let encoded = msg.encode().unwrap();
        let (decoded, len) = Message::decode(&encoded).unwrap();
        assert_eq!(len, encoded.len());
        match decoded {
            Message::Command(Command::Select { station_id, autoplay }) => {
                assert_eq!(station_id, "deep");
                assert!(autoplay);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_decode_waits_for_full_frame() {
        let encoded = Message::Command(Command::Pause).encode().unwrap();
        assert!(Message::decode(&encoded[..3]).is_err());
        assert!(Message::decode(&encoded[..encoded.len() - 1]).is_err());
    }

    #[test]
    fn test_hello_carries_snapshot() {
        let state = SessionSnapshot {
            rev: 42,
            status: PlaybackStatus::Reconnecting,
            reconnect_attempts: 2,
            ..Default::default()
        };
        let msg = Message::Broadcast(Broadcast::Hello {
            protocol_version: PROTOCOL_VERSION,
            rev: 42,
            state,
        });
        let encoded = msg.encode().unwrap();
        let (decoded, _) = Message::decode(&encoded).unwrap();
        match decoded {
            Message::Broadcast(Broadcast::Hello {
                protocol_version,
                rev,
                state,
            }) => {
                assert_eq!(protocol_version, PROTOCOL_VERSION);
                assert_eq!(rev, 42);
                assert_eq!(state.status, PlaybackStatus::Reconnecting);
                assert_eq!(state.reconnect_attempts, 2);
            }
            _ => panic!("Wrong message type"),
        }
    }
}
