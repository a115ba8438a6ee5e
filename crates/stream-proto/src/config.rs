use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub mpv: MpvConfig,
    #[serde(default)]
    pub stations: StationsConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// JSON file holding persisted preferences (quality, favorite, volume).
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpvConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsConfig {
    /// Path to the TOML station catalogue.
    /// Defaults to `$XDG_CONFIG_HOME/stream-player/stations.toml`.
    #[serde(default = "default_stations_toml")]
    pub stations_toml: PathBuf,
}

/// Tunables for the reconnection / health-monitoring core.
///
/// All durations are stored as milliseconds so the TOML stays flat; use the
/// accessor methods to get `Duration`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_tick_ms")]
    pub health_interval_ms: u64,
    #[serde(default = "default_tick_ms")]
    pub heartbeat_interval_ms: u64,
    /// No position progress for longer than this counts as a silent freeze.
    #[serde(default = "default_stall_threshold_ms")]
    pub stall_threshold_ms: u64,
    /// Buffer-ahead (seconds) below which a frozen position is suspicious.
    #[serde(default = "default_freeze_buffer_secs")]
    pub freeze_buffer_secs: f64,
    /// A pause within this window of a user action is treated as user-initiated.
    #[serde(default = "default_user_pause_window_ms")]
    pub user_pause_window_ms: u64,
    /// Resume-if-stuck only fires when the user has been idle this long.
    #[serde(default = "default_resume_idle_window_ms")]
    pub resume_idle_window_ms: u64,
    #[serde(default = "default_resume_min_buffer_secs")]
    pub resume_min_buffer_secs: f64,
    #[serde(default = "default_auto_resume_max_attempts")]
    pub auto_resume_max_attempts: u32,
    #[serde(default = "default_auto_resume_cooldown_ms")]
    pub auto_resume_cooldown_ms: u64,
    #[serde(default = "default_auto_resume_min_buffer_secs")]
    pub auto_resume_min_buffer_secs: f64,
    /// Delays between autoplay retries after a source is assigned.
    #[serde(default = "default_autoplay_retry_delays_ms")]
    pub autoplay_retry_delays_ms: Vec<u64>,
    /// Run the availability probe after selecting a station (diagnostic only).
    #[serde(default)]
    pub probe_on_select: bool,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Icecast stats polling interval; 0 disables polling.
    #[serde(default = "default_metadata_poll_secs")]
    pub metadata_poll_secs: u64,
}

impl SessionConfig {
    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_millis(self.stall_threshold_ms)
    }

    pub fn user_pause_window(&self) -> Duration {
        Duration::from_millis(self.user_pause_window_ms)
    }

    pub fn resume_idle_window(&self) -> Duration {
        Duration::from_millis(self.resume_idle_window_ms)
    }

    pub fn auto_resume_cooldown(&self) -> Duration {
        Duration::from_millis(self.auto_resume_cooldown_ms)
    }

    pub fn autoplay_retry_delays(&self) -> Vec<Duration> {
        self.autoplay_retry_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for MpvConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
        }
    }
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            stations_toml: default_stations_toml(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            health_interval_ms: default_tick_ms(),
            heartbeat_interval_ms: default_tick_ms(),
            stall_threshold_ms: default_stall_threshold_ms(),
            freeze_buffer_secs: default_freeze_buffer_secs(),
            user_pause_window_ms: default_user_pause_window_ms(),
            resume_idle_window_ms: default_resume_idle_window_ms(),
            resume_min_buffer_secs: default_resume_min_buffer_secs(),
            auto_resume_max_attempts: default_auto_resume_max_attempts(),
            auto_resume_cooldown_ms: default_auto_resume_cooldown_ms(),
            auto_resume_min_buffer_secs: default_auto_resume_min_buffer_secs(),
            autoplay_retry_delays_ms: default_autoplay_retry_delays_ms(),
            probe_on_select: false,
            probe_timeout_ms: default_probe_timeout_ms(),
            metadata_poll_secs: default_metadata_poll_secs(),
        }
    }
}

fn default_state_file() -> PathBuf {
    platform::data_dir().join("preferences.json")
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8991
}

fn default_volume() -> f32 {
    0.5
}

fn default_stations_toml() -> PathBuf {
    platform::config_dir().join("stations.toml")
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    500
}

fn default_reconnect_max_delay_ms() -> u64 {
    3000
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_stall_threshold_ms() -> u64 {
    2000
}

fn default_freeze_buffer_secs() -> f64 {
    0.5
}

fn default_user_pause_window_ms() -> u64 {
    1000
}

fn default_resume_idle_window_ms() -> u64 {
    5000
}

fn default_resume_min_buffer_secs() -> f64 {
    3.0
}

fn default_auto_resume_max_attempts() -> u32 {
    3
}

fn default_auto_resume_cooldown_ms() -> u64 {
    5000
}

fn default_auto_resume_min_buffer_secs() -> f64 {
    2.0
}

fn default_autoplay_retry_delays_ms() -> Vec<u64> {
    vec![100, 300, 700, 1500]
}

fn default_probe_timeout_ms() -> u64 {
    3000
}

fn default_metadata_poll_secs() -> u64 {
    15
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
