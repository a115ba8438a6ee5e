use stream_proto::protocol::PlaybackStatus;

/// Presentation layer the core reports to.
pub trait DisplayAdapter {
    fn update_status(&mut self, station_name: &str, status: PlaybackStatus, detail: &str);

    /// The station highlighted as active changed (`None` = nothing active).
    fn set_active_station(&mut self, _station_id: Option<&str>) {}
}

/// Display that only logs.  Handy for headless embedding.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl DisplayAdapter for LogDisplay {
    fn update_status(&mut self, station_name: &str, status: PlaybackStatus, detail: &str) {
        tracing::info!("[{}] {} {}", station_name, status, detail);
    }
}
