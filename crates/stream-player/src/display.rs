use stream_proto::protocol::PlaybackStatus;
use stream_session::DisplayAdapter;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::BroadcastMessage;

/// Pushes every status line to connected clients.
pub struct BroadcastDisplay {
    tx: broadcast::Sender<BroadcastMessage>,
}

impl BroadcastDisplay {
    pub fn new(tx: broadcast::Sender<BroadcastMessage>) -> Self {
        Self { tx }
    }
}

impl DisplayAdapter for BroadcastDisplay {
    fn update_status(&mut self, station_name: &str, status: PlaybackStatus, detail: &str) {
        info!("[{}] {} {}", station_name, status, detail);
        // No receivers is fine.
        let _ = self.tx.send(BroadcastMessage::Status {
            station: station_name.to_string(),
            status,
            detail: detail.to_string(),
        });
    }

    fn set_active_station(&mut self, station_id: Option<&str>) {
        debug!("display: active station {:?}", station_id);
        let _ = self.tx.send(BroadcastMessage::StateUpdated);
    }
}
