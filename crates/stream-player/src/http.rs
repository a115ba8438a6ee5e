use crate::core::PlayerEvent;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use stream_proto::protocol::{Command, QualityTier, SessionSnapshot};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
struct HttpState {
    snapshot: Arc<RwLock<SessionSnapshot>>,
    event_tx: mpsc::Sender<PlayerEvent>,
}

pub fn router(snapshot: Arc<RwLock<SessionSnapshot>>, event_tx: mpsc::Sender<PlayerEvent>) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/station/:id", post(select_station))
        .route("/api/quality/:kbps", post(set_quality))
        .route("/api/play", post(play))
        .route("/api/pause", post(pause))
        .route("/api/retry", post(retry))
        .route("/api/favorite/:id", post(set_favorite))
        .route("/api/volume/:pct", post(set_volume))
        .layer(CorsLayer::permissive())
        .with_state(HttpState { snapshot, event_tx })
}

pub fn start_server(
    bind_address: String,
    port: u16,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    event_tx: mpsc::Sender<PlayerEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(snapshot, event_tx);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn send(state: &HttpState, cmd: Command) -> StatusCode {
    info!("HTTP API: {:?}", cmd);
    if state.event_tx.send(PlayerEvent::Client(cmd)).await.is_err() {
        error!("Failed to forward command to core");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::ACCEPTED
}

async fn get_state(State(state): State<HttpState>) -> Json<SessionSnapshot> {
    Json(state.snapshot.read().await.clone())
}

async fn select_station(State(state): State<HttpState>, Path(id): Path<String>) -> StatusCode {
    let known = state.snapshot.read().await.stations.iter().any(|s| s.id == id);
    if !known {
        warn!("HTTP API: unknown station {}", id);
        return StatusCode::NOT_FOUND;
    }
    send(
        &state,
        Command::Select {
            station_id: id,
            autoplay: true,
        },
    )
    .await
}

async fn set_quality(State(state): State<HttpState>, Path(kbps): Path<u32>) -> StatusCode {
    if let Err(e) = QualityTier::try_from(kbps) {
        warn!("HTTP API: {}", e);
        return StatusCode::BAD_REQUEST;
    }
    send(&state, Command::SetQuality { kbps }).await
}

async fn play(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::Play).await
}

async fn pause(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::Pause).await
}

async fn retry(State(state): State<HttpState>) -> StatusCode {
    send(&state, Command::Retry).await
}

async fn set_favorite(State(state): State<HttpState>, Path(id): Path<String>) -> StatusCode {
    send(&state, Command::SetFavorite { station_id: id }).await
}

async fn set_volume(State(state): State<HttpState>, Path(pct): Path<i32>) -> StatusCode {
    let value = (pct as f32 / 100.0).clamp(0.0, 1.0);
    send(&state, Command::Volume { value }).await
}
