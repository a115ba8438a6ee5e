use crate::core::PlayerEvent;
use crate::BroadcastMessage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stream_proto::protocol::{Broadcast, Message, SessionSnapshot, PROTOCOL_VERSION};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{error, info, warn};

pub fn start_server(
    bind_address: String,
    port: u16,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    event_tx: mpsc::Sender<PlayerEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let addr = format!("{}:{}", bind_address, port);

        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind TCP socket {}: {}", addr, e);
                return;
            }
        };

        info!("TCP server listening at {}", addr);

        let connected = Arc::new(AtomicUsize::new(0));
        let mut client_id = 0usize;

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    client_id += 1;
                    let id = client_id;
                    let count = connected.fetch_add(1, Ordering::Relaxed) + 1;
                    info!("Client {} connected from {} ({} connected)", id, peer, count);

                    let snap = snapshot.clone();
                    let evt_tx = event_tx.clone();
                    let bcast_rx = broadcast_tx.subscribe();
                    let connected = connected.clone();

                    tokio::spawn(async move {
                        let (read_half, write_half) = stream.into_split();
                        handle_client(read_half, write_half, snap, id, evt_tx, bcast_rx).await;
                        let count = connected.fetch_sub(1, Ordering::Relaxed) - 1;
                        info!("Client {} disconnected ({} connected)", id, count);
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    })
}

async fn handle_client<R, W>(
    mut read_half: R,
    mut write_half: W,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    client_id: usize,
    event_tx: mpsc::Sender<PlayerEvent>,
    mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut tmp = [0u8; 4096];
    let mut read_buf: Vec<u8> = Vec::new();

    if let Ok(encoded) = encode_hello(&snapshot).await {
        if write_half.write_all(&encoded).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            result = read_half.read(&mut tmp) => {
                match result {
                    Ok(0) => {
                        info!("Client {} closed connection", client_id);
                        break;
                    }
                    Ok(n) => {
                        read_buf.extend_from_slice(&tmp[..n]);

                        loop {
                            if read_buf.len() < 4 { break; }
                            match Message::decode(&read_buf) {
                                Ok((Message::Command(cmd), consumed)) => {
                                    read_buf.drain(..consumed);
                                    info!("Client {} sent command: {:?}", client_id, cmd);
                                    if event_tx.send(PlayerEvent::Client(cmd)).await.is_err() {
                                        warn!("PlayerEvent channel closed");
                                        return;
                                    }
                                }
                                Ok((_, consumed)) => {
                                    read_buf.drain(..consumed);
                                }
                                Err(_) => break,
                            }
                        }
                    }
                    Err(e) => {
                        error!("Read error from client {}: {}", client_id, e);
                        break;
                    }
                }
            }

            msg = broadcast_rx.recv() => {
                let encoded = match msg {
                    Ok(BroadcastMessage::StateUpdated) => encode_state(&snapshot).await,
                    Ok(BroadcastMessage::Status { station, status, detail }) => {
                        Message::Broadcast(Broadcast::Status { station, status, detail }).encode()
                    }
                    Ok(BroadcastMessage::NowPlaying { title, listeners }) => {
                        Message::Broadcast(Broadcast::NowPlaying { title, listeners }).encode()
                    }
                    Ok(BroadcastMessage::Log(message)) => {
                        Message::Broadcast(Broadcast::Log { message }).encode()
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} missed {} broadcast messages", client_id, n);
                        encode_state(&snapshot).await
                    }
                    Err(_) => break,
                };
                if let Ok(bytes) = encoded {
                    if write_half.write_all(&bytes).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

async fn encode_hello(snapshot: &RwLock<SessionSnapshot>) -> anyhow::Result<Vec<u8>> {
    let state = snapshot.read().await.clone();
    Message::Broadcast(Broadcast::Hello {
        protocol_version: PROTOCOL_VERSION,
        rev: state.rev,
        state,
    })
    .encode()
}

async fn encode_state(snapshot: &RwLock<SessionSnapshot>) -> anyhow::Result<Vec<u8>> {
    let state = snapshot.read().await.clone();
    Message::Broadcast(Broadcast::State { data: state }).encode()
}
