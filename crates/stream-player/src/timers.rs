use std::collections::HashMap;
use std::time::Duration;

use stream_session::{SessionEvent, TimerId, TimerKind, TimerScheduler};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::core::PlayerEvent;

/// One sleeping task per armed kind; a fire is delivered back into the core
/// loop as `SessionEvent::TimerFired`.
pub struct TokioTimers {
    tx: mpsc::Sender<PlayerEvent>,
    armed: HashMap<TimerKind, AbortHandle>,
}

impl TokioTimers {
    pub fn new(tx: mpsc::Sender<PlayerEvent>) -> Self {
        Self {
            tx,
            armed: HashMap::new(),
        }
    }
}

impl TimerScheduler for TokioTimers {
    fn arm(&mut self, id: TimerId, delay: Duration) {
        self.cancel(id.kind);
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx
                .send(PlayerEvent::Session(SessionEvent::TimerFired(id)))
                .await;
        });
        self.armed.insert(id.kind, task.abort_handle());
    }

    fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.armed.remove(&kind) {
            handle.abort();
        }
    }

    fn cancel_all(&mut self) {
        for (kind, handle) in self.armed.drain() {
            debug!("timers: cancel {:?}", kind);
            handle.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(kind: TimerKind) -> TimerId {
        TimerId {
            kind,
            generation: 3,
        }
    }

    async fn next_fire(rx: &mut mpsc::Receiver<PlayerEvent>, within: Duration) -> Option<TimerId> {
        match tokio::time::timeout(within, rx.recv()).await {
            Ok(Some(PlayerEvent::Session(SessionEvent::TimerFired(id)))) => Some(id),
            _ => None,
        }
    }

    #[tokio::test]
    async fn fires_with_generation() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = TokioTimers::new(tx);
        timers.arm(id(TimerKind::Reconnect), Duration::from_millis(10));
        let fired = next_fire(&mut rx, Duration::from_secs(1)).await;
        assert_eq!(fired, Some(id(TimerKind::Reconnect)));
    }

    #[tokio::test]
    async fn rearming_replaces_and_cancel_all_silences() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = TokioTimers::new(tx);
        timers.arm(id(TimerKind::HealthTick), Duration::from_millis(20));
        timers.arm(id(TimerKind::HealthTick), Duration::from_millis(40));
        assert!(next_fire(&mut rx, Duration::from_secs(1)).await.is_some());
        assert!(next_fire(&mut rx, Duration::from_millis(100)).await.is_none());

        timers.arm(id(TimerKind::Heartbeat), Duration::from_millis(20));
        timers.arm(id(TimerKind::Autoplay), Duration::from_millis(20));
        timers.cancel_all();
        assert!(next_fire(&mut rx, Duration::from_millis(100)).await.is_none());
    }
}
