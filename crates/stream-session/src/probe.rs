//! Best-effort availability check for a stream URL.
//!
//! Purely diagnostic: playback never waits on a probe.  A probe resolves
//! exactly once, never errors and reports `false` on timeout, transport or
//! status failures.
use std::future::Future;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::time::{timeout_at, Instant};
use tracing::debug;

pub trait AvailabilityProbe {
    fn probe(&self, url: &str, timeout: Duration) -> impl Future<Output = bool> + Send;
}

/// `HEAD` first; if the server refuses or answers non-success, open a
/// throwaway streaming `GET` and wait for the first body chunk.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl AvailabilityProbe for HttpProbe {
    fn probe(&self, url: &str, timeout: Duration) -> impl Future<Output = bool> + Send {
        let client = self.client.clone();
        let url = url.to_string();
        async move {
            let deadline = Instant::now() + timeout;
            let available = probe_inner(&client, &url, deadline).await;
            debug!("probe: {} → {}", url, available);
            available
        }
    }
}

async fn probe_inner(client: &Client, url: &str, deadline: Instant) -> bool {
    match timeout_at(deadline, client.head(url).send()).await {
        Ok(Ok(resp)) if resp.status().is_success() => return true,
        Ok(Ok(resp)) if resp.status() != StatusCode::METHOD_NOT_ALLOWED => {
            debug!("probe: HEAD {} returned {}, trying GET", url, resp.status());
        }
        Ok(Ok(_)) => debug!("probe: HEAD not allowed for {}", url),
        Ok(Err(e)) => debug!("probe: HEAD {} failed: {}", url, e),
        Err(_) => return false,
    }

    // The response (and its connection) is dropped as soon as this returns.
    let resp = match timeout_at(deadline, client.get(url).send()).await {
        Ok(Ok(resp)) if resp.status().is_success() => resp,
        Ok(Ok(resp)) => {
            debug!("probe: GET {} returned {}", url, resp.status());
            return false;
        }
        Ok(Err(e)) => {
            debug!("probe: GET {} failed: {}", url, e);
            return false;
        }
        Err(_) => return false,
    };

    let mut body = resp.bytes_stream();
    matches!(
        timeout_at(deadline, body.next()).await,
        Ok(Some(Ok(chunk))) if !chunk.is_empty()
    )
}
