//! Icecast `status-json.xsl` reader.
//!
//! Informational only: failures are logged at debug and never reach the
//! playback state machine.
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NowPlaying {
    pub title: Option<String>,
    pub listeners: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StatusDoc {
    icestats: IceStats,
}

#[derive(Debug, Deserialize)]
struct IceStats {
    /// Icecast emits an object for one source and an array for several.
    #[serde(default)]
    source: Value,
}

#[derive(Debug, Deserialize)]
struct Source {
    #[serde(default)]
    listenurl: String,
    title: Option<String>,
    listeners: Option<u64>,
}

/// Find the source serving `stream_path` (e.g. `deep320`).
pub fn parse_now_playing(json: &str, stream_path: &str) -> Option<NowPlaying> {
    let doc: StatusDoc = serde_json::from_str(json).ok()?;
    let sources: Vec<Value> = match doc.icestats.source {
        Value::Array(items) => items,
        Value::Null => return None,
        single => vec![single],
    };
    let suffix = format!("/{}", stream_path.trim_start_matches('/'));
    sources
        .into_iter()
        .filter_map(|v| serde_json::from_value::<Source>(v).ok())
        .find(|s| s.listenurl.ends_with(&suffix))
        .map(|s| NowPlaying {
            title: s.title.filter(|t| !t.trim().is_empty()),
            listeners: s.listeners,
        })
}

pub async fn fetch_now_playing(client: &Client, base_url: &str, stream_path: &str) -> Option<NowPlaying> {
    let url = format!("{}/status-json.xsl", base_url.trim_end_matches('/'));
    let resp = match client.get(&url).send().await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            debug!("metadata: {} returned {}", url, r.status());
            return None;
        }
        Err(e) => {
            debug!("metadata: {} failed: {}", url, e);
            return None;
        }
    };
    let text = match resp.text().await {
        Ok(t) => t,
        Err(e) => {
            debug!("metadata: reading {} failed: {}", url, e);
            return None;
        }
    };
    let info = parse_now_playing(&text, stream_path);
    if info.is_none() {
        debug!("metadata: no source for {} in {}", stream_path, url);
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI: &str = r#"{"icestats":{"admin":"x","source":[
        {"listenurl":"http://radio.example:8000/deep192","title":"Low","listeners":2},
        {"listenurl":"http://radio.example:8000/deep320","title":"Artist - Track","listeners":17}
    ]}}"#;

    #[test]
    fn matches_source_by_listen_url_suffix() {
        let np = parse_now_playing(MULTI, "deep320").unwrap();
        assert_eq!(np.title.as_deref(), Some("Artist - Track"));
        assert_eq!(np.listeners, Some(17));
        assert!(parse_now_playing(MULTI, "eep320").is_none());
    }

    #[test]
    fn single_source_object_and_blank_title() {
        let json = r#"{"icestats":{"source":{"listenurl":"http://h/jazz320","title":"  "}}}"#;
        let np = parse_now_playing(json, "jazz320").unwrap();
        assert_eq!(np.title, None);
        assert_eq!(np.listeners, None);
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_now_playing("<html>", "deep320").is_none());
        assert!(parse_now_playing(r#"{"icestats":{}}"#, "deep320").is_none());
    }
}
