//! TOML station catalogue.
//!
//! ```toml
//! [[station]]
//! id = "deep"
//! name = "Deep House"
//! base_url = "https://radio.example.com"
//! mount = "deep"
//! active = true
//! ```
use std::collections::HashSet;
use std::path::Path;

use tracing::warn;

use crate::protocol::StationDescriptor;

/// Matches the TOML `[[station]]` table.  Kept separate from
/// `StationDescriptor` so the file schema can diverge from the wire struct.
#[derive(Debug, serde::Deserialize)]
struct TomlStationFile {
    #[serde(default)]
    station: Vec<TomlStation>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlStation {
    id: String,
    name: String,
    base_url: String,
    mount: String,
    #[serde(default)]
    active: bool,
}

pub fn load_stations_from_toml(path: &Path) -> anyhow::Result<Vec<StationDescriptor>> {
    if !path.exists() {
        anyhow::bail!("no station catalogue at {}", path.display());
    }
    let content = std::fs::read_to_string(path)?;
    parse_stations_from_toml_str(&content)
}

/// Parse and validate a station catalogue.
///
/// Ids must be unique and non-empty.  If more than one station is flagged
/// `active` only the first keeps the flag.
pub fn parse_stations_from_toml_str(content: &str) -> anyhow::Result<Vec<StationDescriptor>> {
    let file: TomlStationFile = toml::from_str(content)?;
    if file.station.is_empty() {
        anyhow::bail!("station catalogue is empty");
    }

    let mut seen = HashSet::new();
    let mut active_seen = false;
    let mut stations = Vec::with_capacity(file.station.len());

    for s in file.station {
        if s.id.trim().is_empty() {
            anyhow::bail!("station '{}' has an empty id", s.name);
        }
        if !seen.insert(s.id.clone()) {
            anyhow::bail!("duplicate station id '{}'", s.id);
        }
        let active = if s.active && active_seen {
            warn!("stations: '{}' also marked active, ignoring", s.id);
            false
        } else {
            s.active
        };
        active_seen |= active;

        stations.push(StationDescriptor {
            id: s.id,
            name: s.name,
            base_url: s.base_url,
            mount: s.mount,
            active,
        });
    }
    Ok(stations)
}
