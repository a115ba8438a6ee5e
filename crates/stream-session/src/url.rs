use stream_proto::protocol::{QualityTier, StationDescriptor};

/// Compose a playable mount URL: `{base}/{mount}{kbps}`.
///
/// A single trailing slash on `base_url` is absorbed so it is never doubled.
pub fn build(base_url: &str, mount: &str, quality: QualityTier) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    format!("{}/{}{}", base, mount, quality.kbps())
}

/// Stream URL for a configured station at the given tier.
pub fn station_url(station: &StationDescriptor, quality: QualityTier) -> String {
    build(&station.base_url, &station.mount, quality)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_every_tier() {
        for q in QualityTier::ALL {
            assert_eq!(
                build("https://radio.example.com", "deep", q),
                format!("https://radio.example.com/deep{}", q.kbps())
            );
        }
    }

    #[test]
    fn deep_house_scenario() {
        let station = StationDescriptor {
            id: "deep".into(),
            name: "Deep House".into(),
            base_url: "https://radio.example.com".into(),
            mount: "deep".into(),
            active: false,
        };
        assert_eq!(
            station_url(&station, QualityTier::Kbps320),
            "https://radio.example.com/deep320"
        );
        assert_eq!(
            station_url(&station, QualityTier::Kbps192),
            "https://radio.example.com/deep192"
        );
    }

    #[test]
    fn trailing_slash_not_doubled() {
        assert_eq!(
            build("http://host:8000/", "live", QualityTier::Kbps192),
            "http://host:8000/live192"
        );
    }
}
