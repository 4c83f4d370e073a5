//! Country geometry: centroid lookup, deterministic jitter fallback, and
//! the border polylines drawn on the globe.
//!
//! Centroids come from a JSON object mapping ISO-2 codes to `[lat, lon]`
//! pairs; borders from a JSON array of polylines. Both load from a local
//! path or an http(s) URL. Load failure is a hard startup error -- the
//! resolver itself tolerates being empty (every lookup then falls through
//! to the jitter ring), but a dashboard with no map is a misconfiguration.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::time::Duration;

/// Country-code to centroid table. Coordinates are `(lat, lon)` degrees.
pub struct GeoResolver {
    centroids: HashMap<String, (f32, f32)>,
}

impl GeoResolver {
    /// A resolver with no table; every lookup misses. The pipeline keeps
    /// running in this mode, everything falls through to the jitter ring.
    #[allow(dead_code)]
    pub fn empty() -> Self {
        Self {
            centroids: HashMap::new(),
        }
    }

    /// Parse a centroid table from JSON text.
    pub fn from_json(text: &str) -> io::Result<Self> {
        let table: HashMap<String, [f64; 2]> = serde_json::from_str(text)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("centroid table: {}", e)))?;
        let centroids = table
            .into_iter()
            .map(|(code, pair)| (code.to_ascii_uppercase(), (pair[0] as f32, pair[1] as f32)))
            .collect();
        Ok(Self { centroids })
    }

    /// Load from a file path or http(s) URL.
    pub fn load(source: &str) -> io::Result<Self> {
        Self::from_json(&read_source(source)?)
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Country codes known to the table, in arbitrary order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.centroids.keys().map(String::as_str)
    }

    /// Case-insensitive exact lookup. None when the code is absent or the
    /// table never loaded.
    pub fn resolve(&self, code: &str) -> Option<(f32, f32)> {
        self.centroids.get(&code.to_ascii_uppercase()).copied()
    }

    /// Lookup with deterministic jitter fallback.
    pub fn resolve_or_jitter(&self, code: &str) -> (f32, f32) {
        self.resolve(code)
            .unwrap_or_else(|| resolve_with_fallback(code))
    }
}

/// Deterministic jitter: hash the seed onto a ring around (0, 0) with a
/// radius in [10, 22) degrees. Pure -- the same seed always lands on the
/// same point, so an unknown code stays visually stable across a session
/// while distinct seeds spread out.
pub fn resolve_with_fallback(seed: &str) -> (f32, f32) {
    let h = seed_hash(seed);
    let radius = 10.0 + (h % 1200) as f32 / 100.0;
    let angle = (((h / 1200) % 360) as f32).to_radians();
    (radius * angle.sin(), radius * angle.cos())
}

/// Polynomial rolling hash over character codes. Stable across runs.
fn seed_hash(seed: &str) -> u64 {
    seed.chars()
        .fold(0u64, |h, c| h.wrapping_mul(31).wrapping_add(c as u64))
}

/// Border polylines for rendering, `(lat, lon)` degrees per vertex.
pub struct BorderSet {
    pub polylines: Vec<Vec<(f32, f32)>>,
}

impl BorderSet {
    pub fn from_json(text: &str) -> io::Result<Self> {
        let raw: Vec<Vec<[f64; 2]>> = serde_json::from_str(text)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("border set: {}", e)))?;
        let polylines = raw
            .into_iter()
            .map(|line| {
                line.into_iter()
                    .map(|pair| (pair[0] as f32, pair[1] as f32))
                    .collect()
            })
            .collect();
        Ok(Self { polylines })
    }

    pub fn load(source: &str) -> io::Result<Self> {
        Self::from_json(&read_source(source)?)
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.polylines.is_empty()
    }
}

/// Read reference data from a local file or over HTTP.
fn read_source(source: &str) -> io::Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let resp = ureq::get(source)
            .timeout(Duration::from_secs(5))
            .call()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("fetch {}: {}", source, e)))?;
        resp.into_string()
    } else {
        fs::read_to_string(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> GeoResolver {
        GeoResolver::from_json(r#"{"us": [39.8, -98.6], "DE": [51.2, 10.4]}"#).unwrap()
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let geo = table();
        assert_eq!(geo.resolve("US"), Some((39.8, -98.6)));
        assert_eq!(geo.resolve("us"), Some((39.8, -98.6)));
        assert_eq!(geo.resolve("de"), Some((51.2, 10.4)));
    }

    #[test]
    fn resolve_misses_unknown_codes() {
        let geo = table();
        assert_eq!(geo.resolve("ZZ"), None);
        assert_eq!(GeoResolver::empty().resolve("US"), None);
    }

    #[test]
    fn fallback_is_pure() {
        let a = resolve_with_fallback("ZZ:GLOBAL");
        let b = resolve_with_fallback("ZZ:GLOBAL");
        assert_eq!(a.0.to_bits(), b.0.to_bits());
        assert_eq!(a.1.to_bits(), b.1.to_bits());
    }

    #[test]
    fn fallback_stays_in_radius_band() {
        for seed in ["", "US", "GLOBAL", "a-long-seed-string", "??"] {
            let (lat, lon) = resolve_with_fallback(seed);
            let r = (lat * lat + lon * lon).sqrt();
            assert!((10.0..22.0).contains(&r), "seed {:?} radius {}", seed, r);
        }
    }

    #[test]
    fn fallback_spreads_distinct_seeds() {
        let a = resolve_with_fallback("US:GLOBAL");
        let b = resolve_with_fallback("CN:GLOBAL");
        assert!(a != b);
    }

    #[test]
    fn resolve_or_jitter_prefers_table() {
        let geo = table();
        assert_eq!(geo.resolve_or_jitter("US"), (39.8, -98.6));
        assert_eq!(geo.resolve_or_jitter("ZZ"), resolve_with_fallback("ZZ"));
    }

    #[test]
    fn bad_reference_data_is_an_error() {
        assert!(GeoResolver::from_json("[1,2,3]").is_err());
        assert!(BorderSet::from_json(r#"{"not": "a list"}"#).is_err());
    }

    #[test]
    fn border_set_parses_polylines() {
        let borders =
            BorderSet::from_json(r#"[[[0.0, 0.0], [1.0, 1.0]], [[50.0, 8.0], [51.0, 9.0], [52.0, 10.0]]]"#)
                .unwrap();
        assert_eq!(borders.polylines.len(), 2);
        assert_eq!(borders.polylines[1][2], (52.0, 10.0));
        assert!(!borders.is_empty());
    }
}
