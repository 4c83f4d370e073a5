use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub data: DataSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedSettings {
    /// Candidate endpoints, tried in order.
    #[serde(default)]
    pub endpoints: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DataSettings {
    /// Path or URL of the country-centroid JSON.
    pub centroids: Option<String>,
    /// Path or URL of the border polyline JSON.
    pub borders: Option<String>,
}

impl Settings {
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("netglobe")
            .join("config.toml")
    }
}
