// Application configuration
// Loaded from <config dir>/ambient-loop/config.json, or from a path given
// on the command line. Every field is optional; a missing default file
// just means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::player::catalog::{default_resource_key, Catalog, TrackEntry};
use crate::player::error::CatalogError;
use crate::player::selection::ErrorPolicy;

const APP_DIR: &str = "ambient-loop";
const CONFIG_FILE: &str = "config.json";
const LOG_FILE: &str = "ambient-loop.log";

// A track listed in the config file. `file` is relative to assets_dir
// and defaults to the snake-cased name with a .wav suffix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackConfig {
    pub name: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub credit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub assets_dir: PathBuf,
    pub error_policy: ErrorPolicy,
    pub log_file: Option<PathBuf>,
    // None means the built-in catalog
    pub tracks: Option<Vec<TrackConfig>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            assets_dir: PathBuf::from("assets"),
            error_policy: ErrorPolicy::default(),
            log_file: None,
            tracks: None,
        }
    }
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

impl AppConfig {
    // An explicit path must exist. The default path may not.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match config_dir() {
                Some(dir) => dir.join(CONFIG_FILE),
                None => return Ok(AppConfig::default()),
            },
        };

        if explicit.is_none() && !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(AppConfig::default());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(|| config_dir().map(|dir| dir.join(LOG_FILE)))
    }

    pub fn catalog(&self) -> Result<Catalog, CatalogError> {
        let Some(tracks) = &self.tracks else {
            return Ok(Catalog::builtin(&self.assets_dir));
        };

        let entries = tracks
            .iter()
            .map(|track| {
                let resource_key = match &track.file {
                    Some(file) => self.assets_dir.join(file).to_string_lossy().into_owned(),
                    None => default_resource_key(&self.assets_dir, &track.name),
                };
                let entry = TrackEntry::new(track.name.clone(), resource_key);
                match &track.credit {
                    Some(credit) => entry.with_credit(credit.clone()),
                    None => entry,
                }
            })
            .collect();

        Catalog::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.error_policy, ErrorPolicy::Recoverable);
        assert_eq!(config.catalog().unwrap().len(), 4);
    }

    #[test]
    fn default_config_looks_for_sounds_under_assets() {
        let catalog = AppConfig::default().catalog().unwrap();
        let keys: Vec<&str> = catalog.entries().iter().map(|e| e.resource_key.as_str()).collect();
        let expected: Vec<String> =
            ["rain.wav", "forest.wav", "train-car.wav", "horse-carriage.wav"]
                .iter()
                .map(|file| Path::new("assets").join(file).to_string_lossy().into_owned())
                .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn custom_tracks_replace_the_builtin_catalog() {
        let config = AppConfig::from_json(
            r#"{
                "assets_dir": "/srv/sounds",
                "error_policy": "fatal",
                "tracks": [
                    { "name": "Ocean waves" },
                    { "name": "Fire", "file": "campfire.flac", "credit": "recorded at home" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.error_policy, ErrorPolicy::Fatal);

        let catalog = config.catalog().unwrap();
        let base = Path::new("/srv/sounds");
        assert_eq!(
            catalog.resolve("Ocean waves").unwrap(),
            base.join("ocean-waves.wav").to_string_lossy()
        );
        assert_eq!(
            catalog.resolve("Fire").unwrap(),
            base.join("campfire.flac").to_string_lossy()
        );
        assert_eq!(catalog.get(1).unwrap().credit.as_deref(), Some("recorded at home"));
    }

    #[test]
    fn duplicate_configured_tracks_are_rejected() {
        let config = AppConfig::from_json(r#"{ "tracks": [{ "name": "Rain" }, { "name": "Rain" }] }"#)
            .unwrap();
        assert_eq!(
            config.catalog().unwrap_err(),
            CatalogError::DuplicateTrack("Rain".to_string())
        );
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        assert!(AppConfig::from_json(r#"{ "error_policy": "sometimes" }"#).is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn explicit_log_file_wins() {
        let config = AppConfig::from_json(r#"{ "log_file": "/tmp/ambient.log" }"#).unwrap();
        assert_eq!(config.log_path(), Some(PathBuf::from("/tmp/ambient.log")));
    }
}
