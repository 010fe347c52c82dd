use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::timer::{TimerSettings, DEFAULT_HOLD_MS, DEFAULT_INSPECTION_MS, TOUCH_HOLD_MS};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub inspection_enabled: bool,
    pub inspection_duration_ms: u64,
    /// Explicit hold time; when unset the device default applies
    pub hold_duration_ms: Option<u64>,
    pub touch_primary: bool,
    /// Key name of the primary control, e.g. "space" or "enter"
    pub primary_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inspection_enabled: true,
            inspection_duration_ms: DEFAULT_INSPECTION_MS,
            hold_duration_ms: None,
            touch_primary: false,
            primary_key: "space".to_string(),
        }
    }
}

impl Config {
    pub fn hold_duration_ms(&self) -> u64 {
        self.hold_duration_ms.unwrap_or(if self.touch_primary {
            TOUCH_HOLD_MS
        } else {
            DEFAULT_HOLD_MS
        })
    }

    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            hold_duration_ms: self.hold_duration_ms(),
            inspection_duration_ms: self.inspection_duration_ms,
            inspection_enabled: self.inspection_enabled,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "cubik") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("cubik_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nested").join("config.json"));
        let cfg = Config {
            inspection_enabled: false,
            inspection_duration_ms: 8_000,
            hold_duration_ms: Some(150),
            touch_primary: true,
            primary_key: "enter".into(),
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn malformed_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"inspection_enabled": false}"#).unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert!(!cfg.inspection_enabled);
        assert_eq!(cfg.inspection_duration_ms, DEFAULT_INSPECTION_MS);
    }

    #[test]
    fn hold_duration_follows_device() {
        let mut cfg = Config::default();
        assert_eq!(cfg.timer_settings().hold_duration_ms, DEFAULT_HOLD_MS);
        cfg.touch_primary = true;
        assert_eq!(cfg.timer_settings().hold_duration_ms, TOUCH_HOLD_MS);
        cfg.hold_duration_ms = Some(0);
        assert_eq!(cfg.timer_settings().hold_duration_ms, 0);
    }
}
