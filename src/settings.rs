use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::detection::SamplingConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    sampling: SamplingConfig,
}

/// Settings persisted as JSON next to the database.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            let mut data: UserSettings = serde_json::from_str(&contents).unwrap_or_default();
            if let Err(err) = data.sampling.validate() {
                warn!("Ignoring invalid sampling settings in {}: {err}", path.display());
                data.sampling = SamplingConfig::default();
            }
            data
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn sampling(&self) -> SamplingConfig {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sampling
            .clone()
    }

    /// Validate, store and persist new sampling settings. Invalid settings
    /// leave the current ones untouched.
    pub fn update_sampling(&self, sampling: SamplingConfig) -> Result<()> {
        sampling.validate()?;

        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = guard.clone();
        updated.sampling = sampling;
        self.persist(&updated)?;
        *guard = updated;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.sampling(), SamplingConfig::default());
    }

    #[test]
    fn updates_survive_a_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let config = SamplingConfig {
            window_size: 20,
            record_every: 10,
            ..SamplingConfig::default()
        };
        store.update_sampling(config.clone()).unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.sampling(), config);
    }

    #[test]
    fn invalid_update_is_rejected_and_not_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let bad = SamplingConfig {
            frame_stride: 0,
            ..SamplingConfig::default()
        };
        assert!(store.update_sampling(bad).is_err());
        assert_eq!(store.sampling(), SamplingConfig::default());
        assert!(!path.exists());
    }

    #[test]
    fn unreadable_or_invalid_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(SettingsStore::new(path.clone()).unwrap().sampling(), SamplingConfig::default());

        fs::write(&path, r#"{"sampling": {"windowSize": 500}}"#).unwrap();
        assert_eq!(SettingsStore::new(path).unwrap().sampling(), SamplingConfig::default());
    }
}
