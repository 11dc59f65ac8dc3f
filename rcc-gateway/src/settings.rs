//! Gateway settings

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rcc_adapter::GENERIC_VENDOR;
use rcc_sim::SimRadioConfig;
use serde::{Deserialize, Serialize};

/// Gateway settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Simulated radios to register on startup
    #[serde(default = "default_radios")]
    pub radios: Vec<SimRadioConfig>,
    /// Radio to select once registration finishes
    #[serde(default)]
    pub active_radio: Option<String>,
}

fn default_radios() -> Vec<SimRadioConfig> {
    vec![
        SimRadioConfig {
            id: "silvus-1".to_string(),
            ..SimRadioConfig::default()
        },
        SimRadioConfig {
            id: "generic-1".to_string(),
            vendor: GENERIC_VENDOR.to_string(),
            model: "Generic-Sim".to_string(),
            initial_power_dbm: 10.0,
            expose_band_plan: false,
            ..SimRadioConfig::default()
        },
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            radios: default_radios(),
            active_radio: None,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for rcc
    /// Uses $XDG_CONFIG_HOME/rcc on Linux/macOS, falls back to ~/.config/rcc
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("rcc"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("rcc"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, writing the defaults on first run
    pub fn load_or_init() -> Result<Self> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        if path.exists() {
            return Self::load_from(&path);
        }

        let settings = Self::default();
        settings.save_to(&path)?;
        tracing::info!(path = %path.display(), "Wrote default settings");
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json).context("Failed to write settings")?;
        Ok(())
    }

    /// Radio to select on startup: the configured one, else the first declared
    pub fn startup_radio(&self) -> Option<&str> {
        self.active_radio
            .as_deref()
            .or_else(|| self.radios.first().map(|r| r.id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_declare_two_vendors() {
        let settings = Settings::default();
        let vendors: Vec<_> = settings.radios.iter().map(|r| r.vendor.as_str()).collect();
        assert_eq!(vendors, vec!["silvus", "generic"]);
        assert_eq!(settings.startup_radio(), Some("silvus-1"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            active_radio: Some("generic-1".to_string()),
            ..Settings::default()
        };

        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path).unwrap();

        assert_eq!(loaded, settings);
        assert_eq!(loaded.startup_radio(), Some("generic-1"));
    }

    #[test]
    fn test_save_creates_config_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rcc").join("settings.json");

        Settings::default().save_to(&path).unwrap();

        assert!(path.exists());
        assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"activeRadio": "silvus-1"}"#).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.radios, default_radios());
        assert_eq!(loaded.active_radio.as_deref(), Some("silvus-1"));
    }

    #[test]
    fn test_partial_radio_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"radios": [{"id": "lab", "latencyMs": 50}]}"#).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.radios.len(), 1);
        assert_eq!(loaded.radios[0].id, "lab");
        assert_eq!(loaded.radios[0].latency_ms, 50);
        assert_eq!(loaded.radios[0].model, "SilvusMock-Test");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_empty_radio_list_has_no_startup_radio() {
        let settings = Settings {
            radios: Vec::new(),
            active_radio: None,
        };
        assert_eq!(settings.startup_radio(), None);
    }
}
