// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Persisted as JSON under the per-user config directory. Missing or
//! unreadable files fall back to defaults so a broken config never blocks
//! a capture.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backends::camera::types::LensFacing;
use crate::constants::{location as location_constants, overlay as overlay_constants};
use crate::errors::{AppError, AppResult};
use crate::location::geocoder::Address;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Location text stamped when resolution fails mid-capture
    pub fallback_location: String,
    /// Camera facing bound at startup
    pub preferred_facing: LensFacing,
    /// Integer upscale factor for the watermark font
    pub overlay_scale: u32,
    /// JPEG quality for the stamped output
    pub jpeg_quality: u8,
    /// Survey-site address stamped onto captures; None falls back to raw
    /// coordinates
    pub site_address: Option<Address>,
    /// Desktop id reported to the location service
    pub desktop_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fallback_location: location_constants::UNAVAILABLE_TEXT.to_string(),
            preferred_facing: LensFacing::default(), // Back camera for survey work
            overlay_scale: overlay_constants::TEXT_SCALE,
            jpeg_quality: overlay_constants::JPEG_QUALITY,
            site_address: None,
            desktop_id: "survey-camera".to_string(),
        }
    }
}

/// Default config file location
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("survey-camera")
        .join("config.json")
}

impl Config {
    /// Load the config from the default path, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Load a config file; any failure yields the defaults
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Save the config to the default path
    pub fn save(&self) -> AppResult<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.fallback_location, "Location unavailable");
        assert_eq!(config.preferred_facing, LensFacing::Back);
        assert!(config.site_address.is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");

        let mut config = Config::default();
        config.fallback_location = "Depot yard".to_string();
        config.site_address = Some(Address {
            locality: Some("Porthaven".to_string()),
            ..Default::default()
        });
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }
}
