//! Application configuration.
//!
//! The configuration lives in `<data_dir>/config.json`. A file passed
//! explicitly may also be TOML, selected by its `.toml` extension.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Device;
use crate::error::{Error, Result};
use crate::session::Policy;

/// Config file name inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Segment categories accepted in `skip_categories`, as `(id, name)`.
pub const SKIP_CATEGORIES: &[(&str, &str)] = &[
    ("sponsor", "Sponsor"),
    ("selfpromo", "Self Promotion"),
    ("intro", "Intro"),
    ("outro", "Outro"),
    ("music_offtopic", "Music Offtopic"),
    ("interaction", "Interaction"),
    ("exclusive_access", "Exclusive Access"),
    ("poi_highlight", "POI Highlight"),
    ("preview", "Preview"),
    ("filler", "Filler"),
];

/// A configured screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub screen_id: String,
    #[serde(default)]
    pub name: String,
    /// Latency compensation in seconds
    #[serde(default)]
    pub offset: f64,
}

/// A channel whose videos are never skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    /// YouTube Data API key, required for the channel whitelist
    #[serde(default)]
    pub apikey: String,
    #[serde(default = "default_skip_categories")]
    pub skip_categories: Vec<String>,
    #[serde(default)]
    pub channel_whitelist: Vec<ChannelInfo>,
    #[serde(default = "default_true")]
    pub skip_count_tracking: bool,
    #[serde(default)]
    pub mute_ads: bool,
    #[serde(default)]
    pub skip_ads: bool,
    #[serde(default = "default_true")]
    pub auto_play: bool,
    #[serde(default = "default_join_name")]
    pub join_name: String,
    #[serde(default)]
    pub debug: bool,
}

fn default_skip_categories() -> Vec<String> {
    vec!["sponsor".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_join_name() -> String {
    "skiptv".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            apikey: String::new(),
            skip_categories: default_skip_categories(),
            channel_whitelist: Vec::new(),
            skip_count_tracking: true,
            mute_ads: false,
            skip_ads: false,
            auto_play: true,
            join_name: default_join_name(),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Load and validate the config file in `data_dir`.
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        Self::load(&data_dir.join(CONFIG_FILE_NAME))
    }

    /// Load and validate a config file, as TOML when the extension is
    /// `.toml` and JSON otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        let config = if is_toml(path) {
            Self::from_toml(&content)?
        } else {
            Self::from_json(&content)?
        };
        debug!(path = %path.display(), devices = config.devices.len(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(Error::validation("No devices configured"));
        }

        for device in &self.devices {
            if device.screen_id.trim().is_empty() {
                return Err(Error::validation("Device screen_id cannot be empty"));
            }
            if !device.offset.is_finite() {
                return Err(Error::validation(format!(
                    "Device {} has a non-finite offset",
                    device.screen_id
                )));
            }
        }

        if let Some(unknown) = self
            .skip_categories
            .iter()
            .find(|category| !is_known_category(category))
        {
            return Err(Error::validation(format!(
                "Unknown skip category '{unknown}'"
            )));
        }

        Ok(())
    }

    /// Ad and autoplay behaviour.
    pub fn policy(&self) -> Policy {
        Policy {
            mute_ads: self.mute_ads,
            skip_ads: self.skip_ads,
            auto_play: self.auto_play,
        }
    }

    pub fn devices(&self) -> Vec<Device> {
        self.devices
            .iter()
            .map(|device| Device::new(&device.screen_id, &device.name, device.offset))
            .collect()
    }

    /// Whitelisted channel ids.
    pub fn whitelist(&self) -> HashSet<String> {
        self.channel_whitelist
            .iter()
            .map(|channel| channel.id.clone())
            .collect()
    }

    /// Whether channel lookups are needed and possible.
    pub fn whitelist_enabled(&self) -> bool {
        !self.channel_whitelist.is_empty() && !self.apikey.is_empty()
    }
}

/// Resolve the config path from an explicit override or the data directory.
pub fn config_path(data_dir: &Path, explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(|| data_dir.join(CONFIG_FILE_NAME), Path::to_path_buf)
}

pub fn is_known_category(id: &str) -> bool {
    SKIP_CATEGORIES.iter().any(|(known, _)| *known == id)
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}
