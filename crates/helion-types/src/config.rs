// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HelION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::sensor::{CustomSensorSettings, KEY_LENGTH, builtin_names};

/// Configuration errors, all fatal to startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("sensor '{0}' does not exist")]
    UnknownSensor(String),

    #[error("attribute '{attr}' does not exist [{sensor}]")]
    UnknownAttribute { sensor: String, attr: String },

    #[error("custom sensor '{name}': key '{key}' must be exactly 13 characters")]
    InvalidKeyLength { name: String, key: String },

    #[error("no sensors configured")]
    NoSensors,

    #[error("unknown group '{0}'. Supported groups: user, installer")]
    UnknownGroup(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Access role used when authenticating to the inverter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    #[default]
    User,
    Installer,
}

impl Group {
    /// Right identifier the WebConnect login endpoint expects
    pub fn right(&self) -> &'static str {
        match self {
            Self::User => "usr",
            Self::Installer => "istl",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Installer => "installer",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Group {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "installer" => Ok(Self::Installer),
            _ => Err(ConfigError::UnknownGroup(s.to_string())),
        }
    }
}

/// Main application configuration - HelION
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Inverter connection settings
    pub inverter: InverterSettings,

    /// Home Assistant publishing settings
    pub home_assistant: HaSettings,

    /// Sensor name -> attribute names to expose on that entity
    pub sensors: BTreeMap<String, Vec<String>>,

    /// Custom sensor definitions overlaying the built-in table
    #[serde(default)]
    pub custom: BTreeMap<String, CustomSensorSettings>,
}

/// Inverter connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverterSettings {
    /// Hostname or IP of the inverter's WebConnect interface
    pub host: String,

    /// Use https when talking to the inverter
    #[serde(default)]
    pub ssl: bool,

    /// WebConnect password for the configured group
    pub password: String,

    /// Access group to authenticate as
    #[serde(default)]
    pub group: Group,

    /// Polling interval in seconds
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
}

/// Home Assistant publishing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaSettings {
    /// Base URL of Home Assistant, e.g. http://homeassistant.local:8123
    #[serde(default = "default_ha_base_url")]
    pub base_url: String,

    /// Long-lived access token (usually supplied via HELION_HA_TOKEN at runtime)
    #[serde(default)]
    pub token: Option<String>,
}

fn default_scan_interval_secs() -> u64 {
    5
}

fn default_ha_base_url() -> String {
    "http://homeassistant.local:8123".to_string()
}

impl AppConfig {
    /// Validate the configuration before anything polls.
    ///
    /// Every sensor name and attribute name must resolve to a built-in metric
    /// or a declared custom sensor, and custom keys must have the exact
    /// object-id length the device understands.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensors.is_empty() {
            return Err(ConfigError::NoSensors);
        }

        for (name, settings) in &self.custom {
            if settings.key.len() != KEY_LENGTH {
                return Err(ConfigError::InvalidKeyLength {
                    name: name.clone(),
                    key: settings.key.clone(),
                });
            }
        }

        let resolves =
            |name: &str| builtin_names().iter().any(|n| *n == name) || self.custom.contains_key(name);

        for (sensor, attrs) in &self.sensors {
            if !resolves(sensor) {
                return Err(ConfigError::UnknownSensor(sensor.clone()));
            }
            for attr in attrs {
                if !resolves(attr) {
                    return Err(ConfigError::UnknownAttribute {
                        sensor: sensor.clone(),
                        attr: attr.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// All definition names referenced by the configured sensors,
    /// primary names first, attributes after.
    pub fn used_names(&self) -> Vec<String> {
        let mut used = Vec::new();
        for (sensor, attrs) in &self.sensors {
            used.push(sensor.clone());
            used.extend(attrs.iter().cloned());
        }
        used
    }
}
