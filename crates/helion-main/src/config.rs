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

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use helion_types::{AppConfig, ConfigError};

/// Configuration file path: HELION_CONFIG or ./config.toml
pub fn default_path() -> PathBuf {
    std::env::var("HELION_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}

/// Load, override from the environment, and validate the configuration.
/// Any validation failure is fatal to startup - nothing may poll with an
/// unresolved sensor name.
pub fn load(path: &Path) -> Result<AppConfig> {
    info!("📋 Loading configuration from {}", path.display());

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let mut config: AppConfig =
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;

    // Secrets may come from the environment instead of the config file
    if let Ok(password) = std::env::var("HELION_INVERTER_PASSWORD")
        && !password.trim().is_empty()
    {
        config.inverter.password = password;
    }
    if let Ok(token) = std::env::var("HELION_HA_TOKEN")
        && !token.trim().is_empty()
    {
        config.home_assistant.token = Some(token);
    }

    config.validate()?;
    Ok(config)
}
