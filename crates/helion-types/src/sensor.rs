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
use tracing::warn;

/// Length of a WebConnect object id, e.g. "6400_00260100"
pub const KEY_LENGTH: usize = 13;

/// Well-known metric keys of the WebConnect value API
pub const KEY_CURRENT_CONSUMPTION_W: &str = "6100_00543100";
pub const KEY_CURRENT_POWER_W: &str = "6100_40263F00";
pub const KEY_TOTAL_CONSUMPTION_KWH: &str = "6400_00543A00";
pub const KEY_TOTAL_YIELD_KWH: &str = "6400_00260100";

/// How a named metric maps onto the device: raw key, display unit and the
/// factor raw values are divided by to reach display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDefinition {
    pub key: String,
    pub unit: String,
    pub factor: f64,
}

impl SensorDefinition {
    pub fn new(key: impl Into<String>, unit: impl Into<String>, factor: f64) -> Self {
        Self {
            key: key.into(),
            unit: unit.into(),
            factor,
        }
    }
}

/// A user-supplied custom sensor definition from the `[custom]` config table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomSensorSettings {
    /// Raw object id understood by the device (exactly [`KEY_LENGTH`] chars)
    pub key: String,

    /// Display unit, e.g. "kWh"
    pub unit: String,

    /// Divisor applied to raw values
    #[serde(default = "default_factor")]
    pub factor: f64,
}

fn default_factor() -> f64 {
    1.0
}

/// Names of the built-in metrics, in table order
pub fn builtin_names() -> [&'static str; 4] {
    [
        "current_consumption",
        "current_power",
        "total_consumption",
        "total_yield",
    ]
}

fn builtin_definitions() -> BTreeMap<String, SensorDefinition> {
    BTreeMap::from([
        (
            "current_consumption".to_string(),
            SensorDefinition::new(KEY_CURRENT_CONSUMPTION_W, "W", 1.0),
        ),
        (
            "current_power".to_string(),
            SensorDefinition::new(KEY_CURRENT_POWER_W, "W", 1.0),
        ),
        (
            "total_consumption".to_string(),
            SensorDefinition::new(KEY_TOTAL_CONSUMPTION_KWH, "kWh", 1000.0),
        ),
        (
            "total_yield".to_string(),
            SensorDefinition::new(KEY_TOTAL_YIELD_KWH, "kWh", 1000.0),
        ),
    ])
}

/// Immutable table of name -> [`SensorDefinition`], computed once at startup.
///
/// Built-ins are overlaid with custom entries, then pruned down to the names
/// the configured sensors actually reference - pruned entries would never be
/// polled.
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    defs: BTreeMap<String, SensorDefinition>,
}

impl SensorRegistry {
    /// Build the registry from the built-in table and the custom overlay.
    pub fn build(custom: &BTreeMap<String, CustomSensorSettings>) -> Self {
        let mut defs = builtin_definitions();

        for (name, settings) in custom {
            if defs.contains_key(name) {
                warn!("Custom sensor {} replaces built-in sensor", name);
            }
            defs.insert(
                name.clone(),
                SensorDefinition::new(&settings.key, &settings.unit, settings.factor),
            );
        }

        Self { defs }
    }

    /// Drop entries not referenced by any configured sensor.
    pub fn prune(&mut self, used_names: &[String]) {
        self.defs.retain(|name, _| used_names.iter().any(|n| n == name));
    }

    pub fn get(&self, name: &str) -> Option<&SensorDefinition> {
        self.defs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Definition names in iteration order
    pub fn names(&self) -> Vec<String> {
        self.defs.keys().cloned().collect()
    }

    /// Raw device keys for the given names, in the same order
    pub fn keys_for(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .filter_map(|n| self.defs.get(n).map(|d| d.key.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
