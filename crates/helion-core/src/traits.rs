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

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// The published face of a sensor at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    /// Unique sensor name, e.g. "total_yield"
    pub name: String,
    /// Current numeric state in display units, None before the first poll
    pub state: Option<f64>,
    /// Display unit of the state, e.g. "kWh"
    pub unit: String,
    /// Extra attribute display strings, e.g. "current_power" -> "5000 W"
    pub attributes: BTreeMap<String, String>,
}

/// Batch value reader for one inverter session.
/// The poller uses this trait, never knows about WebConnect details.
#[async_trait]
pub trait InverterSession: Send + Sync {
    /// Read raw values for the given keys in one batch call.
    ///
    /// `Ok(Some(values))` carries one slot per requested key, in the same
    /// order; a slot is `None` when the device did not report that value.
    /// `Ok(None)` means the call yielded no result object at all.
    async fn read_values(&self, keys: &[String]) -> Result<Option<Vec<Option<f64>>>>;

    /// Release the device session. Called once on shutdown.
    async fn close(&self) -> Result<()>;

    /// Get session name for logging
    fn name(&self) -> &str;
}

/// Receiver for sensor state changes on the host automation platform
#[async_trait]
pub trait StateSink: Send + Sync {
    /// Publish one sensor snapshot. Publishing the same entity again
    /// replaces its state on the host.
    async fn publish(&self, snapshot: &SensorSnapshot) -> Result<()>;

    /// Get sink name for logging
    fn name(&self) -> &str;
}
