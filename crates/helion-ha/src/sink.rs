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
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::debug;

use helion_core::{SensorSnapshot, StateSink};

use crate::client::HomeAssistantClient;

/// Publishes sensor snapshots as `sensor.<name>` entities over the HA REST
/// state API
pub struct HaStateSink {
    client: Arc<HomeAssistantClient>,
}

impl std::fmt::Debug for HaStateSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaStateSink").finish_non_exhaustive()
    }
}

impl HaStateSink {
    pub fn new(client: Arc<HomeAssistantClient>) -> Self {
        Self { client }
    }
}

/// Entity id and request body for one snapshot
fn state_payload(snapshot: &SensorSnapshot) -> (String, Value) {
    let entity_id = format!("sensor.{}", snapshot.name);

    // HA states are strings; an unpolled sensor shows as unknown
    let state = match snapshot.state {
        Some(value) => format!("{}", value),
        None => "unknown".to_string(),
    };

    let mut attributes = Map::new();
    attributes.insert(
        "unit_of_measurement".to_string(),
        Value::String(snapshot.unit.clone()),
    );
    for (name, display) in &snapshot.attributes {
        attributes.insert(name.clone(), Value::String(display.clone()));
    }

    (entity_id, json!({"state": state, "attributes": attributes}))
}

#[async_trait]
impl StateSink for HaStateSink {
    async fn publish(&self, snapshot: &SensorSnapshot) -> Result<()> {
        let (entity_id, body) = state_payload(snapshot);
        debug!("Publishing {} -> {}", snapshot.name, entity_id);
        self.client.post_state(&entity_id, &body).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "home-assistant"
    }
}
