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

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::{HaError, HaResult};

/// Home Assistant REST API client
#[derive(Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Client,
}

impl std::fmt::Debug for HomeAssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HomeAssistantClient {
    /// Create a new HA client with custom configuration
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> HaResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HaError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            token: token.into(),
            client,
        })
    }

    /// Create HA client from configuration values
    /// Falls back to the HELION_HA_TOKEN environment variable if the config
    /// does not carry a token
    pub fn from_config(base_url: impl Into<String>, token: Option<String>) -> HaResult<Self> {
        let token = token
            .or_else(|| std::env::var("HELION_HA_TOKEN").ok())
            .ok_or_else(|| {
                HaError::ConfigError(
                    "HA token not found in config or HELION_HA_TOKEN environment variable"
                        .to_string(),
                )
            })?;

        let base_url = base_url.into();
        info!("Initializing HA client for {}", base_url);
        Self::new(base_url, token)
    }

    /// Set or replace the state of an entity.
    /// Home Assistant creates the entity on the first post.
    pub async fn post_state(&self, entity_id: &str, body: &Value) -> HaResult<()> {
        let url = format!(
            "{}/api/states/{}",
            self.base_url.trim_end_matches('/'),
            entity_id
        );
        debug!("📤 [HA PUBLISH] {} = {}", entity_id, body);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        match response.status() {
            // 200 on update, 201 when the entity was just created
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(HaError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(HaError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Health check - ping HA API
    pub async fn ping(&self) -> HaResult<bool> {
        let url = format!("{}/api/", self.base_url.trim_end_matches('/'));
        debug!("Performing health check");

        match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => {
                let is_ok = response.status().is_success();
                if !is_ok {
                    warn!("Health check failed: status {}", response.status());
                }
                Ok(is_ok)
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_post_state_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/states/sensor.total_yield")
            .match_header("authorization", "Bearer test_token")
            .match_body(Matcher::Json(json!({
                "state": "123",
                "attributes": {"unit_of_measurement": "kWh"}
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let result = client
            .post_state(
                "sensor.total_yield",
                &json!({
                    "state": "123",
                    "attributes": {"unit_of_measurement": "kWh"}
                }),
            )
            .await;

        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_state_created_is_success() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/states/sensor.total_yield")
            .with_status(201)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let result = client
            .post_state("sensor.total_yield", &json!({"state": "123"}))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_post_state_unauthorized() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/states/sensor.total_yield")
            .with_status(401)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "bad_token").unwrap();
        let result = client
            .post_state("sensor.total_yield", &json!({"state": "123"}))
            .await;

        assert!(matches!(result, Err(HaError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_post_state_server_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/states/sensor.total_yield")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        let result = client
            .post_state("sensor.total_yield", &json!({"state": "123"}))
            .await;

        assert!(matches!(
            result,
            Err(HaError::ApiError { status: 500, message }) if message == "boom"
        ));
    }

    #[tokio::test]
    async fn test_ping() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .create_async()
            .await;

        let client = HomeAssistantClient::new(server.url(), "test_token").unwrap();
        assert!(client.ping().await.unwrap());
        mock.assert_async().await;
    }
}
