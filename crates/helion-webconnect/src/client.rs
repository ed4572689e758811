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

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use helion_core::InverterSession;
use helion_types::Group;

use crate::errors::{SessionError, SessionResult};

const URL_LOGIN: &str = "/dyn/login.json";
const URL_LOGOUT: &str = "/dyn/logout.json";
const URL_VALUES: &str = "/dyn/getValues.json";

/// WebConnect session client.
///
/// Logs in lazily on the first value read, keeps the session id for
/// subsequent batches and re-authenticates once when the device reports an
/// expired session.
pub struct WebConnectClient {
    base_url: String,
    password: String,
    group: Group,
    client: reqwest::Client,
    sid: Mutex<Option<String>>,
}

impl std::fmt::Debug for WebConnectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebConnectClient")
            .field("base_url", &self.base_url)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

impl WebConnectClient {
    /// Create a new WebConnect client for the given host
    pub fn new(
        host: impl AsRef<str>,
        ssl: bool,
        password: impl Into<String>,
        group: Group,
    ) -> SessionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(ssl)
            .build()
            .map_err(|e| SessionError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let scheme = if ssl { "https" } else { "http" };
        Ok(Self {
            base_url: format!("{}://{}", scheme, host.as_ref()),
            password: password.into(),
            group,
            client,
            sid: Mutex::new(None),
        })
    }

    /// Authenticate and store the session id
    pub async fn login(&self) -> SessionResult<String> {
        let url = format!("{}{}", self.base_url, URL_LOGIN);
        debug!("🔑 [WEBCONNECT] Logging in as group '{}'", self.group);

        let response = self
            .client
            .post(&url)
            .json(&json!({"right": self.group.right(), "pass": self.password}))
            .send()
            .await?;

        let body: Value = response.json().await?;
        let sid = body
            .get("result")
            .and_then(|r| r.get("sid"))
            .and_then(Value::as_str)
            .ok_or_else(|| SessionError::AuthenticationFailed(self.group.to_string()))?
            .to_string();

        info!("✅ [WEBCONNECT] Session established");
        *self.sid.lock().await = Some(sid.clone());
        Ok(sid)
    }

    /// Release the device session
    pub async fn logout(&self) -> SessionResult<()> {
        let mut guard = self.sid.lock().await;
        let Some(sid) = guard.take() else {
            return Ok(());
        };

        let url = format!("{}{}?sid={}", self.base_url, URL_LOGOUT, sid);
        debug!("🔒 [WEBCONNECT] Logging out");
        self.client.post(&url).json(&json!({})).send().await?;
        Ok(())
    }

    /// Read raw values for the given keys in one batch call.
    ///
    /// Returns `Ok(None)` when the device produced no usable result this
    /// round (also after a failed re-login on session expiry) - the poller
    /// treats that as a transient read failure.
    pub async fn get_values(&self, keys: &[String]) -> SessionResult<Option<Vec<Option<f64>>>> {
        let body = match self.request_values(keys).await? {
            Some(body) => body,
            None => return Ok(None),
        };

        // An "err" field means the session expired; log in again and retry
        // the batch once.
        let body = if body.get("err").is_some() {
            debug!("Session expired, re-authenticating");
            self.login().await?;
            match self.request_values(keys).await? {
                Some(body) if body.get("err").is_none() => body,
                _ => return Ok(None),
            }
        } else {
            body
        };

        Ok(extract_values(&body, keys))
    }

    /// One getValues POST, logging in first when no session exists yet
    async fn request_values(&self, keys: &[String]) -> SessionResult<Option<Value>> {
        // Clone out of the lock before a possible login, which locks again
        let existing = self.sid.lock().await.clone();
        let sid = match existing {
            Some(sid) => sid,
            None => self.login().await?,
        };

        let url = format!("{}{}?sid={}", self.base_url, URL_VALUES, sid);
        debug!("🔍 [WEBCONNECT] Reading {} keys", keys.len());

        let response = self
            .client
            .post(&url)
            .json(&json!({"destDev": [], "keys": keys}))
            .send()
            .await?;

        if !response.status().is_success() {
            debug!("Value read failed with status {}", response.status());
            return Ok(None);
        }

        Ok(Some(response.json::<Value>().await?))
    }
}

/// Pull the requested keys out of a getValues response, in key order.
///
/// Values nest as `result.<serial>.<key>."1"[0].val`; a missing or null
/// entry yields a `None` slot. Returns `None` when there is no result
/// object at all.
fn extract_values(body: &Value, keys: &[String]) -> Option<Vec<Option<f64>>> {
    let result = body.get("result")?.as_object()?;
    // One device per WebConnect endpoint; take the first serial
    let device = result.values().next()?;

    Some(
        keys.iter()
            .map(|key| {
                device
                    .get(key)
                    .and_then(|entry| entry.get("1"))
                    .and_then(Value::as_array)
                    .and_then(|channel| channel.first())
                    .and_then(|sample| sample.get("val"))
                    .and_then(Value::as_f64)
            })
            .collect(),
    )
}

#[async_trait]
impl InverterSession for WebConnectClient {
    async fn read_values(&self, keys: &[String]) -> anyhow::Result<Option<Vec<Option<f64>>>> {
        Ok(self.get_values(keys).await?)
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(self.logout().await?)
    }

    fn name(&self) -> &str {
        "webconnect"
    }
}
