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

mod config;
mod version;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use helion_core::{InverterSession, Poller, StateSink};
use helion_ha::{HaStateSink, HomeAssistantClient};
use helion_types::SensorRegistry;
use helion_webconnect::WebConnectClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Handle command line arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" => {
                println!("HelION - Inverter Sensor Bridge");
                println!("Version: {}", version::VERSION);
                println!();
                println!("Usage: helion [CONFIG_FILE]");
                println!();
                println!("Options:");
                println!("  -h, --help    Print this help message");
                println!("  -v, --version Print version");
                return Ok(());
            }
            "--version" | "-v" => {
                println!("{}", version::VERSION);
                return Ok(());
            }
            _ => {
                // Positional argument is the config file path
            }
        }
    }

    // Initialize tracing with env filter support
    // Respects RUST_LOG environment variable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config_path = args
        .get(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::default_path);
    let app_config = config::load(&config_path)?;

    info!("🚀 Starting HelION - Inverter Sensor Bridge");
    info!("📋 Configuration Summary:");
    info!(
        "   Inverter: {} (ssl: {}, group: {})",
        app_config.inverter.host, app_config.inverter.ssl, app_config.inverter.group
    );
    info!("   Home Assistant: {}", app_config.home_assistant.base_url);
    info!("   Sensors: {}", app_config.sensors.len());
    for (name, attrs) in &app_config.sensors {
        info!("     - {} {:?}", name, attrs);
    }
    info!("   Custom definitions: {}", app_config.custom.len());
    info!(
        "   Scan interval: {}s",
        app_config.inverter.scan_interval_secs
    );

    // Build the definition table and drop entries nothing references
    let mut registry = SensorRegistry::build(&app_config.custom);
    registry.prune(&app_config.used_names());
    info!("📦 Polling {} sensor definitions", registry.len());

    // Host sink: Home Assistant REST state API
    let ha_client = Arc::new(HomeAssistantClient::from_config(
        app_config.home_assistant.base_url.clone(),
        app_config.home_assistant.token.clone(),
    )?);
    if !ha_client.ping().await.unwrap_or(false) {
        warn!("⚠️ Home Assistant is not reachable yet, publishing will retry per cycle");
    }
    let sink: Arc<dyn StateSink> = Arc::new(HaStateSink::new(ha_client));

    // Inverter session
    let session = Arc::new(WebConnectClient::new(
        &app_config.inverter.host,
        app_config.inverter.ssl,
        app_config.inverter.password.clone(),
        app_config.inverter.group,
    )?);
    info!("🔌 Inverter session: {}", session.name());

    let poller = Poller::new(
        &app_config.sensors,
        &registry,
        session.clone() as Arc<dyn InverterSession>,
        Arc::clone(&sink),
    )?;

    // Publish every sensor once so the host registers the entities
    info!("📡 Registering {} sensors", app_config.sensors.len());
    for snapshot in poller.snapshots() {
        if let Err(e) = sink.publish(&snapshot).await {
            warn!("Failed to register {}: {:#}", snapshot.name, e);
        }
    }

    // Run the update cycle until ctrl-c
    let interval = Duration::from_secs(app_config.inverter.scan_interval_secs);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poll_task = tokio::spawn(poller.run(interval, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutdown requested");

    let _ = shutdown_tx.send(true);
    let _ = poll_task.await;

    // Ensure we log out of the device session on shutdown
    if let Err(e) = session.close().await {
        warn!("Failed to close inverter session: {:#}", e);
    }

    info!("👋 HelION stopped");
    Ok(())
}
