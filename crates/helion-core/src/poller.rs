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
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use helion_types::SensorRegistry;

use crate::entity::Sensor;
use crate::traits::{InverterSession, StateSink};

/// Number of scheduled ticks skipped after a failed read
pub const BACKOFF_TICKS: u32 = 3;

/// Scale a raw device value into display units.
///
/// Floor division: fractional results truncate downwards, so a total_yield
/// of 123456 Wh with factor 1000 displays as 123 kWh. Sub-unit precision is
/// deliberately dropped.
pub fn scale(raw: f64, factor: f64) -> f64 {
    (raw / factor).floor()
}

/// Polls the inverter session on a fixed interval and pushes changed sensor
/// states to the host sink. Exactly one update cycle is in flight at a time;
/// the poller exclusively owns its sensors.
pub struct Poller {
    session: Arc<dyn InverterSession>,
    sink: Arc<dyn StateSink>,
    sensors: Vec<Sensor>,
    /// Definition names to query each tick
    names: Vec<String>,
    /// Device keys aligned with `names`
    keys: Vec<String>,
    /// Scaling factors aligned with `names`
    factors: Vec<f64>,
    skips_remaining: u32,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("sensors", &self.sensors.len())
            .field("keys", &self.keys)
            .field("skips_remaining", &self.skips_remaining)
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Build the poller from the configured sensors and the pruned registry.
    ///
    /// The registry must already be validated and pruned: every entry is
    /// referenced by some sensor, and every referenced name resolves.
    pub fn new(
        configured: &BTreeMap<String, Vec<String>>,
        registry: &SensorRegistry,
        session: Arc<dyn InverterSession>,
        sink: Arc<dyn StateSink>,
    ) -> Result<Self> {
        let mut sensors = Vec::with_capacity(configured.len());
        for (name, attrs) in configured {
            let sensor = Sensor::new(name, attrs, registry)
                .with_context(|| format!("sensor '{name}' references an unknown definition"))?;
            sensors.push(sensor);
        }

        let names = registry.names();
        let keys = registry.keys_for(&names);
        let factors = names
            .iter()
            .filter_map(|n| registry.get(n).map(|d| d.factor))
            .collect();

        Ok(Self {
            session,
            sink,
            sensors,
            names,
            keys,
            factors,
            skips_remaining: 0,
        })
    }

    /// Snapshots of every sensor, for the initial registration publish
    pub fn snapshots(&self) -> Vec<crate::traits::SensorSnapshot> {
        self.sensors.iter().map(Sensor::snapshot).collect()
    }

    /// One timer tick: poll, scale, apply, publish what changed.
    ///
    /// Never returns an error; failures defer future ticks via backoff.
    pub async fn tick(&mut self) {
        if self.skips_remaining > 0 {
            self.skips_remaining -= 1;
            debug!(
                "Backing off, skipping tick ({} more to skip)",
                self.skips_remaining
            );
            return;
        }

        let values = match self.session.read_values(&self.keys).await {
            Ok(Some(values)) => values,
            Ok(None) => {
                debug!(
                    "{} returned no result, backing off for {} ticks",
                    self.session.name(),
                    BACKOFF_TICKS
                );
                self.skips_remaining = BACKOFF_TICKS;
                return;
            }
            Err(e) => {
                debug!(
                    "{} read failed, backing off for {} ticks: {:#}",
                    self.session.name(),
                    BACKOFF_TICKS,
                    e
                );
                self.skips_remaining = BACKOFF_TICKS;
                return;
            }
        };

        // Missing individual values count as zero, not as errors
        let mut scaled = HashMap::with_capacity(self.names.len());
        for (idx, name) in self.names.iter().enumerate() {
            let raw = values.get(idx).copied().flatten().unwrap_or(0.0);
            scaled.insert(name.clone(), scale(raw, self.factors[idx]));
        }
        debug!("Update sensors {:?} {:?}", self.keys, scaled);

        let mut changed = Vec::new();
        for sensor in &mut self.sensors {
            if sensor.apply(&scaled) {
                changed.push(sensor.snapshot());
            }
        }

        // Fan out one publish task per changed sensor, joined before the
        // cycle completes. Sink errors never abort the cycle.
        let mut tasks = JoinSet::new();
        for snapshot in changed {
            let sink = Arc::clone(&self.sink);
            tasks.spawn(async move {
                if let Err(e) = sink.publish(&snapshot).await {
                    warn!("Failed to publish {}: {:#}", snapshot.name, e);
                }
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    /// Drive the update cycle until the shutdown signal flips.
    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Polling {} keys from {} every {:?}",
            self.keys.len(),
            self.session.name(),
            interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.changed() => {
                    info!("Shutdown signal received, stopping poll loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::SensorSnapshot;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One scripted session response
    enum Reply {
        Values(Vec<Option<f64>>),
        NoResult,
        Error,
    }

    struct FakeSession {
        replies: Mutex<VecDeque<Reply>>,
        calls: AtomicUsize,
    }

    impl FakeSession {
        fn scripted(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InverterSession for FakeSession {
        async fn read_values(&self, keys: &[String]) -> Result<Option<Vec<Option<f64>>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Values(values)) => Ok(Some(values)),
                Some(Reply::NoResult) => Ok(None),
                Some(Reply::Error) => Err(anyhow!("connection reset")),
                None => Ok(Some(vec![Some(0.0); keys.len()])),
            }
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "fake-session"
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<SensorSnapshot>>,
    }

    impl RecordingSink {
        fn published(&self) -> Vec<SensorSnapshot> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StateSink for RecordingSink {
        async fn publish(&self, snapshot: &SensorSnapshot) -> Result<()> {
            self.published.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording-sink"
        }
    }

    /// total_yield exposing current_power as attribute. Query order is the
    /// registry's name order: [current_power, total_yield].
    fn poller_fixture(
        replies: Vec<Reply>,
    ) -> (Poller, Arc<FakeSession>, Arc<RecordingSink>) {
        let configured =
            BTreeMap::from([("total_yield".to_string(), vec!["current_power".to_string()])]);

        let mut registry = SensorRegistry::build(&BTreeMap::new());
        registry.prune(&["total_yield".to_string(), "current_power".to_string()]);

        let session = FakeSession::scripted(replies);
        let sink = Arc::new(RecordingSink::default());
        let poller = Poller::new(
            &configured,
            &registry,
            session.clone() as Arc<dyn InverterSession>,
            sink.clone() as Arc<dyn StateSink>,
        )
        .unwrap();

        (poller, session, sink)
    }

    #[test]
    fn test_scale_floors_fractional_results() {
        assert_eq!(scale(123456.0, 1000.0), 123.0);
        assert_eq!(scale(999.0, 1000.0), 0.0);
        assert_eq!(scale(5000.0, 1.0), 5000.0);
    }

    #[tokio::test]
    async fn test_failed_poll_skips_three_ticks() {
        let (mut poller, session, _sink) = poller_fixture(vec![Reply::NoResult]);

        poller.tick().await;
        assert_eq!(session.calls(), 1);

        // Next 3 scheduled ticks issue no network call
        for _ in 0..3 {
            poller.tick().await;
            assert_eq!(session.calls(), 1);
        }

        // The 4th tick polls again
        poller.tick().await;
        assert_eq!(session.calls(), 2);
    }

    #[tokio::test]
    async fn test_session_error_also_backs_off() {
        let (mut poller, session, _sink) = poller_fixture(vec![Reply::Error]);

        poller.tick().await;
        poller.tick().await;
        assert_eq!(session.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_value_coerced_to_zero() {
        // current_power missing, total_yield raw 123456
        let (mut poller, _session, sink) =
            poller_fixture(vec![Reply::Values(vec![None, Some(123456.0)])]);

        poller.tick().await;

        let published = sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].name, "total_yield");
        assert_eq!(published[0].state, Some(123.0));
        assert_eq!(published[0].unit, "kWh");
        assert_eq!(published[0].attributes["current_power"], "0 W");
    }

    #[tokio::test]
    async fn test_identical_results_publish_once() {
        let batch = vec![Some(5000.0), Some(123456.0)];
        let (mut poller, _session, sink) = poller_fixture(vec![
            Reply::Values(batch.clone()),
            Reply::Values(batch),
        ]);

        poller.tick().await;
        assert_eq!(sink.published().len(), 1);

        poller.tick().await;
        assert_eq!(sink.published().len(), 1);
    }

    #[tokio::test]
    async fn test_only_changed_sensors_published() {
        let configured = BTreeMap::from([
            ("total_yield".to_string(), Vec::new()),
            ("current_power".to_string(), Vec::new()),
        ]);

        let mut registry = SensorRegistry::build(&BTreeMap::new());
        registry.prune(&["total_yield".to_string(), "current_power".to_string()]);

        let session = FakeSession::scripted(vec![
            Reply::Values(vec![Some(5000.0), Some(123456.0)]),
            Reply::Values(vec![Some(4000.0), Some(123456.0)]),
        ]);
        let sink = Arc::new(RecordingSink::default());
        let mut poller = Poller::new(
            &configured,
            &registry,
            session.clone() as Arc<dyn InverterSession>,
            sink.clone() as Arc<dyn StateSink>,
        )
        .unwrap();

        poller.tick().await;
        assert_eq!(sink.published().len(), 2);

        // Only current_power moved; total_yield stays silent
        poller.tick().await;
        let published = sink.published();
        assert_eq!(published.len(), 3);
        assert_eq!(published[2].name, "current_power");
        assert_eq!(published[2].state, Some(4000.0));
    }

    #[tokio::test]
    async fn test_attribute_change_marks_sensor_dirty() {
        let (mut poller, _session, sink) = poller_fixture(vec![
            Reply::Values(vec![Some(5000.0), Some(123456.0)]),
            Reply::Values(vec![Some(4000.0), Some(123456.0)]),
        ]);

        poller.tick().await;
        poller.tick().await;

        let published = sink.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].state, Some(123.0));
        assert_eq!(published[1].attributes["current_power"], "4000 W");
    }

    #[tokio::test]
    async fn test_snapshots_before_first_poll() {
        let (poller, _session, _sink) = poller_fixture(Vec::new());

        let snapshots = poller.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].name, "total_yield");
        assert_eq!(snapshots[0].state, None);
        assert_eq!(snapshots[0].attributes["current_power"], "");
    }
}
