//! A metrics recorder that periodically logs all captured counters.

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util::registry::{AtomicStorage, Registry};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// The value of one counter at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub key: String,
    pub total: u64,
    /// Increase since the previous snapshot.
    pub delta: u64,
}

/// A metrics recorder that keeps counters in memory and logs them on an interval.
#[derive(Clone)]
pub struct LoggingRecorder {
    registry: Arc<Registry<Key, AtomicStorage>>,
    last_seen: Arc<Mutex<HashMap<String, u64>>>,
}

impl Default for LoggingRecorder {
    fn default() -> Self {
        Self {
            registry: Arc::new(Registry::new(AtomicStorage)),
            last_seen: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl LoggingRecorder {
    /// Creates a new `LoggingRecorder` and starts a background task that logs a
    /// snapshot every `interval` until shutdown is signalled.
    pub fn new(interval: Duration, mut shutdown_rx: watch::Receiver<bool>) -> (Self, JoinHandle<()>) {
        let recorder = Self::default();

        let logger = recorder.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately and there is nothing to report yet.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => logger.log_snapshot(interval),
                    _ = shutdown_rx.changed() => {
                        info!("Metrics logging task received shutdown signal.");
                        break;
                    }
                }
            }
        });

        (recorder, handle)
    }

    /// Reads every counter, sorted by key, and records the values for the next delta.
    pub fn snapshot(&self) -> Vec<CounterSnapshot> {
        let mut last_seen = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());

        let mut snapshot: Vec<CounterSnapshot> = self
            .registry
            .get_counter_handles()
            .into_iter()
            .map(|(key, counter)| {
                let key = render_key(&key);
                let total = counter.load(Ordering::Relaxed);
                let previous = last_seen.insert(key.clone(), total).unwrap_or(0);
                CounterSnapshot {
                    key,
                    total,
                    delta: total.saturating_sub(previous),
                }
            })
            .collect();

        snapshot.sort_by(|a, b| a.key.cmp(&b.key));
        snapshot
    }

    fn log_snapshot(&self, interval: Duration) {
        for counter in self.snapshot() {
            info!(
                counter = %counter.key,
                total = counter.total,
                "+{} in the last {}s",
                counter.delta,
                interval.as_secs()
            );
        }
    }
}

/// Renders a key as `name` or `name{label=value,...}`.
fn render_key(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|label| format!("{}={}", label.key(), label.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for LoggingRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        self.registry.get_or_create_counter(key, |c| c.clone()).into()
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        self.registry.get_or_create_gauge(key, |g| g.clone()).into()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        self.registry.get_or_create_histogram(key, |h| h.clone()).into()
    }
}
