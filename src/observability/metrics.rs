//! Telemetry pipeline.
//!
//! # Responsibilities
//! - Accept counter, timer and store events plus log events without blocking
//! - Aggregate events per flush interval
//! - Ship batches to the reporting endpoints
//!
//! # Metrics
//! - `request.total.cost` (timer): call latency in ms
//! - `request.count` (counter): calls made
//! - `heartbeat.count` (counter): keepalive pings
//! - `common.err` (counter): failures, tagged with `type:<reason>`
//!
//! # Design Decisions
//! - Two bounded queues; a full queue drops the event and counts the drop
//! - Counters are summed, timers become max/min/avg/pct stats, stores keep
//!   the last value
//! - Sends retry on timeout only
//! - The flush task resolves its target through a `HostSelector`, so it can
//!   be started after the host manager exists

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::availability::HostSelector;
use crate::config::MetricsConfig;
use crate::lifecycle::ShutdownSignal;

pub const REQUEST_TOTAL_COST: &str = "request.total.cost";
pub const REQUEST_COUNT: &str = "request.count";
pub const HEARTBEAT_COUNT: &str = "heartbeat.count";
pub const COMMON_ERROR: &str = "common.err";

const TIMER_STATS: [(&str, Option<f64>); 7] = [
    ("max", None),
    ("min", None),
    ("avg", None),
    ("pct75", Some(0.75)),
    ("pct90", Some(0.90)),
    ("pct95", Some(0.95)),
    ("pct99", Some(0.99)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Timer,
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One emitted metric sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    pub kind: MetricKind,
    pub name: String,
    pub value: f64,
    /// `key:value` pairs.
    pub tags: Vec<String>,
}

/// One emitted log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub id: String,
    pub message: String,
    pub level: LogLevel,
    pub timestamp: u64,
}

/// Aggregated metric as reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub name: String,
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub timestamp: u64,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct MetricBatch<'a> {
    metrics: &'a [MetricRecord],
}

#[derive(Debug, Serialize)]
struct LogBatch<'a> {
    logs: &'a [LogEvent],
}

/// Escape characters the reporting endpoint treats as separators.
pub fn escape_tag_value(value: &str) -> String {
    value
        .replace('?', "-qu-")
        .replace('&', "-and-")
        .replace('=', "-eq-")
}

/// Render a `key:value` tag with an escaped value.
pub fn tag(key: &str, value: &str) -> String {
    format!("{}:{}", key, escape_tag_value(value))
}

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

struct SinkInner {
    metrics_tx: mpsc::Sender<MetricEvent>,
    logs_tx: Option<mpsc::Sender<LogEvent>>,
    dropped: AtomicU64,
}

/// Emitting side of the pipeline. Cheap to clone; a disabled sink discards
/// everything.
#[derive(Clone, Default)]
pub struct MetricsSink {
    inner: Option<Arc<SinkInner>>,
}

/// Draining side of the pipeline, consumed by `MetricsFlusher`.
pub struct MetricsReceiver {
    metrics_rx: mpsc::Receiver<MetricEvent>,
    logs_rx: Option<mpsc::Receiver<LogEvent>>,
}

/// Create the two bounded queues.
pub fn pipeline(config: &MetricsConfig) -> (MetricsSink, MetricsReceiver) {
    let capacity = config.queue_capacity.max(1);
    let (metrics_tx, metrics_rx) = mpsc::channel(capacity);
    let (logs_tx, logs_rx) = if config.report_logs {
        let (tx, rx) = mpsc::channel(capacity);
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };

    let sink = MetricsSink {
        inner: Some(Arc::new(SinkInner {
            metrics_tx,
            logs_tx,
            dropped: AtomicU64::new(0),
        })),
    };
    (sink, MetricsReceiver { metrics_rx, logs_rx })
}

impl MetricsSink {
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn counter(&self, name: &str, value: f64, tags: Vec<String>) {
        self.emit(MetricKind::Counter, name, value, tags);
    }

    pub fn timer(&self, name: &str, value_ms: f64, tags: Vec<String>) {
        self.emit(MetricKind::Timer, name, value_ms, tags);
    }

    pub fn store(&self, name: &str, value: f64, tags: Vec<String>) {
        self.emit(MetricKind::Store, name, value, tags);
    }

    pub fn info(&self, id: &str, message: impl Into<String>) {
        self.log(LogLevel::Info, id, message.into());
    }

    pub fn warn(&self, id: &str, message: impl Into<String>) {
        self.log(LogLevel::Warn, id, message.into());
    }

    pub fn error(&self, id: &str, message: impl Into<String>) {
        self.log(LogLevel::Error, id, message.into());
    }

    /// Events dropped because a queue was full.
    pub fn dropped(&self) -> u64 {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.dropped.load(Ordering::Relaxed))
    }

    fn emit(&self, kind: MetricKind, name: &str, value: f64, tags: Vec<String>) {
        let Some(inner) = &self.inner else { return };
        let event = MetricEvent {
            kind,
            name: name.to_string(),
            value,
            tags,
        };
        if let Err(TrySendError::Full(_)) = inner.metrics_tx.try_send(event) {
            inner.record_drop("metrics");
        }
    }

    fn log(&self, level: LogLevel, id: &str, message: String) {
        let Some(inner) = &self.inner else { return };
        let Some(logs_tx) = &inner.logs_tx else { return };
        let event = LogEvent {
            id: id.to_string(),
            message,
            level,
            timestamp: unix_now(),
        };
        if let Err(TrySendError::Full(_)) = logs_tx.try_send(event) {
            inner.record_drop("logs");
        }
    }
}

impl SinkInner {
    fn record_drop(&self, queue: &'static str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("rec_telemetry_dropped_total", "queue" => queue).increment(1);
    }
}

impl std::fmt::Debug for MetricsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsSink")
            .field("enabled", &self.is_enabled())
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// Per-flush aggregation state.
#[derive(Debug, Default)]
pub struct Aggregator {
    counters: HashMap<(String, Vec<String>), f64>,
    timers: HashMap<(String, Vec<String>), Vec<f64>>,
    stores: HashMap<(String, Vec<String>), f64>,
}

impl Aggregator {
    pub fn add(&mut self, event: MetricEvent) {
        let mut tags = event.tags;
        tags.sort();
        let key = (event.name, tags);
        match event.kind {
            MetricKind::Counter => *self.counters.entry(key).or_insert(0.0) += event.value,
            MetricKind::Timer => self.timers.entry(key).or_default().push(event.value),
            MetricKind::Store => {
                self.stores.insert(key, event.value);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.timers.is_empty() && self.stores.is_empty()
    }

    /// Drain into (counter records, general records), names prefixed.
    pub fn drain(
        &mut self,
        prefix: &str,
        timestamp: u64,
    ) -> (Vec<MetricRecord>, Vec<MetricRecord>) {
        let record = |kind, name: String, value, tags: &[String]| MetricRecord {
            name,
            value,
            kind,
            timestamp,
            tags: parse_tags(tags),
        };

        let counters = self
            .counters
            .drain()
            .map(|((name, tags), value)| {
                record(MetricKind::Counter, format!("{prefix}.{name}"), value, &tags)
            })
            .collect();

        let mut general = Vec::new();
        for ((name, tags), mut values) in self.timers.drain() {
            values.sort_by(f64::total_cmp);
            for (stat, value) in timer_stats(&values) {
                general.push(record(
                    MetricKind::Timer,
                    format!("{prefix}.{name}.{stat}"),
                    value,
                    &tags,
                ));
            }
        }
        for ((name, tags), value) in self.stores.drain() {
            general.push(record(MetricKind::Store, format!("{prefix}.{name}"), value, &tags));
        }
        (counters, general)
    }
}

fn parse_tags(tags: &[String]) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|t| t.split_once(':'))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Stats of a sorted, non-empty sample.
fn timer_stats(sorted: &[f64]) -> Vec<(&'static str, f64)> {
    if sorted.is_empty() {
        return Vec::new();
    }
    let n = sorted.len();
    TIMER_STATS
        .iter()
        .map(|(stat, pct)| {
            let value = match (*stat, pct) {
                ("max", _) => sorted[n - 1],
                ("min", _) => sorted[0],
                ("avg", _) => sorted.iter().sum::<f64>() / n as f64,
                (_, Some(p)) => percentile(sorted, *p),
                _ => 0.0,
            };
            (*stat, value)
        })
        .collect()
}

/// Interpolated percentile at position `p * (n + 1)`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let pos = p * (n as f64 + 1.0);
    if pos < 1.0 {
        sorted[0]
    } else if pos >= n as f64 {
        sorted[n - 1]
    } else {
        let lower = sorted[pos as usize - 1];
        let upper = sorted[pos as usize];
        lower + (pos - pos.floor()) * (upper - lower)
    }
}

/// Periodically drains the queues and ships aggregated batches.
pub struct MetricsFlusher {
    config: MetricsConfig,
    schema: String,
    client: reqwest::Client,
    selector: Arc<dyn HostSelector>,
    receiver: MetricsReceiver,
    aggregator: Aggregator,
}

impl MetricsFlusher {
    /// Create a new flusher.
    pub fn new(
        config: MetricsConfig,
        schema: impl Into<String>,
        client: reqwest::Client,
        selector: Arc<dyn HostSelector>,
        receiver: MetricsReceiver,
    ) -> Self {
        Self {
            config,
            schema: schema.into(),
            client,
            selector,
            receiver,
            aggregator: Aggregator::default(),
        }
    }

    /// Run the flush loop until shutdown; a final flush runs on the way out.
    pub fn spawn(mut self, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.config.flush_interval();
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_secs = period.as_secs(), "Metrics flusher starting");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.flush().await;
                    }
                    _ = shutdown.recv() => {
                        self.flush().await;
                        tracing::info!("Metrics flusher received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    /// Drain both queues and send what they held.
    pub async fn flush(&mut self) {
        while let Ok(event) = self.receiver.metrics_rx.try_recv() {
            self.aggregator.add(event);
        }
        if !self.aggregator.is_empty() {
            let (counters, general) = self.aggregator.drain(&self.config.prefix, unix_now());
            let counter_path = self.config.counter_path.clone();
            let general_path = self.config.general_path.clone();
            self.send_metrics(&counter_path, &counters).await;
            self.send_metrics(&general_path, &general).await;
        }

        let batch_size = self.config.batch_size.max(1);
        let log_path = self.config.log_path.clone();
        loop {
            let mut logs = Vec::new();
            if let Some(logs_rx) = self.receiver.logs_rx.as_mut() {
                while logs.len() < batch_size {
                    match logs_rx.try_recv() {
                        Ok(event) => logs.push(event),
                        Err(_) => break,
                    }
                }
            }
            if logs.is_empty() {
                break;
            }
            self.send(&log_path, &LogBatch { logs: &logs }).await;
        }
    }

    async fn send_metrics(&self, path: &str, records: &[MetricRecord]) {
        for chunk in records.chunks(self.config.batch_size.max(1)) {
            self.send(path, &MetricBatch { metrics: chunk }).await;
        }
    }

    /// POST one batch. Returns true once the endpoint accepted it.
    async fn send<T: Serialize>(&self, path: &str, batch: &T) -> bool {
        let host = self.selector.get_host(path);
        let url = format!("{}://{}{}", self.schema, host, path);
        let timeout = self.config.http_timeout();
        let attempts = self.config.max_try_times.max(1);

        for attempt in 1..=attempts {
            match self.post(&url, batch, timeout).await {
                Ok(()) => {
                    tracing::debug!(url = %url, "Metrics batch sent");
                    return true;
                }
                Err(e) if e.is_timeout() && attempt < attempts => {
                    tracing::debug!(url = %url, attempt, "Metrics send timed out, retrying");
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Metrics send failed");
                    return false;
                }
            }
        }
        false
    }

    async fn post<T: Serialize>(
        &self,
        url: &str,
        batch: &T,
        timeout: Duration,
    ) -> Result<(), reqwest::Error> {
        self.client
            .post(url)
            .timeout(timeout)
            .json(batch)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: usize, report_logs: bool) -> MetricsConfig {
        MetricsConfig {
            enabled: true,
            report_logs,
            queue_capacity: capacity,
            ..MetricsConfig::default()
        }
    }

    fn drain_all(receiver: &mut MetricsReceiver) -> Vec<MetricEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.metrics_rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_escape_tag_value() {
        assert_eq!(
            escape_tag_value("http://h/p?a=1&b=2"),
            "http://h/p-qu-a-eq-1-and-b-eq-2"
        );
        assert_eq!(tag("url", "x?y"), "url:x-qu-y");
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (sink, mut receiver) = pipeline(&config(2, false));
        sink.counter(REQUEST_COUNT, 1.0, vec![]);
        sink.counter(REQUEST_COUNT, 1.0, vec![]);
        sink.counter(REQUEST_COUNT, 1.0, vec![]);
        assert_eq!(sink.dropped(), 1);
        assert_eq!(drain_all(&mut receiver).len(), 2);
    }

    #[test]
    fn test_logs_ignored_unless_reported() {
        let (sink, receiver) = pipeline(&config(2, false));
        sink.info("req-1", "hello");
        assert!(receiver.logs_rx.is_none());
        assert_eq!(sink.dropped(), 0);

        let (sink, mut receiver) = pipeline(&config(2, true));
        sink.error("req-1", "boom");
        let event = receiver.logs_rx.as_mut().unwrap().try_recv().unwrap();
        assert_eq!(event.level, LogLevel::Error);
        assert_eq!(event.message, "boom");
    }

    #[test]
    fn test_disabled_sink_discards() {
        let sink = MetricsSink::disabled();
        sink.counter(REQUEST_COUNT, 1.0, vec![]);
        assert!(!sink.is_enabled());
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn test_counters_are_summed_per_tag_set() {
        let mut agg = Aggregator::default();
        agg.add(MetricEvent {
            kind: MetricKind::Counter,
            name: REQUEST_COUNT.into(),
            value: 1.0,
            tags: vec!["b:2".into(), "a:1".into()],
        });
        agg.add(MetricEvent {
            kind: MetricKind::Counter,
            name: REQUEST_COUNT.into(),
            value: 2.0,
            tags: vec!["a:1".into(), "b:2".into()],
        });
        agg.add(MetricEvent {
            kind: MetricKind::Counter,
            name: REQUEST_COUNT.into(),
            value: 5.0,
            tags: vec!["a:other".into()],
        });

        let (mut counters, general) = agg.drain("rec.sdk", 1);
        counters.sort_by(|a, b| a.value.total_cmp(&b.value));
        assert!(general.is_empty());
        assert_eq!(counters.len(), 2);
        assert_eq!(counters[0].name, "rec.sdk.request.count");
        assert_eq!(counters[0].value, 3.0);
        assert_eq!(counters[0].tags.get("b").map(String::as_str), Some("2"));
        assert!(agg.is_empty());
    }

    #[test]
    fn test_timer_stats_and_store_last_value() {
        let mut agg = Aggregator::default();
        for v in [10.0, 20.0, 30.0, 40.0] {
            agg.add(MetricEvent {
                kind: MetricKind::Timer,
                name: REQUEST_TOTAL_COST.into(),
                value: v,
                tags: vec![],
            });
        }
        for v in [1.0, 7.0] {
            agg.add(MetricEvent {
                kind: MetricKind::Store,
                name: "queue.size".into(),
                value: v,
                tags: vec![],
            });
        }

        let (_, general) = agg.drain("p", 1);
        let value = |name: &str| {
            general
                .iter()
                .find(|r| r.name == name)
                .map(|r| r.value)
                .unwrap()
        };
        assert_eq!(general.len(), 8);
        assert_eq!(value("p.request.total.cost.max"), 40.0);
        assert_eq!(value("p.request.total.cost.min"), 10.0);
        assert_eq!(value("p.request.total.cost.avg"), 25.0);
        assert_eq!(value("p.request.total.cost.pct99"), 40.0);
        assert_eq!(value("p.queue.size"), 7.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        // pos = 0.5 * 5 = 2.5 → between 20 and 30
        assert_eq!(percentile(&sorted, 0.5), 25.0);
        assert_eq!(percentile(&sorted, 0.1), 10.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_record_serializes_type_field() {
        let record = MetricRecord {
            name: "n".into(),
            value: 1.0,
            kind: MetricKind::Counter,
            timestamp: 7,
            tags: BTreeMap::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "counter");
        assert_eq!(json["timestamp"], 7);
    }
}
