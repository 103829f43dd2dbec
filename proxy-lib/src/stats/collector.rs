//! Stats Collector (C4): the single task that owns the in-memory
//! aggregation buffer and periodically flushes it to the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::StatsConfig;
use crate::geoip::Resolver as GeoIpResolver;
use crate::store::Store;
use crate::stats::event::{AggregateBucket, AggregateKey, TrafficEvent};

/// Fixed capacity of the producer-to-collector channel (spec section 4.4:
/// "bounded queue of 10,000 events"). Distinct from `config.max_buffer`,
/// which is the in-memory aggregation buffer's flush-trigger size -- the
/// two are independent tunables and must not be conflated.
const EVENT_CHANNEL_CAPACITY: usize = 10_000;

/// Handle given to every tunnel task. `record` never blocks: a full
/// channel drops the event and logs a warning rather than applying
/// backpressure to the data plane (spec section 5).
#[derive(Clone)]
pub struct StatsHandle {
    tx: mpsc::Sender<TrafficEvent>,
}

impl StatsHandle {
    pub fn record(&self, event: TrafficEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("stats channel full, dropping traffic event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("stats collector shut down, dropping traffic event");
            }
        }
    }
}

type Buffer = Arc<Mutex<HashMap<AggregateKey, AggregateBucket>>>;

/// Owns the aggregation buffer and the background flush loop. Dropping the
/// `StatsHandle`s and calling [`Collector::stop`] drains the channel and
/// performs one final flush.
pub struct Collector {
    handle: StatsHandle,
    join: JoinHandle<()>,
    shutdown: mpsc::Sender<()>,
}

impl Collector {
    pub fn spawn(config: StatsConfig, store: Arc<Store>, geoip: Option<Arc<GeoIpResolver>>) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let buffer: Buffer = Arc::new(Mutex::new(HashMap::new()));

        let join = tokio::spawn(run_loop(config, store, geoip, rx, shutdown_rx, buffer));

        Self {
            handle: StatsHandle { tx },
            join,
            shutdown: shutdown_tx,
        }
    }

    pub fn handle(&self) -> StatsHandle {
        self.handle.clone()
    }

    /// Signals the collector to drain any in-flight events, flush once
    /// more, and stop. Waits for that to complete.
    pub async fn stop(self) {
        let _ = self.shutdown.send(()).await;
        let _ = self.join.await;
    }
}

async fn run_loop(
    config: StatsConfig,
    store: Arc<Store>,
    geoip: Option<Arc<GeoIpResolver>>,
    mut rx: mpsc::Receiver<TrafficEvent>,
    mut shutdown_rx: mpsc::Receiver<()>,
    buffer: Buffer,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.flush_interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        let len = accumulate(&buffer, event, geoip.as_deref()).await;
                        if len >= config.max_buffer {
                            flush(&buffer, &store).await;
                        }
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                flush(&buffer, &store).await;
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    rx.close();
    while let Ok(event) = rx.try_recv() {
        accumulate(&buffer, event, geoip.as_deref()).await;
    }
    flush(&buffer, &store).await;
}

async fn accumulate(buffer: &Buffer, mut event: TrafficEvent, geoip: Option<&GeoIpResolver>) -> usize {
    if event.country.is_none() {
        if let (Some(resolver), Some(ip)) = (geoip, event.destination_ip) {
            event.country = resolver.lookup(ip);
        }
    }

    let minute = event
        .timestamp
        .format("%Y-%m-%dT%H:%M:00")
        .to_string();
    let key = AggregateKey {
        user: event.user.clone(),
        domain: event.domain.clone(),
        country_code: event.country.as_ref().map(|c| c.code.clone()),
        minute,
    };

    let mut guard = buffer.lock().await;
    guard.entry(key).or_default().accumulate(&event);
    guard.len()
}

async fn flush(buffer: &Buffer, store: &Arc<Store>) {
    let mut guard = buffer.lock().await;
    if guard.is_empty() {
        return;
    }
    let batch = std::mem::take(&mut *guard);
    drop(guard);

    let entries: Vec<(AggregateKey, AggregateBucket)> = batch.into_iter().collect();
    if let Err(e) = store.write_aggregates(&entries).await {
        warn!(error = %e, batch_size = entries.len(), "failed to flush stats batch, re-buffering for retry");
        let mut guard = buffer.lock().await;
        for (key, bucket) in entries {
            guard.entry(key).or_default().merge(bucket);
        }
    }
}

impl AggregateBucket {
    fn merge(&mut self, other: AggregateBucket) {
        self.upload_bytes += other.upload_bytes;
        self.download_bytes += other.download_bytes;
        self.connection_count += other.connection_count;
        self.last_seen = match (self.last_seen, other.last_seen) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        if self.country.is_none() {
            self.country = other.country;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatsConfig;
    use chrono::Utc;

    fn sample_event(upload: u64, download: u64) -> TrafficEvent {
        TrafficEvent {
            user: "alice".to_string(),
            domain: "google.com".to_string(),
            destination_ip: None,
            upload_bytes: upload,
            download_bytes: download,
            timestamp: Utc::now(),
            country: None,
        }
    }

    #[tokio::test]
    async fn record_drops_silently_when_channel_is_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = StatsHandle { tx };

        handle.record(sample_event(1, 1));
        handle.record(sample_event(2, 2)); // channel full -- must drop, not block or panic.

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn record_drops_silently_when_collector_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = StatsHandle { tx };
        handle.record(sample_event(1, 1));
    }

    #[tokio::test]
    async fn scenario_collector_flushes_under_load_before_next_tick() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let cfg = StatsConfig { flush_interval_seconds: 1, max_buffer: 5_000, ..StatsConfig::default() };
        let collector = Collector::spawn(cfg, store.clone(), None);
        let handle = collector.handle();

        for _ in 0..5 {
            handle.record(sample_event(1000, 2000));
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        collector.stop().await;

        let overview = store.overview().await.unwrap();
        assert_eq!(overview.total_upload_bytes, 5000);
        assert_eq!(overview.total_download_bytes, 10000);
    }

    #[tokio::test]
    async fn stop_drains_in_flight_events_with_one_final_flush() {
        let store = Arc::new(Store::open_in_memory().await.unwrap());
        let cfg = StatsConfig { flush_interval_seconds: 3600, max_buffer: 5_000, ..StatsConfig::default() };
        let collector = Collector::spawn(cfg, store.clone(), None);
        let handle = collector.handle();

        handle.record(sample_event(50, 75));
        collector.stop().await;

        let alice = store.user("alice").await.unwrap().expect("user row created by final flush");
        assert_eq!(alice.upload_bytes, 50);
        assert_eq!(alice.download_bytes, 75);
    }
}
