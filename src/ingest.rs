//! ==============================================================================
//! ingest.rs - serial ingestion loop
//! ==============================================================================
//!
//! purpose:
//!     polls the serial source, parses what arrives, publishes readings to
//!     the store and fires throttled alerts.
//!
//! states:
//!
//!     ┌──────┐  bytes pending   ┌──────────┐
//!     │ Idle │ ───────────────> │ Draining │ ── read chunk, parse,
//!     └──────┘ <─────────────── └──────────┘    write store, alert?
//!        │      nothing pending
//!        └── sleep poll_interval, check again
//!
//! relationships:
//!     - uses: serial.rs (SerialSource), frame.rs (parse), store.rs,
//!       throttle.rs (should_alert), alert.rs (AlertDispatcher)
//!     - spawned by: main.rs
//!
//! ==============================================================================

use crate::alert::{AlertDispatcher, DispatchOutcome};
use crate::domain::SensorReading;
use crate::frame;
use crate::serial::SerialSource;
use crate::store::TelemetryStore;
use crate::throttle;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestState {
    /// nothing was pending (or the source failed)
    Idle,
    /// a chunk was read and processed
    Draining,
}

struct AlertPolicy<D> {
    dispatcher: D,
    min_interval: Duration,
    message: String,
}

pub struct IngestionLoop<S, D> {
    source: S,
    store: TelemetryStore,
    alerts: Option<AlertPolicy<D>>,
    buf: Vec<u8>,
    poll_interval: Duration,
    show_sensor_data: bool,
}

impl<S: SerialSource, D: AlertDispatcher> IngestionLoop<S, D> {
    pub fn new(source: S, store: TelemetryStore, chunk_size: usize, poll_interval: Duration) -> Self {
        Self {
            source,
            store,
            alerts: None,
            buf: vec![0u8; chunk_size.max(1)],
            poll_interval,
            show_sensor_data: false,
        }
    }

    pub fn with_alerts(mut self, dispatcher: D, min_interval: Duration, message: impl Into<String>) -> Self {
        self.alerts = Some(AlertPolicy {
            dispatcher,
            min_interval,
            message: message.into(),
        });
        self
    }

    pub fn show_sensor_data(mut self, show: bool) -> Self {
        self.show_sensor_data = show;
        self
    }

    /// one scheduling step
    pub async fn tick(&mut self) -> IngestState {
        let pending = match self.source.bytes_available() {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("{}", e);
                return IngestState::Idle;
            }
        };
        if pending == 0 {
            return IngestState::Idle;
        }

        let n = match self.source.read_chunk(&mut self.buf) {
            Ok(0) => return IngestState::Idle,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("{}", e);
                return IngestState::Idle;
            }
        };

        let now = Instant::now();
        if let Some(reading) = frame::parse(&self.buf[..n], now) {
            self.store.write(reading).await;
            if self.show_sensor_data {
                log_reading(&reading);
            }
            if let Some(policy) = &self.alerts {
                maybe_alert(policy, &self.store, &reading, now).await;
            }
        }

        IngestState::Draining
    }

    /// run forever; only process shutdown stops it
    pub async fn run(mut self) {
        tracing::info!("ingestion loop started ({:?} idle interval)", self.poll_interval);
        loop {
            match self.tick().await {
                IngestState::Idle => tokio::time::sleep(self.poll_interval).await,
                IngestState::Draining => tokio::task::yield_now().await,
            }
        }
    }
}

async fn maybe_alert<D: AlertDispatcher>(
    policy: &AlertPolicy<D>,
    store: &TelemetryStore,
    reading: &SensorReading,
    now: Instant,
) {
    let last_alert_at = store.read_snapshot().await.last_alert_at;
    if !throttle::should_alert(reading, last_alert_at, now, policy.min_interval) {
        return;
    }

    match policy.dispatcher.send(&policy.message).await {
        DispatchOutcome::Delivered => {
            store.mark_alerted(now).await;
            tracing::info!("[ALERT] sent: {}", policy.message);
        }
        DispatchOutcome::Failed(e) => {
            tracing::warn!("[ALERT] {}", e);
        }
    }
}

fn log_reading(reading: &SensorReading) {
    let status = crate::domain::MotionStatus::from(Some(reading)).as_str();
    match reading.distance_meters {
        Some(d) => tracing::info!("Motion: {}, Distance: {:.3} meters", status, d),
        None => tracing::info!("Motion: {}, Distance: Unknown meters", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// hands out pre-recorded chunks, one per read
    struct ScriptedSource {
        chunks: VecDeque<Result<Vec<u8>, TransportError>>,
    }

    impl ScriptedSource {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| Ok(c.to_vec())).collect(),
            }
        }
    }

    impl SerialSource for ScriptedSource {
        fn bytes_available(&mut self) -> Result<usize, TransportError> {
            match self.chunks.front() {
                None => Ok(0),
                Some(Ok(c)) => Ok(c.len()),
                Some(Err(_)) => Ok(1),
            }
        }

        fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            match self.chunks.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(c)) => {
                    let n = c.len().min(buf.len());
                    buf[..n].copy_from_slice(&c[..n]);
                    Ok(n)
                }
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingDispatcher {
        sent: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingDispatcher {
        fn attempts(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl AlertDispatcher for RecordingDispatcher {
        async fn send(&self, message: &str) -> DispatchOutcome {
            self.sent.lock().unwrap().push(message.to_string());
            if self.fail {
                DispatchOutcome::Failed(TransportError::Dispatch("offline".to_string()))
            } else {
                DispatchOutcome::Delivered
            }
        }
    }

    const MOTION: &[u8] = b"$DFDMD,1,X,2.500,Y,Z\r\n";
    const QUIET: &[u8] = b"$DFDMD,0,X,,Y,Z\r\n";

    fn ingest(
        source: ScriptedSource,
        dispatcher: &RecordingDispatcher,
    ) -> (IngestionLoop<ScriptedSource, RecordingDispatcher>, TelemetryStore) {
        let store = TelemetryStore::new();
        let ingest = IngestionLoop::new(source, store.clone(), 128, Duration::from_millis(500)).with_alerts(
            dispatcher.clone(),
            Duration::from_secs(30),
            "Motion Detected!",
        );
        (ingest, store)
    }

    #[tokio::test]
    async fn valid_chunk_is_published() {
        let dispatcher = RecordingDispatcher::default();
        let (mut ingest, store) = ingest(ScriptedSource::new(&[MOTION]), &dispatcher);

        assert_eq!(ingest.tick().await, IngestState::Draining);
        let reading = store.read_snapshot().await.latest_reading.unwrap();
        assert!(reading.motion_detected);
        assert_eq!(reading.distance_meters, Some(2.5));
    }

    #[tokio::test]
    async fn empty_source_is_idle() {
        let dispatcher = RecordingDispatcher::default();
        let (mut ingest, store) = ingest(ScriptedSource::new(&[]), &dispatcher);

        assert_eq!(ingest.tick().await, IngestState::Idle);
        assert!(store.read_snapshot().await.latest_reading.is_none());
    }

    #[tokio::test]
    async fn malformed_chunk_leaves_store_unchanged() {
        let dispatcher = RecordingDispatcher::default();
        let (mut ingest, store) = ingest(ScriptedSource::new(&[QUIET, b"$DFDMD,1\r\n"]), &dispatcher);

        ingest.tick().await;
        let before = store.read_snapshot().await;
        assert_eq!(ingest.tick().await, IngestState::Draining);
        assert_eq!(store.read_snapshot().await, before);
        assert_eq!(dispatcher.attempts(), 0);
    }

    #[tokio::test]
    async fn serial_error_is_idle_and_loop_continues() {
        let dispatcher = RecordingDispatcher::default();
        let mut source = ScriptedSource::new(&[MOTION]);
        source
            .chunks
            .push_front(Err(TransportError::Serial("framing error".to_string())));
        let (mut ingest, store) = ingest(source, &dispatcher);

        assert_eq!(ingest.tick().await, IngestState::Idle);
        assert_eq!(ingest.tick().await, IngestState::Draining);
        assert!(store.read_snapshot().await.latest_reading.is_some());
    }

    #[tokio::test]
    async fn quiet_readings_never_alert() {
        let dispatcher = RecordingDispatcher::default();
        let (mut ingest, _store) = ingest(ScriptedSource::new(&[QUIET, QUIET]), &dispatcher);

        ingest.tick().await;
        ingest.tick().await;
        assert_eq!(dispatcher.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn alerts_are_throttled_by_interval() {
        let dispatcher = RecordingDispatcher::default();
        let (mut ingest, store) = ingest(ScriptedSource::new(&[MOTION, MOTION, MOTION]), &dispatcher);

        let t0 = Instant::now();
        ingest.tick().await;
        assert_eq!(dispatcher.attempts(), 1);
        assert_eq!(store.read_snapshot().await.last_alert_at, Some(t0));

        tokio::time::advance(Duration::from_secs(10)).await;
        ingest.tick().await;
        assert_eq!(dispatcher.attempts(), 1);

        tokio::time::advance(Duration::from_secs(21)).await;
        ingest.tick().await;
        assert_eq!(dispatcher.attempts(), 2);
        assert_eq!(
            store.read_snapshot().await.last_alert_at,
            Some(t0 + Duration::from_secs(31))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_dispatch_is_not_marked_and_retried() {
        let dispatcher = RecordingDispatcher {
            fail: true,
            ..Default::default()
        };
        let (mut ingest, store) = ingest(ScriptedSource::new(&[MOTION, MOTION]), &dispatcher);

        ingest.tick().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        ingest.tick().await;

        assert_eq!(dispatcher.attempts(), 2);
        assert!(store.read_snapshot().await.last_alert_at.is_none());
        assert!(store.read_snapshot().await.latest_reading.is_some());
    }

    #[tokio::test]
    async fn without_alert_policy_nothing_is_sent() {
        let store = TelemetryStore::new();
        let mut ingest: IngestionLoop<_, RecordingDispatcher> = IngestionLoop::new(
            ScriptedSource::new(&[MOTION]),
            store.clone(),
            128,
            Duration::from_millis(500),
        );

        assert_eq!(ingest.tick().await, IngestState::Draining);
        assert!(store.read_snapshot().await.last_alert_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn run_keeps_polling_after_idle() {
        let dispatcher = RecordingDispatcher::default();
        let (ingest, store) = ingest(ScriptedSource::new(&[QUIET]), &dispatcher);

        let handle = tokio::spawn(ingest.run());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.read_snapshot().await.latest_reading.is_some());
        handle.abort();
    }
}
