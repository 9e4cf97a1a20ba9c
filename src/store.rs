use crate::domain::{SensorReading, TelemetryState};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;

// ==============================================================================
// shared state
// ==============================================================================
// the only state shared between the ingestion loop (writes readings) and the
// request loop (reads snapshots).
//
// arc<rwlock<>> gives one writer OR many readers. every access copies in or
// out, so the lock is never held across network i/o.

#[derive(Clone, Default)]
pub struct TelemetryStore {
    inner: Arc<RwLock<TelemetryState>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// replace the latest reading
    pub async fn write(&self, reading: SensorReading) {
        self.inner.write().await.latest_reading = Some(reading);
    }

    /// consistent copy of every field as of one instant
    pub async fn read_snapshot(&self) -> TelemetryState {
        *self.inner.read().await
    }

    /// record a delivered alert
    pub async fn mark_alerted(&self, at: Instant) {
        self.inner.write().await.last_alert_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(motion: bool, distance: Option<f64>) -> SensorReading {
        SensorReading {
            motion_detected: motion,
            distance_meters: distance,
            observed_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn starts_empty() {
        let store = TelemetryStore::new();
        assert_eq!(store.read_snapshot().await, TelemetryState::default());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let store = TelemetryStore::new();
        let r = reading(true, Some(2.5));
        store.write(r).await;
        assert_eq!(store.read_snapshot().await.latest_reading, Some(r));
    }

    #[tokio::test]
    async fn write_keeps_last_alert() {
        let store = TelemetryStore::new();
        let at = Instant::now();
        store.mark_alerted(at).await;
        store.write(reading(false, None)).await;

        let snap = store.read_snapshot().await;
        assert_eq!(snap.last_alert_at, Some(at));
        assert!(!snap.latest_reading.unwrap().motion_detected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_see_torn_updates() {
        let store = TelemetryStore::new();

        // writer alternates between two readings whose fields must stay paired
        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..2000 {
                    let r = if i % 2 == 0 {
                        reading(true, Some(1.0))
                    } else {
                        reading(false, None)
                    };
                    store.write(r).await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..2000 {
                    if let Some(r) = store.read_snapshot().await.latest_reading {
                        assert_eq!(r.motion_detected, r.distance_meters.is_some());
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.unwrap();
        for r in readers {
            r.await.unwrap();
        }
    }
}
