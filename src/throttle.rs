use crate::domain::SensorReading;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(30);

/// decide whether a reading should fire an alert now
///
/// level-triggered: while motion stays detected an alert is due again every
/// time more than `min_interval` has passed since the last delivered one.
/// a motion start after a quiet period gets no special treatment.
pub fn should_alert(
    current: &SensorReading,
    last_alert_at: Option<Instant>,
    now: Instant,
    min_interval: Duration,
) -> bool {
    if !current.motion_detected {
        return false;
    }
    match last_alert_at {
        None => true,
        Some(last) => now.saturating_duration_since(last) > min_interval,
    }
}
