use serde::Serialize;
use tokio::time::Instant;

/// one validated radar sentence
///
/// only ever built by frame.rs from a well formed sentence, so every
/// field is meaningful. `distance_meters` is `None` when the sensor left
/// the distance field empty or sent something that is not a number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorReading {
    pub motion_detected: bool,
    pub distance_meters: Option<f64>,
    pub observed_at: Instant,
}

/// everything the two loops share
///
/// `latest_reading` is `None` until the first valid sentence arrives; the
/// web page shows the "initializing" tokens for that state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TelemetryState {
    pub latest_reading: Option<SensorReading>,
    pub last_alert_at: Option<Instant>,
}

/// human readable motion token shown on the page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionStatus {
    Initializing,
    Detected,
    Clear,
}

impl MotionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MotionStatus::Initializing => "Initializing...",
            MotionStatus::Detected => "MOTION DETECTED!!",
            MotionStatus::Clear => "No Motion Detected",
        }
    }
}

impl From<Option<&SensorReading>> for MotionStatus {
    fn from(reading: Option<&SensorReading>) -> Self {
        match reading {
            None => MotionStatus::Initializing,
            Some(r) if r.motion_detected => MotionStatus::Detected,
            Some(_) => MotionStatus::Clear,
        }
    }
}

pub const UNKNOWN_DISTANCE: &str = "Unknown";

/// body of the data endpoint: exactly two string keys
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataPayload {
    pub motion_status: &'static str,
    pub distance: String,
}

impl From<&TelemetryState> for DataPayload {
    fn from(state: &TelemetryState) -> Self {
        let reading = state.latest_reading.as_ref();
        let distance = reading
            .and_then(|r| r.distance_meters)
            .map(format_distance)
            .unwrap_or_else(|| UNKNOWN_DISTANCE.to_string());

        Self {
            motion_status: MotionStatus::from(reading).as_str(),
            distance,
        }
    }
}

/// decimal text for a distance; whole numbers keep one decimal ("2.0")
pub fn format_distance(meters: f64) -> String {
    if meters.fract() == 0.0 && meters.abs() < 1e15 {
        format!("{meters:.1}")
    } else {
        format!("{meters}")
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

    #[test]
    fn fresh_state_reports_initializing_and_unknown() {
        let payload = DataPayload::from(&TelemetryState::default());
        assert_eq!(payload.motion_status, "Initializing...");
        assert_eq!(payload.distance, "Unknown");
    }

    #[test]
    fn motion_with_distance() {
        let state = TelemetryState {
            latest_reading: Some(reading(true, Some(2.5))),
            last_alert_at: None,
        };
        let payload = DataPayload::from(&state);
        assert_eq!(payload.motion_status, "MOTION DETECTED!!");
        assert_eq!(payload.distance, "2.5");
    }

    #[test]
    fn no_motion_without_distance() {
        let state = TelemetryState {
            latest_reading: Some(reading(false, None)),
            last_alert_at: None,
        };
        let payload = DataPayload::from(&state);
        assert_eq!(payload.motion_status, "No Motion Detected");
        assert_eq!(payload.distance, "Unknown");
    }

    #[test]
    fn whole_distances_keep_one_decimal() {
        assert_eq!(format_distance(2.0), "2.0");
        assert_eq!(format_distance(0.0), "0.0");
        assert_eq!(format_distance(1.234), "1.234");
    }

    #[test]
    fn payload_serializes_with_both_keys_as_strings() {
        let state = TelemetryState {
            latest_reading: Some(reading(true, Some(2.5))),
            last_alert_at: None,
        };
        let json = serde_json::to_value(DataPayload::from(&state)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"motion_status": "MOTION DETECTED!!", "distance": "2.5"})
        );
    }
}
