use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Status reported before the bin controller first checks in
pub const INITIAL_STATUS: &str = "Initializing...";
/// Status assumed when an update omits it
pub const DEFAULT_STATUS: &str = "Running";

/// Latest telemetry pushed by the bin controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub gas: i64,
    pub moisture: i64,
    pub distance: f64,
    pub wet: i64,
    pub full: i64,
    pub fill: i64,
    pub status: String,
    #[serde(skip)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SensorSnapshot {
    pub fn initial() -> Self {
        Self {
            gas: 0,
            moisture: 0,
            distance: 0.0,
            wet: 0,
            full: 0,
            fill: 0,
            status: INITIAL_STATUS.to_string(),
            updated_at: None,
        }
    }

    /// Build a snapshot from query parameters.
    ///
    /// Missing or unparsable numbers read as zero; a missing status reads as
    /// "Running".
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let int = |key: &str| -> i64 {
            params
                .get(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0)
        };
        let distance = params
            .get("distance")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite())
            .unwrap_or(0.0);

        Self {
            gas: int("gas"),
            moisture: int("moisture"),
            distance,
            wet: int("wet"),
            full: int("full"),
            fill: int("fill"),
            status: params
                .get("status")
                .cloned()
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            updated_at: Some(Utc::now()),
        }
    }

    /// Whether the controller has reported at least once
    pub fn has_reading(&self) -> bool {
        self.updated_at.is_some()
    }

    /// One-line summary drawn on the stream
    pub fn summary(&self) -> String {
        format!("Fill: {}% | {}", self.fill, self.status)
    }
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

/// Telemetry store shared between the HTTP handlers and stream sessions
pub struct SensorStore {
    snapshot: Mutex<SensorSnapshot>,
    buzzer_muted: AtomicBool,
}

impl SensorStore {
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(SensorSnapshot::initial()),
            buzzer_muted: AtomicBool::new(false),
        }
    }

    /// Replace the snapshot wholesale
    pub fn update(&self, snapshot: SensorSnapshot) {
        debug!(
            "Sensor update: gas={} moisture={} distance={} wet={} full={} fill={} status={}",
            snapshot.gas,
            snapshot.moisture,
            snapshot.distance,
            snapshot.wet,
            snapshot.full,
            snapshot.fill,
            snapshot.status
        );
        *self.snapshot.lock() = snapshot;
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        self.snapshot.lock().clone()
    }

    pub fn buzzer_muted(&self) -> bool {
        self.buzzer_muted.load(Ordering::Relaxed)
    }

    /// Apply a buzzer form value: `stop` mutes, `start` unmutes, anything
    /// else is ignored. Returns the resulting muted flag.
    pub fn apply_buzzer(&self, state: Option<&str>) -> bool {
        match state {
            Some("stop") => {
                info!("Buzzer muted");
                self.buzzer_muted.store(true, Ordering::Relaxed);
            }
            Some("start") => {
                info!("Buzzer unmuted");
                self.buzzer_muted.store(false, Ordering::Relaxed);
            }
            other => debug!("Ignoring buzzer state {:?}", other),
        }
        self.buzzer_muted()
    }
}

impl Default for SensorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_initial_snapshot() {
        let store = SensorStore::new();
        let snapshot = store.snapshot();

        assert_eq!(snapshot.status, "Initializing...");
        assert_eq!(snapshot.fill, 0);
        assert!(!snapshot.has_reading());
        assert!(!store.buzzer_muted());
    }

    #[test]
    fn test_full_update() {
        let snapshot = SensorSnapshot::from_params(&params(&[
            ("gas", "312"),
            ("moisture", "41"),
            ("distance", "12.5"),
            ("wet", "1"),
            ("full", "0"),
            ("fill", "63"),
            ("status", "Lid open"),
        ]));

        assert_eq!(snapshot.gas, 312);
        assert_eq!(snapshot.moisture, 41);
        assert_eq!(snapshot.distance, 12.5);
        assert_eq!(snapshot.wet, 1);
        assert_eq!(snapshot.fill, 63);
        assert_eq!(snapshot.status, "Lid open");
        assert!(snapshot.has_reading());
        assert_eq!(snapshot.summary(), "Fill: 63% | Lid open");
    }

    #[test]
    fn test_lenient_update() {
        let snapshot =
            SensorSnapshot::from_params(&params(&[("gas", "abc"), ("distance", "NaN"), ("fill", " 7 ")]));

        assert_eq!(snapshot.gas, 0);
        assert_eq!(snapshot.moisture, 0);
        assert_eq!(snapshot.distance, 0.0);
        assert_eq!(snapshot.fill, 7);
        assert_eq!(snapshot.status, "Running");
    }

    #[test]
    fn test_update_replaces_wholesale() {
        let store = SensorStore::new();
        store.update(SensorSnapshot::from_params(&params(&[("gas", "5"), ("fill", "90")])));
        store.update(SensorSnapshot::from_params(&params(&[("fill", "10")])));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.gas, 0);
        assert_eq!(snapshot.fill, 10);
    }

    #[test]
    fn test_buzzer_states() {
        let store = SensorStore::new();

        assert!(store.apply_buzzer(Some("stop")));
        assert!(store.apply_buzzer(Some("bogus")));
        assert!(store.apply_buzzer(None));
        assert!(!store.apply_buzzer(Some("start")));
    }
}
