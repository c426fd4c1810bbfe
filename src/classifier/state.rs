use super::{exceeds_alert_threshold, Prediction};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Label reported before the first classification tick
pub const NO_DETECTION_LABEL: &str = "No detection yet";

/// Latest classification, always taken from a single classifier invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f64,
    pub is_wet: bool,
    pub produced_at: Option<DateTime<Utc>>,
}

impl ClassificationResult {
    pub fn initial() -> Self {
        Self {
            label: NO_DETECTION_LABEL.to_string(),
            confidence: 0.0,
            is_wet: false,
            produced_at: None,
        }
    }

    pub fn from_prediction(prediction: Prediction, produced_at: DateTime<Utc>) -> Self {
        Self {
            label: prediction.label,
            confidence: prediction.confidence,
            is_wet: prediction.is_wet,
            produced_at: Some(produced_at),
        }
    }

    /// Confidence as a percentage rounded to two decimals
    pub fn confidence_percent(&self) -> f64 {
        (self.confidence * 10_000.0).round() / 100.0
    }

    pub fn triggers_alert(&self) -> bool {
        exceeds_alert_threshold(self.is_wet, self.confidence)
    }
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self::initial()
    }
}

/// Result plus countdown, read together under one lock
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationSnapshot {
    pub result: ClassificationResult,
    pub time_until_next: Duration,
}

struct Inner {
    result: ClassificationResult,
    last_run: Option<Instant>,
}

/// Shared classification state, written only by the classification loop
pub struct ClassificationState {
    inner: Mutex<Inner>,
    interval: Duration,
    running: AtomicBool,
}

impl ClassificationState {
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                result: ClassificationResult::initial(),
                last_run: None,
            }),
            interval,
            running: AtomicBool::new(false),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Replace the result and restart the interval clock from `started`
    pub fn publish(&self, result: ClassificationResult, started: Instant) {
        let mut inner = self.inner.lock();
        inner.result = result;
        inner.last_run = Some(started);
    }

    pub fn latest(&self) -> ClassificationResult {
        self.inner.lock().result.clone()
    }

    pub fn snapshot(&self) -> ClassificationSnapshot {
        let inner = self.inner.lock();
        ClassificationSnapshot {
            result: inner.result.clone(),
            time_until_next: self.remaining(inner.last_run),
        }
    }

    /// Time left before the next tick, zero when one is due
    pub fn time_until_next(&self) -> Duration {
        let last_run = self.inner.lock().last_run;
        self.remaining(last_run)
    }

    pub fn is_due(&self) -> bool {
        self.time_until_next().is_zero()
    }

    fn remaining(&self, last_run: Option<Instant>) -> Duration {
        last_run.map_or(Duration::ZERO, |at| {
            self.interval.saturating_sub(at.elapsed())
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }
}
