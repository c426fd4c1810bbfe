use super::{ClassificationResult, ClassificationState, ClassifierAdapter, MockClassifier};
use crate::config::ClassifierConfig;
use crate::events::{EventBus, PipelineEvent};
use crate::frame_slot::{ReadinessSignal, SharedFrameSlot};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Consumer task sampling the latest frame on a fixed cadence
pub struct ClassificationLoop {
    adapter: ClassifierAdapter,
    slot: Arc<SharedFrameSlot>,
    readiness: Arc<ReadinessSignal>,
    state: Arc<ClassificationState>,
    event_bus: Arc<EventBus>,
    readiness_timeout: Duration,
    poll_interval: Duration,
}

impl ClassificationLoop {
    pub fn new(
        config: &ClassifierConfig,
        adapter: ClassifierAdapter,
        slot: Arc<SharedFrameSlot>,
        readiness: Arc<ReadinessSignal>,
        state: Arc<ClassificationState>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            adapter,
            slot,
            readiness,
            state,
            event_bus,
            readiness_timeout: config.readiness_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    /// Run until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        self.state.set_running(true);
        info!(
            "Classification loop started ({} backend, every {:?})",
            self.adapter.backend_name(),
            self.state.interval()
        );

        info!("Waiting for camera to start...");
        tokio::select! {
            _ = cancel.cancelled() => {
                self.state.set_running(false);
                return;
            }
            ready = self.readiness.wait(self.readiness_timeout) => {
                if !ready {
                    warn!(
                        "Camera not ready after {:?}, continuing with mock data",
                        self.readiness_timeout
                    );
                }
            }
        }

        loop {
            if self.state.is_due() {
                self.tick().await;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        self.state.set_running(false);
        info!("Classification loop stopped");
    }

    /// Classify the current frame once and publish the result
    pub async fn tick(&self) -> ClassificationResult {
        let started = Instant::now();
        let frame = self.slot.snapshot();
        let frame_id = frame.as_ref().map(|f| f.id);

        let adapter = self.adapter.clone();
        let prediction = match tokio::task::spawn_blocking(move || {
            adapter.classify(frame.as_ref().map(|f| f.image.as_ref()))
        })
        .await
        {
            Ok(prediction) => prediction,
            Err(e) => {
                error!("ML processing error: {}", e);
                let _ = self.event_bus.publish(PipelineEvent::SystemError {
                    component: "classification_loop".to_string(),
                    error: e.to_string(),
                });
                MockClassifier::predict()
            }
        };

        let result = ClassificationResult::from_prediction(prediction, Utc::now());
        self.state.publish(result.clone(), started);

        match frame_id.filter(|_| self.adapter.model_loaded()) {
            Some(id) => info!(
                "ML Prediction: {} ({:.2}%) on frame {}",
                result.label,
                result.confidence_percent(),
                id
            ),
            None => info!(
                "Mock Prediction: {} ({:.2}%)",
                result.label,
                result.confidence_percent()
            ),
        }

        let now = SystemTime::now();
        let _ = self.event_bus.publish(PipelineEvent::ClassificationCompleted {
            label: result.label.clone(),
            confidence: result.confidence,
            is_wet: result.is_wet,
            timestamp: now,
        });

        if result.triggers_alert() {
            let _ = self.event_bus.publish(PipelineEvent::WetWasteDetected {
                confidence: result.confidence,
                timestamp: now,
            });
        } else {
            debug!("No alert for {}", result.label);
        }

        result
    }
}
