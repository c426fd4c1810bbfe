use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the monitoring pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Capture and classification loops were spawned
    PipelineStarted { timestamp: SystemTime },
    /// Camera was opened or lost
    CameraStatusChanged {
        available: bool,
        timestamp: SystemTime,
    },
    /// A classification tick finished
    ClassificationCompleted {
        label: String,
        confidence: f64,
        is_wet: bool,
        timestamp: SystemTime,
    },
    /// Wet/organic waste classified above the alert threshold
    WetWasteDetected {
        confidence: f64,
        timestamp: SystemTime,
    },
    /// A viewer asked for the camera to be reopened
    CameraRestartRequested { timestamp: SystemTime },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
}

impl PipelineEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            PipelineEvent::PipelineStarted { timestamp } => *timestamp,
            PipelineEvent::CameraStatusChanged { timestamp, .. } => *timestamp,
            PipelineEvent::ClassificationCompleted { timestamp, .. } => *timestamp,
            PipelineEvent::WetWasteDetected { timestamp, .. } => *timestamp,
            PipelineEvent::CameraRestartRequested { timestamp } => *timestamp,
            PipelineEvent::SystemError { .. } => SystemTime::now(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PipelineEvent::PipelineStarted { .. } => "Pipeline started".to_string(),
            PipelineEvent::CameraStatusChanged { available, .. } => format!(
                "Camera {}",
                if *available { "available" } else { "unavailable" }
            ),
            PipelineEvent::ClassificationCompleted {
                label, confidence, ..
            } => {
                format!("Classified as {} ({:.2}%)", label, confidence * 100.0)
            }
            PipelineEvent::WetWasteDetected { confidence, .. } => {
                format!("Organic waste detected ({:.2}%)", confidence * 100.0)
            }
            PipelineEvent::CameraRestartRequested { .. } => "Camera restart requested".to_string(),
            PipelineEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::PipelineStarted { .. } => "pipeline_started",
            PipelineEvent::CameraStatusChanged { .. } => "camera_status_changed",
            PipelineEvent::ClassificationCompleted { .. } => "classification_completed",
            PipelineEvent::WetWasteDetected { .. } => "wet_waste_detected",
            PipelineEvent::CameraRestartRequested { .. } => "camera_restart_requested",
            PipelineEvent::SystemError { .. } => "system_error",
        }
    }
}

/// Broadcast bus connecting pipeline components to observers
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Fails only when nobody is subscribed; callers treat that as a no-op.
    pub fn publish(&self, event: PipelineEvent) -> Result<usize, EventBusError> {
        match &event {
            PipelineEvent::WetWasteDetected { confidence, .. } => {
                info!("Publishing wet waste alert ({:.2}%)", confidence * 100.0);
            }
            PipelineEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            PipelineEvent::CameraStatusChanged { available, .. } => {
                if *available {
                    info!("Camera available");
                } else {
                    warn!("Camera unavailable");
                }
            }
            _ => debug!("Event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let delivered = bus
            .publish(PipelineEvent::WetWasteDetected {
                confidence: 0.85,
                timestamp: SystemTime::now(),
            })
            .unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(first.recv().await.unwrap().event_type(), "wet_waste_detected");
        assert_eq!(second.recv().await.unwrap().event_type(), "wet_waste_detected");
    }

    #[test]
    fn test_publish_without_subscribers_fails_softly() {
        let bus = EventBus::new(8);

        let result = bus.publish(PipelineEvent::CameraRestartRequested {
            timestamp: SystemTime::now(),
        });

        assert!(matches!(result, Err(EventBusError::PublishFailed { .. })));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_descriptions() {
        let event = PipelineEvent::ClassificationCompleted {
            label: "organic/wet".to_string(),
            confidence: 0.85,
            is_wet: true,
            timestamp: SystemTime::now(),
        };
        assert_eq!(event.description(), "Classified as organic/wet (85.00%)");

        let event = PipelineEvent::CameraStatusChanged {
            available: false,
            timestamp: SystemTime::now(),
        };
        assert_eq!(event.description(), "Camera unavailable");

        let event = PipelineEvent::PipelineStarted {
            timestamp: SystemTime::now(),
        };
        assert_eq!(event.event_type(), "pipeline_started");
    }
}
