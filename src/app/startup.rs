use super::{ComponentState, WastebinOrchestrator};
use crate::error::{Result, WastebinError};
use crate::events::{EventBus, PipelineEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

impl WastebinOrchestrator {
    /// Register all system components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing smart bin monitor components");

        let mut states = self.component_states.lock().await;
        states.insert("event_relay".to_string(), ComponentState::Stopped);
        states.insert("streaming".to_string(), ComponentState::Stopped);
        states.insert("pipeline".to_string(), ComponentState::Stopped);
        drop(states);

        info!(
            "Camera backend {:?}, classifier model {}",
            self.config.camera.backend,
            if self.ctx.ml_loaded() {
                "loaded"
            } else {
                "not loaded (mock predictions)"
            }
        );
        info!("All components initialized successfully");
        Ok(())
    }

    /// Start the event relay and HTTP server, and the pipeline if eager
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting smart bin monitor");

        self.set_component_state("event_relay", ComponentState::Starting)
            .await;
        self.relay_task = Some(spawn_event_relay(
            Arc::clone(&self.ctx.event_bus),
            Arc::clone(&self.component_states),
            self.cancellation_token.child_token(),
        ));
        self.set_component_state("event_relay", ComponentState::Running)
            .await;

        let server = self
            .stream_server
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| WastebinError::system("Stream server not configured"))?;

        self.set_component_state("streaming", ComponentState::Starting)
            .await;
        let listener = match server.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                self.set_component_state("streaming", ComponentState::Failed)
                    .await;
                error!("Failed to start HTTP server: {}", e);
                return Err(e);
            }
        };
        self.local_addr = listener.local_addr().ok();

        let shutdown = self.cancellation_token.clone();
        self.server_task = Some(tokio::spawn(async move {
            let result = server.serve(listener, shutdown).await;
            if let Err(e) = &result {
                error!("HTTP server error: {}", e);
            }
            result
        }));
        self.set_component_state("streaming", ComponentState::Running)
            .await;
        info!(
            "HTTP server started on {}:{}",
            self.config.stream.ip, self.config.stream.port
        );

        if self.config.system.eager_start {
            self.set_component_state("pipeline", ComponentState::Starting)
                .await;
            self.ctx.ensure_started();
            self.set_component_state("pipeline", ComponentState::Running)
                .await;
        } else {
            info!("Camera and classifier start on the first request");
        }

        info!("Smart bin monitor started successfully");
        Ok(())
    }
}

/// Log alerts and errors published by the pipeline, and track the lazily
/// started pipeline in the component states
fn spawn_event_relay(
    event_bus: Arc<EventBus>,
    component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut receiver = event_bus.subscribe();

    tokio::spawn(async move {
        info!("Event relay started");

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = receiver.recv() => event,
            };

            match event {
                Ok(PipelineEvent::PipelineStarted { .. }) => {
                    let mut states = component_states.lock().await;
                    // Only pre-start states move to Running
                    if matches!(
                        states.get("pipeline"),
                        None | Some(ComponentState::Stopped) | Some(ComponentState::Starting)
                    ) {
                        states.insert("pipeline".to_string(), ComponentState::Running);
                        debug!("Component 'pipeline' state changed to: Running");
                    }
                }
                Ok(PipelineEvent::WetWasteDetected { confidence, .. }) => {
                    info!(
                        "ML detected organic waste! Confidence: {:.2}%",
                        confidence * 100.0
                    );
                }
                Ok(PipelineEvent::SystemError { component, error }) => {
                    error!("System error from {}: {}", component, error);
                }
                Ok(PipelineEvent::CameraRestartRequested { .. }) => {
                    info!("Camera restart requested");
                }
                Ok(event) => debug!("Event: {}", event.description()),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event relay lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }

        info!("Event relay stopped");
    })
}
