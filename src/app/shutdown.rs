use super::{ComponentState, WastebinOrchestrator};
use crate::error::{Result, WastebinError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const PIPELINE_STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl WastebinOrchestrator {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Stops the server, open streams and both pipeline loops
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        for component in ["streaming", "pipeline", "event_relay"] {
            if let Err(e) = self.stop_component(component).await {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Stop a specific component
    async fn stop_component(&mut self, component: &str) -> Result<()> {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        let outcome = match component {
            "streaming" => match self.server_task.take() {
                Some(task) => match timeout(SERVER_STOP_TIMEOUT, task).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => Err(WastebinError::component(
                        "streaming",
                        format!("server task panicked: {}", e),
                    )),
                    Err(_) => Err(stop_timeout(component)),
                },
                None => Ok(()),
            },
            "pipeline" => join_all(component, self.ctx.take_tasks(), PIPELINE_STOP_TIMEOUT).await,
            "event_relay" => match self.relay_task.take() {
                Some(task) => join_all(component, vec![task], SERVER_STOP_TIMEOUT).await,
                None => Ok(()),
            },
            other => {
                warn!("Unknown component {}", other);
                Ok(())
            }
        };

        match &outcome {
            Ok(()) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
            }
        }
        outcome
    }
}

async fn join_all(component: &str, tasks: Vec<JoinHandle<()>>, limit: Duration) -> Result<()> {
    for task in tasks {
        match timeout(limit, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(WastebinError::component(
                    component,
                    format!("task panicked: {}", e),
                ))
            }
            Err(_) => return Err(stop_timeout(component)),
        }
    }
    Ok(())
}

fn stop_timeout(component: &str) -> WastebinError {
    error!("{} component stop timeout", component);
    WastebinError::System {
        message: format!("{} component stop timeout", component),
    }
}
