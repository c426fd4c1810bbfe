use super::{ShutdownHandle, ShutdownReason, WastebinOrchestrator};
use crate::error::{Result, WastebinError};
use tracing::{error, info};

impl WastebinOrchestrator {
    /// Run until a signal, a shutdown request or a server failure, then shut
    /// down gracefully
    pub async fn run(&mut self) -> Result<i32> {
        info!("Smart bin monitor is running");

        let shutdown_receiver =
            self.shutdown_receiver
                .take()
                .ok_or_else(|| WastebinError::System {
                    message: "Shutdown receiver already taken".to_string(),
                })?;

        setup_signal_handlers(self.shutdown_handle());

        let server_failed = async {
            match self.server_task.as_mut() {
                Some(task) => match task.await {
                    Ok(Ok(())) => ShutdownReason::Error("HTTP server exited".to_string()),
                    Ok(Err(e)) => ShutdownReason::Error(e.to_string()),
                    Err(e) => ShutdownReason::Error(format!("HTTP server task failed: {}", e)),
                },
                None => std::future::pending().await,
            }
        };

        let shutdown_reason = tokio::select! {
            reason = shutdown_receiver => reason.map_err(|_| WastebinError::System {
                message: "Shutdown channel closed unexpectedly".to_string(),
            })?,
            reason = server_failed => reason,
        };

        info!("Shutdown initiated: {:?}", shutdown_reason);
        if matches!(shutdown_reason, ShutdownReason::Error(_)) {
            // The server task already finished and was consumed
            self.server_task = None;
        }

        let mut exit_code = self.shutdown().await?;
        if matches!(shutdown_reason, ShutdownReason::Error(_)) {
            exit_code = 1;
        }

        info!("Smart bin monitor shutdown complete");
        Ok(exit_code)
    }
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: ShutdownHandle) {
    // SIGTERM (systemd stop)
    #[cfg(unix)]
    {
        let shutdown_sigterm = shutdown.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!("Failed to register SIGTERM handler: {}", e);
                    return;
                }
            };

            if sigterm.recv().await.is_some() {
                info!("Received SIGTERM signal");
                shutdown_sigterm
                    .request(ShutdownReason::Signal("SIGTERM".to_string()))
                    .await;
            }
        });
    }

    // SIGINT (Ctrl+C)
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            shutdown
                .request(ShutdownReason::Signal("SIGINT".to_string()))
                .await;
        }
    });
}
