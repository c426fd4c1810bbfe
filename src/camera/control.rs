use crate::error::{DeviceError, Result, StreamError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Restart request delivered to the capture loop
#[derive(Debug)]
pub struct RestartRequest {
    pub(crate) reply: oneshot::Sender<std::result::Result<(), DeviceError>>,
}

/// Handle used by the HTTP side to ask the capture loop for a restart.
///
/// The capture loop performs the restart itself, between two of its own
/// device operations, so a restart can never race a read on the handle.
#[derive(Clone)]
pub struct CameraControl {
    tx: mpsc::Sender<RestartRequest>,
}

impl CameraControl {
    /// Create a control handle and the receiving end for the capture loop
    pub fn channel() -> (Self, mpsc::Receiver<RestartRequest>) {
        let (tx, rx) = mpsc::channel(4);
        (Self { tx }, rx)
    }

    /// Release and reopen the camera, waiting up to `timeout` for the outcome
    pub async fn restart(&self, timeout: Duration) -> Result<()> {
        let (reply, response) = oneshot::channel();

        self.tx
            .send(RestartRequest { reply })
            .await
            .map_err(|_| StreamError::CaptureLoopUnavailable)?;

        debug!("Camera restart request queued");

        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(outcome)) => outcome.map_err(Into::into),
            Ok(Err(_)) => Err(StreamError::CaptureLoopUnavailable.into()),
            Err(_) => {
                warn!("Camera restart did not complete within {:?}", timeout);
                Err(StreamError::RestartTimeout { timeout }.into())
            }
        }
    }
}
