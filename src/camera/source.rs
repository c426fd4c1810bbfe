use crate::error::{CaptureError, DeviceError};
use async_trait::async_trait;
use image::RgbImage;

/// Factory for camera handles.
///
/// The capture loop is the only caller. Each successful `open` yields a
/// handle the loop owns exclusively until it releases it.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Human readable description for logs
    fn describe(&self) -> String;

    /// Open the device
    async fn open(&self) -> Result<Box<dyn CameraDevice>, DeviceError>;
}

/// An open camera handle
#[async_trait]
pub trait CameraDevice: Send {
    /// Read one frame. [`CaptureError::Disconnected`] means the handle is
    /// dead; every other error is transient.
    async fn read(&mut self) -> Result<RgbImage, CaptureError>;

    /// Request a resolution and frame rate. Best-effort.
    async fn configure(&mut self, width: u32, height: u32, fps: u32) -> Result<(), DeviceError>;

    /// Close the device. Consumes the handle.
    async fn release(self: Box<Self>);
}

/// Source used when no device backend is compiled in. Every open fails,
/// which keeps the pipeline in its degraded no-camera mode.
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl FrameSource for UnavailableSource {
    fn describe(&self) -> String {
        format!("unavailable camera ({})", self.reason)
    }

    async fn open(&self) -> Result<Box<dyn CameraDevice>, DeviceError> {
        Err(DeviceError::NotAvailable {
            details: self.reason.clone(),
        })
    }
}
