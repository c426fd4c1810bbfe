use super::source::{CameraDevice, FrameSource};
use crate::error::{CaptureError, DeviceError};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use tracing::{debug, info};

/// Synthetic camera producing a horizontal red gradient that scrolls left by
/// four pixels per read and wraps around
pub struct TestPatternSource {
    resolution: (u32, u32),
}

impl TestPatternSource {
    pub fn new(resolution: (u32, u32)) -> Self {
        Self { resolution }
    }
}

#[async_trait]
impl FrameSource for TestPatternSource {
    fn describe(&self) -> String {
        format!(
            "test pattern {}x{}",
            self.resolution.0, self.resolution.1
        )
    }

    async fn open(&self) -> Result<Box<dyn CameraDevice>, DeviceError> {
        info!("Opening {}", self.describe());
        Ok(Box::new(TestPatternDevice {
            width: self.resolution.0,
            height: self.resolution.1,
            phase: 0,
        }))
    }
}

struct TestPatternDevice {
    width: u32,
    height: u32,
    phase: u32,
}

impl TestPatternDevice {
    fn render(&self) -> RgbImage {
        let (width, height, phase) = (self.width.max(1), self.height.max(1), self.phase);
        RgbImage::from_fn(width, height, |x, y| {
            let r = (((x + phase) % width) * 255 / width) as u8;
            let g = ((y * 255) / height) as u8;
            let b = ((phase * 4) % 256) as u8;
            Rgb([r, g, b])
        })
    }
}

#[async_trait]
impl CameraDevice for TestPatternDevice {
    async fn read(&mut self) -> Result<RgbImage, CaptureError> {
        let image = self.render();
        self.phase = (self.phase + 4) % self.width.max(1);
        Ok(image)
    }

    async fn configure(&mut self, width: u32, height: u32, fps: u32) -> Result<(), DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::Configuration {
                details: format!("invalid resolution {}x{}", width, height),
            });
        }
        debug!("Test pattern configured to {}x{} @ {}fps", width, height, fps);
        self.width = width;
        self.height = height;
        self.phase = 0;
        Ok(())
    }

    async fn release(self: Box<Self>) {
        debug!("Test pattern released");
    }
}
