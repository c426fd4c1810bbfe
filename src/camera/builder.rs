use super::source::FrameSource;
use super::test_pattern::TestPatternSource;
use crate::config::{CameraBackend, CameraConfig};
use std::sync::Arc;
use tracing::info;

/// Select the frame source for the configured backend
pub fn build_frame_source(config: &CameraConfig) -> Arc<dyn FrameSource> {
    let source: Arc<dyn FrameSource> = match config.backend {
        CameraBackend::TestPattern => Arc::new(TestPatternSource::new(config.resolution)),
        CameraBackend::Device => device_source(config),
    };
    info!("Frame source: {}", source.describe());
    source
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn device_source(config: &CameraConfig) -> Arc<dyn FrameSource> {
    Arc::new(super::gst_source::GstFrameSource::new(
        config.index,
        config.resolution,
        config.fps,
    ))
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn device_source(config: &CameraConfig) -> Arc<dyn FrameSource> {
    tracing::warn!(
        "Camera device {} requested but this build has no camera backend; running without camera",
        config.index
    );
    Arc::new(super::source::UnavailableSource::new(
        "built without the `camera` feature",
    ))
}
