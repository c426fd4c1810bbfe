use super::source::{CameraDevice, FrameSource};
use crate::error::{CaptureError, DeviceError};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::{ClockTime, Element, Pipeline};
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use image::RgbImage;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// V4L2 camera read through a GStreamer pipeline that converts to packed RGB
pub struct GstFrameSource {
    index: u32,
    resolution: (u32, u32),
    fps: u32,
    read_timeout: Duration,
}

impl GstFrameSource {
    pub fn new(index: u32, resolution: (u32, u32), fps: u32) -> Self {
        Self {
            index,
            resolution,
            fps,
            read_timeout: Duration::from_secs(1),
        }
    }

    fn device_path(&self) -> String {
        format!("/dev/video{}", self.index)
    }

    /// Build GStreamer pipeline string for RGB capture
    fn build_pipeline_string(&self) -> String {
        let (width, height) = self.resolution;
        format!(
            "v4l2src device={} ! \
             videoconvert ! videoscale ! videorate ! \
             capsfilter name=caps caps=video/x-raw,format=RGB,width={},height={},framerate={}/1 ! \
             appsink name=sink sync=false max-buffers=2 drop=true enable-last-sample=false",
            self.device_path(),
            width,
            height,
            self.fps.max(1)
        )
    }
}

#[async_trait]
impl FrameSource for GstFrameSource {
    fn describe(&self) -> String {
        format!("GStreamer camera {}", self.device_path())
    }

    async fn open(&self) -> Result<Box<dyn CameraDevice>, DeviceError> {
        let device = self.device_path();
        let pipeline_desc = self.build_pipeline_string();
        let read_timeout = self.read_timeout;

        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let opened = tokio::task::spawn_blocking({
            let device = device.clone();
            move || open_pipeline(&device, &pipeline_desc, read_timeout)
        })
        .await
        .map_err(|e| DeviceError::Open {
            device,
            details: format!("open task failed: {}", e),
        })??;

        Ok(Box::new(opened))
    }
}

fn open_pipeline(
    device: &str,
    pipeline_desc: &str,
    read_timeout: Duration,
) -> Result<GstCameraDevice, DeviceError> {
    let open_error = |details: String| DeviceError::Open {
        device: device.to_string(),
        details,
    };

    gstreamer::init().map_err(|e| open_error(format!("Failed to initialize GStreamer: {}", e)))?;

    let pipeline = gstreamer::parse::launch(pipeline_desc)
        .map_err(|e| open_error(format!("Failed to create pipeline: {}", e)))?
        .downcast::<Pipeline>()
        .map_err(|_| open_error("Failed to downcast to Pipeline".to_string()))?;

    let appsink = pipeline
        .by_name("sink")
        .ok_or_else(|| open_error("Pipeline has no appsink".to_string()))?
        .downcast::<AppSink>()
        .map_err(|_| open_error("Failed to downcast to AppSink".to_string()))?;

    let caps_filter = pipeline
        .by_name("caps")
        .ok_or_else(|| open_error("Pipeline has no capsfilter".to_string()))?;

    pipeline
        .set_state(gstreamer::State::Playing)
        .map_err(|e| open_error(format!("Failed to start pipeline: {}", e)))?;

    // A device that opens but never delivers is as good as absent
    if appsink
        .try_pull_sample(ClockTime::from_mseconds(read_timeout.as_millis() as u64 * 3))
        .is_none()
    {
        let _ = pipeline.set_state(gstreamer::State::Null);
        return Err(open_error("Camera test frame failed".to_string()));
    }

    info!("GStreamer camera {} opened", device);

    Ok(GstCameraDevice {
        pipeline,
        appsink,
        caps_filter,
        read_timeout,
    })
}

struct GstCameraDevice {
    pipeline: Pipeline,
    appsink: AppSink,
    caps_filter: Element,
    read_timeout: Duration,
}

#[async_trait]
impl CameraDevice for GstCameraDevice {
    async fn read(&mut self) -> Result<RgbImage, CaptureError> {
        let pipeline = self.pipeline.clone();
        let appsink = self.appsink.clone();
        let timeout = self.read_timeout;

        tokio::task::spawn_blocking(move || pull_frame(&pipeline, &appsink, timeout))
            .await
            .map_err(|e| CaptureError::InvalidFrame {
                details: format!("read task failed: {}", e),
            })?
    }

    async fn configure(&mut self, width: u32, height: u32, fps: u32) -> Result<(), DeviceError> {
        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .field("width", width as i32)
            .field("height", height as i32)
            .field("framerate", gstreamer::Fraction::new(fps.max(1) as i32, 1))
            .build();

        debug!("Setting camera caps to {}", caps);
        self.caps_filter.set_property("caps", caps);
        Ok(())
    }

    async fn release(self: Box<Self>) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop GStreamer pipeline: {}", e);
        }
        info!("GStreamer camera released");
    }
}

fn pull_frame(
    pipeline: &Pipeline,
    appsink: &AppSink,
    timeout: Duration,
) -> Result<RgbImage, CaptureError> {
    if let Some(bus) = pipeline.bus() {
        if let Some(message) =
            bus.pop_filtered(&[gstreamer::MessageType::Error, gstreamer::MessageType::Eos])
        {
            warn!("GStreamer pipeline reported {:?}", message.type_());
            return Err(CaptureError::Disconnected);
        }
    }

    let sample = match appsink.try_pull_sample(ClockTime::from_mseconds(timeout.as_millis() as u64))
    {
        Some(sample) => sample,
        None if appsink.is_eos() => return Err(CaptureError::Disconnected),
        None => return Err(CaptureError::Timeout { timeout }),
    };

    sample_to_image(&sample)
}

/// Copy a packed RGB sample into an image, dropping any row padding
fn sample_to_image(sample: &gstreamer::Sample) -> Result<RgbImage, CaptureError> {
    let invalid = |details: String| CaptureError::InvalidFrame { details };

    let buffer = sample
        .buffer()
        .ok_or_else(|| invalid("No buffer in sample".to_string()))?;
    let caps = sample
        .caps()
        .ok_or_else(|| invalid("No caps in sample".to_string()))?;
    let video_info =
        VideoInfo::from_caps(caps).map_err(|e| invalid(format!("Failed to get video info: {}", e)))?;

    let width = video_info.width();
    let height = video_info.height();
    let stride = video_info.stride()[0] as usize;
    let row_bytes = width as usize * 3;

    let map = buffer
        .map_readable()
        .map_err(|e| invalid(format!("Failed to map buffer: {}", e)))?;
    let data = map.as_slice();

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let line = data
            .get(start..start + row_bytes)
            .ok_or_else(|| invalid(format!("Buffer too short for row {}", row)))?;
        pixels.extend_from_slice(line);
    }

    trace!("Captured RGB frame {}x{} ({} bytes)", width, height, map.len());

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| invalid("Pixel buffer does not match dimensions".to_string()))
}
