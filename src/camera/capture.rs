use super::control::RestartRequest;
use super::health::CameraStatus;
use super::source::{CameraDevice, FrameSource};
use crate::config::CameraConfig;
use crate::error::DeviceError;
use crate::events::{EventBus, PipelineEvent};
use crate::frame::Frame;
use crate::frame_slot::{ReadinessSignal, SharedFrameSlot};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Capture loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    WaitingForDevice,
    Capturing,
    DeviceLost,
}

/// Outcome of one capture loop step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    Opened,
    OpenFailed,
    FrameRead,
    ReadFailed,
    Disconnected,
    Released,
    RestartRequested,
}

/// State transition table
pub fn next_state(state: CaptureState, event: CaptureEvent) -> CaptureState {
    use CaptureEvent::*;
    use CaptureState::*;

    match (state, event) {
        (_, RestartRequested) => DeviceLost,
        (WaitingForDevice, Opened) => Capturing,
        (WaitingForDevice, OpenFailed) => WaitingForDevice,
        (Capturing, FrameRead) | (Capturing, ReadFailed) => Capturing,
        (Capturing, Disconnected) => DeviceLost,
        (DeviceLost, Released) => WaitingForDevice,
        (current, unexpected) => {
            warn!(
                "Ignoring capture event {:?} in state {:?}",
                unexpected, current
            );
            current
        }
    }
}

/// Delays applied after each capture event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub frame_delay: Duration,
    pub read_retry: Duration,
    pub reopen_backoff: Duration,
}

impl BackoffPolicy {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            frame_delay: config.frame_delay(),
            read_retry: config.read_retry(),
            reopen_backoff: config.reopen_backoff(),
        }
    }

    /// How long to wait before the next step
    pub fn delay_after(&self, event: CaptureEvent) -> Duration {
        match event {
            CaptureEvent::FrameRead => self.frame_delay,
            CaptureEvent::ReadFailed => self.read_retry,
            CaptureEvent::OpenFailed => self.reopen_backoff,
            CaptureEvent::Opened
            | CaptureEvent::Disconnected
            | CaptureEvent::Released
            | CaptureEvent::RestartRequested => Duration::ZERO,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            frame_delay: Duration::from_millis(33),
            read_retry: Duration::from_secs(1),
            reopen_backoff: Duration::from_secs(2),
        }
    }
}

/// Producer task: the only owner of the camera handle and the only writer of
/// the shared frame slot.
pub struct CaptureLoop {
    source: Arc<dyn FrameSource>,
    slot: Arc<SharedFrameSlot>,
    readiness: Arc<ReadinessSignal>,
    status: Arc<CameraStatus>,
    event_bus: Arc<EventBus>,
    restart_rx: mpsc::Receiver<RestartRequest>,
    policy: BackoffPolicy,
    resolution: (u32, u32),
    fps: u32,
    state: CaptureState,
    device: Option<Box<dyn CameraDevice>>,
    next_frame_id: u64,
}

impl CaptureLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &CameraConfig,
        source: Arc<dyn FrameSource>,
        slot: Arc<SharedFrameSlot>,
        readiness: Arc<ReadinessSignal>,
        status: Arc<CameraStatus>,
        event_bus: Arc<EventBus>,
        restart_rx: mpsc::Receiver<RestartRequest>,
    ) -> Self {
        Self {
            source,
            slot,
            readiness,
            status,
            event_bus,
            restart_rx,
            policy: BackoffPolicy::from_config(config),
            resolution: config.resolution,
            fps: config.fps,
            state: CaptureState::WaitingForDevice,
            device: None,
            next_frame_id: 1,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Run until cancelled. Never exits on device errors.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Capture loop started with {}", self.source.describe());

        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(request) = self.restart_rx.recv() => {
                    delay = self.handle_restart(request).await;
                    continue;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            delay = self.step().await;
        }

        if let Some(device) = self.device.take() {
            device.release().await;
        }
        self.status.set_available(false);
        info!("Capture loop stopped");
    }

    /// Advance the state machine by one device operation
    pub async fn step(&mut self) -> Duration {
        let event = match self.state {
            CaptureState::WaitingForDevice => self.try_open().await,
            CaptureState::Capturing => self.try_read().await,
            CaptureState::DeviceLost => self.release_device().await,
        };
        self.apply(event)
    }

    fn apply(&mut self, event: CaptureEvent) -> Duration {
        let previous = self.state;
        self.state = next_state(previous, event);
        self.status.set_state(self.state);
        if previous != self.state {
            debug!("Capture state {:?} -> {:?} on {:?}", previous, self.state, event);
        }
        self.policy.delay_after(event)
    }

    async fn try_open(&mut self) -> CaptureEvent {
        self.status.record_open_attempt();
        match self.open_device().await {
            Ok(()) => CaptureEvent::Opened,
            Err(e) => {
                warn!("Camera not available, waiting: {}", e);
                CaptureEvent::OpenFailed
            }
        }
    }

    async fn open_device(&mut self) -> Result<(), DeviceError> {
        let mut device = self.source.open().await?;

        let (width, height) = self.resolution;
        if let Err(e) = device.configure(width, height, self.fps).await {
            warn!("Camera configuration ignored: {}", e);
        }

        self.device = Some(device);
        self.status.set_available(true);
        let _ = self.event_bus.publish(PipelineEvent::CameraStatusChanged {
            available: true,
            timestamp: SystemTime::now(),
        });
        info!("Camera initialized successfully ({}x{} @ {}fps)", width, height, self.fps);
        Ok(())
    }

    async fn try_read(&mut self) -> CaptureEvent {
        let Some(device) = self.device.as_mut() else {
            error!("Capturing without an open device");
            return CaptureEvent::Disconnected;
        };

        match device.read().await {
            Ok(image) => {
                let frame = Frame::new(self.next_frame_id, SystemTime::now(), image);
                self.next_frame_id += 1;
                trace!("Captured frame {} ({}x{})", frame.id, frame.width(), frame.height());

                self.slot.publish(frame);
                self.status.record_frame();
                if self.readiness.set() {
                    info!("Camera capture started - first frame received");
                }
                CaptureEvent::FrameRead
            }
            Err(e) if e.is_device_lost() => {
                error!("Camera lost: {}", e);
                CaptureEvent::Disconnected
            }
            Err(e) => {
                self.status.record_read_failure();
                warn!("Failed to capture frame: {}", e);
                CaptureEvent::ReadFailed
            }
        }
    }

    async fn release_device(&mut self) -> CaptureEvent {
        if let Some(device) = self.device.take() {
            device.release().await;
            debug!("Camera handle released");
        }
        if self.status.is_available() {
            self.status.set_available(false);
            let _ = self.event_bus.publish(PipelineEvent::CameraStatusChanged {
                available: false,
                timestamp: SystemTime::now(),
            });
        }
        CaptureEvent::Released
    }

    /// Restart through the same path as a lost device: release, then open
    async fn handle_restart(&mut self, request: RestartRequest) -> Duration {
        info!("Restarting camera on request");
        self.apply(CaptureEvent::RestartRequested);
        let released = self.release_device().await;
        self.apply(released);

        self.status.record_open_attempt();
        let outcome = self.open_device().await;
        let delay = match &outcome {
            Ok(()) => {
                info!("Camera restarted successfully");
                self.apply(CaptureEvent::Opened)
            }
            Err(e) => {
                warn!("Camera restart failed: {}", e);
                self.apply(CaptureEvent::OpenFailed)
            }
        };

        if request.reply.send(outcome).is_err() {
            debug!("Restart requester went away before the reply");
        }
        delay
    }
}
