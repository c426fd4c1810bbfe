use crate::camera::{
    build_frame_source, CameraControl, CameraStatus, CaptureLoop, FrameSource, RestartRequest,
};
use crate::classifier::{ClassificationLoop, ClassificationState, ClassifierAdapter};
use crate::config::WastebinConfig;
use crate::events::{EventBus, PipelineEvent};
use crate::frame_slot::{ReadinessSignal, SharedFrameSlot};
use crate::streaming::{FrameEncoder, OverlayRenderer, StreamStats};
use crate::telemetry::SensorStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shared state handed to every pipeline component and HTTP handler
pub struct PipelineContext {
    pub config: WastebinConfig,
    pub slot: Arc<SharedFrameSlot>,
    pub readiness: Arc<ReadinessSignal>,
    pub camera_status: Arc<CameraStatus>,
    pub classification: Arc<ClassificationState>,
    pub sensors: Arc<SensorStore>,
    pub event_bus: Arc<EventBus>,
    pub camera_control: CameraControl,
    pub stream_stats: Arc<StreamStats>,
    pub renderer: Arc<OverlayRenderer>,
    pub encoder: FrameEncoder,
    source: Arc<dyn FrameSource>,
    classifier: ClassifierAdapter,
    restart_rx: Mutex<Option<mpsc::Receiver<RestartRequest>>>,
    started: AtomicBool,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PipelineContext {
    /// Build the context with the configured camera and classifier
    pub fn new(config: WastebinConfig) -> Self {
        let source = build_frame_source(&config.camera);
        let classifier = ClassifierAdapter::from_config(&config.classifier);
        Self::with_components(config, source, classifier)
    }

    pub fn with_components(
        config: WastebinConfig,
        source: Arc<dyn FrameSource>,
        classifier: ClassifierAdapter,
    ) -> Self {
        let renderer = OverlayRenderer::from_config(&config.stream);
        Self::with_renderer(config, source, classifier, renderer)
    }

    pub fn with_renderer(
        config: WastebinConfig,
        source: Arc<dyn FrameSource>,
        classifier: ClassifierAdapter,
        renderer: OverlayRenderer,
    ) -> Self {
        let (camera_control, restart_rx) = CameraControl::channel();

        Self {
            slot: Arc::new(SharedFrameSlot::new()),
            readiness: Arc::new(ReadinessSignal::new()),
            camera_status: Arc::new(CameraStatus::new()),
            classification: Arc::new(ClassificationState::new(config.classifier.interval())),
            sensors: Arc::new(SensorStore::new()),
            event_bus: Arc::new(EventBus::new(config.system.event_bus_capacity)),
            camera_control,
            stream_stats: Arc::new(StreamStats::new()),
            renderer: Arc::new(renderer),
            encoder: FrameEncoder::new(config.stream.jpeg_quality),
            source,
            classifier,
            restart_rx: Mutex::new(Some(restart_rx)),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Start the capture and classification loops exactly once.
    ///
    /// Returns `true` for the call that started them. Must run inside a
    /// tokio runtime.
    pub fn ensure_started(&self) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let Some(restart_rx) = self.restart_rx.lock().take() else {
            warn!("Pipeline restart channel already taken");
            return false;
        };

        info!("Starting camera and ML system");

        let capture_loop = CaptureLoop::new(
            &self.config.camera,
            Arc::clone(&self.source),
            Arc::clone(&self.slot),
            Arc::clone(&self.readiness),
            Arc::clone(&self.camera_status),
            Arc::clone(&self.event_bus),
            restart_rx,
        );

        let classification_loop = ClassificationLoop::new(
            &self.config.classifier,
            self.classifier.clone(),
            Arc::clone(&self.slot),
            Arc::clone(&self.readiness),
            Arc::clone(&self.classification),
            Arc::clone(&self.event_bus),
        );
        self.classification.set_running(true);

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(capture_loop.run(self.shutdown.child_token())));
        tasks.push(tokio::spawn(
            classification_loop.run(self.shutdown.child_token()),
        ));

        drop(tasks);

        let _ = self.event_bus.publish(PipelineEvent::PipelineStarted {
            timestamp: SystemTime::now(),
        });
        info!("ML system started successfully");
        true
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Whether predictions come from a loaded model
    pub fn ml_loaded(&self) -> bool {
        self.classifier.model_loaded()
    }

    /// Token cancelled when the process shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Signal every loop and session to stop
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Background task handles, for joining at shutdown
    pub fn take_tasks(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.tasks.lock())
    }
}
