pub mod app;
pub mod camera;
pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod frame_slot;
pub mod pipeline;
pub mod streaming;
pub mod telemetry;

pub use app::{ComponentState, ShutdownHandle, ShutdownReason, WastebinOrchestrator};
pub use camera::{
    build_frame_source, CameraControl, CameraDevice, CameraStatus, CaptureLoop, CaptureState,
    FrameSource, TestPatternSource,
};
pub use classifier::{
    ClassificationLoop, ClassificationResult, ClassificationState, Classifier, ClassifierAdapter,
    Prediction, WasteClass, WET_ALERT_THRESHOLD,
};
pub use config::WastebinConfig;
pub use error::{Result, WastebinError};
pub use events::{EventBus, PipelineEvent};
pub use frame::Frame;
pub use frame_slot::{ReadinessSignal, SharedFrameSlot};
pub use pipeline::PipelineContext;
pub use streaming::{router, StreamServer, StreamServerBuilder, StreamStats};
pub use telemetry::{SensorSnapshot, SensorStore};
