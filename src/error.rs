use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WastebinError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Frame capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl WastebinError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Camera could not be opened or configured. Never fatal: drives the
/// capture loop back into its retry state.
#[derive(Error, Debug, Clone)]
pub enum DeviceError {
    #[error("Failed to open camera device {device}: {details}")]
    Open { device: String, details: String },

    #[error("Camera device not available: {details}")]
    NotAvailable { details: String },

    #[error("Camera configuration failed: {details}")]
    Configuration { details: String },
}

/// A single frame read failed.
#[derive(Error, Debug, Clone)]
pub enum CaptureError {
    #[error("No frame available")]
    NoFrame,

    #[error("Timed out after {timeout:?} waiting for a frame")]
    Timeout { timeout: Duration },

    #[error("Camera disconnected")]
    Disconnected,

    #[error("Invalid frame: {details}")]
    InvalidFrame { details: String },
}

impl CaptureError {
    /// Whether the device is gone and must be reopened
    pub fn is_device_lost(&self) -> bool {
        matches!(self, CaptureError::Disconnected)
    }
}

/// Model loading or prediction failed. Always caught by the classifier
/// adapter and replaced with a mock result.
#[derive(Error, Debug, Clone)]
pub enum InferenceError {
    #[error("Model file not found: {path}")]
    ModelNotFound { path: String },

    #[error("Failed to load model: {details}")]
    ModelLoad { details: String },

    #[error("Prediction failed: {details}")]
    Prediction { details: String },
}

#[derive(Error, Debug, Clone)]
pub enum EncodingError {
    #[error("JPEG encoding failed: {details}")]
    Jpeg { details: String },

    #[error("Render worker failed: {details}")]
    Worker { details: String },
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to bind {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server failed: {details}")]
    ServerFailed { details: String },

    #[error("Capture loop is not accepting restart requests")]
    CaptureLoopUnavailable,

    #[error("Camera restart did not complete within {timeout:?}")]
    RestartTimeout { timeout: Duration },
}

#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, WastebinError>;
