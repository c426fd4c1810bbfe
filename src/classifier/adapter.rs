use super::{Classifier, MockClassifier, Prediction};
use crate::config::ClassifierConfig;
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Classifier selected once at startup, with the mock as fallback for
/// missing frames and failed inference.
#[derive(Clone)]
pub struct ClassifierAdapter {
    backend: Option<Arc<dyn Classifier>>,
}

impl ClassifierAdapter {
    /// Adapter that only ever produces mock predictions
    pub fn mock() -> Self {
        Self { backend: None }
    }

    pub fn with_backend(backend: Arc<dyn Classifier>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Load the configured model, falling back to the mock
    pub fn from_config(config: &ClassifierConfig) -> Self {
        if config.model_path.is_empty() {
            info!("No classifier model configured, using mock predictions");
            return Self::mock();
        }

        let path = Path::new(&config.model_path);
        if !path.exists() {
            warn!(
                "Model file {} not found, using mock predictions",
                path.display()
            );
            return Self::mock();
        }

        Self::load_model(path, config.input_size)
    }

    #[cfg(feature = "onnx")]
    fn load_model(path: &Path, input_size: u32) -> Self {
        match super::OnnxClassifier::load(path, input_size) {
            Ok(model) => {
                info!("ML model loaded successfully ({})", model.name());
                Self::with_backend(Arc::new(model))
            }
            Err(e) => {
                warn!("Failed to load ML model, using mock predictions: {}", e);
                Self::mock()
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    fn load_model(path: &Path, _input_size: u32) -> Self {
        warn!(
            "Model {} configured but this build has no inference backend, using mock predictions",
            path.display()
        );
        Self::mock()
    }

    /// Whether predictions come from a real backend
    pub fn model_loaded(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.as_ref().map_or("mock", |b| b.name())
    }

    /// Classify a frame. Never fails: a missing frame or an inference error
    /// yields a mock prediction.
    pub fn classify(&self, image: Option<&RgbImage>) -> Prediction {
        let (Some(backend), Some(image)) = (self.backend.as_ref(), image) else {
            if image.is_none() {
                debug!("No frame to classify, using mock prediction");
            }
            return MockClassifier::predict();
        };

        match backend.classify(image) {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!("Prediction error on {}: {}", backend.name(), e);
                MockClassifier::predict()
            }
        }
    }
}

impl std::fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierAdapter")
            .field("backend", &self.backend_name())
            .finish()
    }
}
