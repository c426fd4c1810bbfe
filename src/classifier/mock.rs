use super::{Classifier, Prediction, WasteClass};
use crate::error::InferenceError;
use image::RgbImage;
use rand::Rng;

/// Randomized stand-in used when no model is loaded
#[derive(Debug, Default, Clone, Copy)]
pub struct MockClassifier;

impl MockClassifier {
    /// Uniform choice of label, confidence in [0.60, 0.95] at two decimals
    pub fn predict() -> Prediction {
        let mut rng = rand::thread_rng();

        let class = if rng.gen_bool(0.5) {
            WasteClass::OrganicWet
        } else {
            WasteClass::DryRecyclable
        };
        let confidence: f64 = rng.gen_range(0.6..=0.95);

        Prediction::from_class(class, (confidence * 100.0).round() / 100.0)
    }
}

impl Classifier for MockClassifier {
    fn name(&self) -> &str {
        "mock"
    }

    fn classify(&self, _image: &RgbImage) -> Result<Prediction, InferenceError> {
        Ok(Self::predict())
    }
}
