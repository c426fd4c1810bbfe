mod adapter;
mod mock;
#[cfg(feature = "onnx")]
mod model;
mod state;
mod worker;

#[cfg(test)]
mod tests;

use crate::error::InferenceError;
use image::RgbImage;
use serde::Serialize;

pub use adapter::ClassifierAdapter;
pub use mock::MockClassifier;
#[cfg(feature = "onnx")]
pub use model::OnnxClassifier;
pub use state::{ClassificationResult, ClassificationSnapshot, ClassificationState};
pub use worker::ClassificationLoop;

/// Confidence (as a fraction) above which a wet prediction raises an alert
/// and the stream draws the warning overlay.
pub const WET_ALERT_THRESHOLD: f64 = 0.70;

/// Classes the model distinguishes, in output index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WasteClass {
    DryRecyclable,
    OrganicWet,
}

impl WasteClass {
    pub const ALL: [WasteClass; 2] = [WasteClass::DryRecyclable, WasteClass::OrganicWet];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(&self) -> &'static str {
        match self {
            WasteClass::DryRecyclable => "dry/recyclable",
            WasteClass::OrganicWet => "organic/wet",
        }
    }

    pub fn is_wet(&self) -> bool {
        matches!(self, WasteClass::OrganicWet)
    }
}

/// Output of a single classifier invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    /// Probability of the predicted class, in [0, 1]
    pub confidence: f64,
    pub is_wet: bool,
}

impl Prediction {
    pub fn new<S: Into<String>>(label: S, confidence: f64, is_wet: bool) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            is_wet,
        }
    }

    pub fn from_class(class: WasteClass, confidence: f64) -> Self {
        Self::new(class.label(), confidence, class.is_wet())
    }

    /// Whether this prediction should raise the wet-waste alert
    pub fn triggers_alert(&self) -> bool {
        exceeds_alert_threshold(self.is_wet, self.confidence)
    }
}

pub(crate) fn exceeds_alert_threshold(is_wet: bool, confidence: f64) -> bool {
    is_wet && confidence > WET_ALERT_THRESHOLD
}

/// Scoring function over a single RGB frame.
///
/// Implementations are called from the blocking pool and must not assume
/// anything about the frame size.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    fn classify(&self, image: &RgbImage) -> Result<Prediction, InferenceError>;
}

/// Turn raw model scores into a prediction.
///
/// One score is read as P(wet) from a sigmoid head; two or more are treated
/// as class probabilities and reduced with argmax.
pub fn prediction_from_scores(scores: &[f32]) -> Result<Prediction, InferenceError> {
    match scores {
        [] => Err(InferenceError::Prediction {
            details: "model produced no scores".to_string(),
        }),
        [p_wet] => {
            let p_wet = f64::from(*p_wet);
            if p_wet > 0.5 {
                Ok(Prediction::from_class(WasteClass::OrganicWet, p_wet))
            } else {
                Ok(Prediction::from_class(WasteClass::DryRecyclable, 1.0 - p_wet))
            }
        }
        _ => {
            let (index, best) = scores
                .iter()
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .ok_or_else(|| InferenceError::Prediction {
                    details: "model produced no scores".to_string(),
                })?;

            let class = WasteClass::from_index(index).ok_or_else(|| InferenceError::Prediction {
                details: format!("unknown class index {}", index),
            })?;
            Ok(Prediction::from_class(class, f64::from(best)))
        }
    }
}
