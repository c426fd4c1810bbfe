use super::{prediction_from_scores, Classifier, Prediction};
use crate::error::InferenceError;
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::{debug, info};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX image classifier taking a `1 x size x size x 3` float input in [0, 1]
pub struct OnnxClassifier {
    plan: Plan,
    input_size: u32,
    name: String,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(path: P, input_size: u32) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(InferenceError::ModelNotFound {
                path: path.display().to_string(),
            });
        }

        info!("Loading classifier model from {}", path.display());

        let side = input_size as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, side, side, 3]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| InferenceError::ModelLoad {
                details: format!("{}: {}", path.display(), e),
            })?;

        Ok(Self {
            plan,
            input_size,
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "onnx".to_string()),
        })
    }

    fn to_tensor(&self, image: &RgbImage) -> Tensor {
        let side = self.input_size;
        let resized = if image.dimensions() == (side, side) {
            image.clone()
        } else {
            imageops::resize(image, side, side, FilterType::Triangle)
        };

        tract_ndarray::Array4::from_shape_fn(
            (1, side as usize, side as usize, 3),
            |(_, y, x, c)| resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
        )
        .into()
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, image: &RgbImage) -> Result<Prediction, InferenceError> {
        let input = self.to_tensor(image);

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Prediction {
                details: e.to_string(),
            })?;

        let output = outputs.first().ok_or_else(|| InferenceError::Prediction {
            details: "model returned no outputs".to_string(),
        })?;
        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Prediction {
                details: e.to_string(),
            })?
            .iter()
            .copied()
            .collect();

        debug!("Model scores: {:?}", scores);
        prediction_from_scores(&scores)
    }
}
