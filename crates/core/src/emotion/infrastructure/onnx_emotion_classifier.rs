//! Facial-expression classifier backed by an ONNX Runtime session.
//!
//! Crops are resized to the model's square input, normalized with ImageNet
//! statistics and classified in one batch.

use std::path::Path;

use image::imageops::FilterType;
use ndarray::Array4;

use crate::emotion::domain::emotion_classifier::{EmotionClassifier, EmotionResult};
use crate::pipeline::pipeline_error::BoxError;
use crate::shared::execution_device::ExecutionDevice;
use crate::shared::pixel_array::PixelArray;

/// Fallback input resolution when the model's spatial dims are dynamic.
const DEFAULT_INPUT_SIZE: u32 = 224;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub struct OnnxEmotionClassifier {
    session: ort::session::Session,
    input_size: u32,
}

impl OnnxEmotionClassifier {
    pub fn new(model_path: &Path, device: ExecutionDevice) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(device.execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            input_size,
        })
    }

    fn run(
        &mut self,
        crops: &[PixelArray],
        show_conf: bool,
    ) -> Result<Vec<EmotionResult>, Box<dyn std::error::Error>> {
        // Empty crops cannot be resized; they get the fallback result and
        // are left out of the batch.
        let valid: Vec<usize> = (0..crops.len()).filter(|&i| !crops[i].is_empty()).collect();
        let mut results = vec![EmotionResult::unknown(); crops.len()];
        if valid.is_empty() {
            return Ok(results);
        }

        let batch: Vec<&PixelArray> = valid.iter().map(|&i| &crops[i]).collect();
        let tensor = preprocess(&batch, self.input_size);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Emotion model produced no outputs".into());
        }
        let logits = outputs[0].try_extract_array::<f32>()?;
        let shape = logits.shape().to_vec();
        if shape.len() != 2 || shape[0] != batch.len() || shape[1] == 0 {
            return Err(format!(
                "Unexpected emotion output shape {shape:?} for batch of {}",
                batch.len()
            )
            .into());
        }
        let logits = logits.as_standard_layout();
        let flat = logits.as_slice().ok_or("Cannot get tensor slice")?;

        for (row, &crop_index) in flat.chunks(shape[1]).zip(&valid) {
            results[crop_index] = predict(row, show_conf);
        }
        Ok(results)
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(
        &mut self,
        crops: &[PixelArray],
        show_conf: bool,
    ) -> Result<Vec<EmotionResult>, BoxError> {
        self.run(crops, show_conf).map_err(|e| e.to_string().into())
    }
}

/// Bilinear resize to `size` x `size`, ImageNet-normalized NCHW batch.
fn preprocess(crops: &[&PixelArray], size: u32) -> Array4<f32> {
    let s = size as usize;
    let mut tensor = Array4::<f32>::zeros((crops.len(), 3, s, s));
    for (n, crop) in crops.iter().enumerate() {
        let resized = image::imageops::resize(&crop.to_rgb_image(), size, size, FilterType::Triangle);
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let v = pixel.0[c] as f32 / 255.0;
                tensor[[n, c, y as usize, x as usize]] = (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }
    }
    tensor
}

fn predict(scores: &[f32], show_conf: bool) -> EmotionResult {
    if scores.is_empty() || scores.iter().any(|v| !v.is_finite()) {
        return EmotionResult::unknown();
    }
    let probs = to_probabilities(scores);
    let (class_id, probability) = probs
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });
    EmotionResult::from_prediction(class_id, probability, show_conf)
}

/// Softmax, unless the model already emits a probability distribution.
fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    let is_distribution = scores.iter().all(|v| (0.0..=1.0).contains(v)) && (sum - 1.0).abs() < 1e-3;
    if is_distribution {
        return scores.to_vec();
    }
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = scores.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exp.iter().sum();
    exp.into_iter().map(|v| v / total).collect()
}
