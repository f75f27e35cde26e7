/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Accepts a letterboxed NCHW tensor, runs inference, decodes the raw head
/// output and applies the confidence filter and NMS.
use std::path::Path;

use ndarray::Array4;

use crate::detection::domain::detection::DetectionCandidate;
use crate::detection::domain::face_detector::{DetectionThresholds, FaceDetector};
use crate::detection::domain::non_max_suppression::non_max_suppression;
use crate::pipeline::pipeline_error::BoxError;
use crate::shared::constants::MAX_DETECTIONS;
use crate::shared::execution_device::ExecutionDevice;

/// Face-only models have a single class.
const FACE_CLASSES: usize = 1;

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    input_size: Option<u32>,
    num_classes: usize,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model on `device`.
    ///
    /// The static input resolution is read from the model's NCHW input
    /// shape when present; dynamic models report `None`.
    pub fn new(model_path: &Path, device: ExecutionDevice) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(device.execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() >= 4 && shape[2] > 0 {
                    Some(shape[2] as u32)
                } else {
                    None
                }
            } else {
                None
            }
        });

        Ok(Self {
            session,
            input_size,
            num_classes: FACE_CLASSES,
        })
    }

    /// Square input size baked into the model, if it is not dynamic.
    pub fn input_size(&self) -> Option<u32> {
        self.input_size
    }

    fn run(
        &mut self,
        input: &Array4<f32>,
        thresholds: DetectionThresholds,
    ) -> Result<Vec<DetectionCandidate>, Box<dyn std::error::Error>> {
        let input_value = ort::value::Tensor::from_array(input.clone())?;
        let num_classes = self.num_classes;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_standard_layout()
            .as_slice()
            .map(|s| s.to_vec())
            .ok_or("Cannot get tensor slice")?;

        let raw = decode_output(&data, &shape, num_classes)?;
        Ok(non_max_suppression(
            raw,
            thresholds.conf_thres,
            thresholds.iou_thres,
            MAX_DETECTIONS,
        ))
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(
        &mut self,
        input: &Array4<f32>,
        thresholds: DetectionThresholds,
    ) -> Result<Vec<DetectionCandidate>, BoxError> {
        self.run(input, thresholds).map_err(|e| e.to_string().into())
    }
}

/// Decodes a YOLO head output into unfiltered candidates.
///
/// Two layouts are handled:
/// - `[1, N, 5 + nc]` (YOLOv5/v7): `cx, cy, w, h, objectness, class scores...`,
///   confidence = objectness x best class score.
/// - `[1, 4 + nc, N]` (YOLOv8, transposed): `cx, cy, w, h, class scores...`,
///   confidence = best class score.
fn decode_output(
    data: &[f32],
    shape: &[usize],
    num_classes: usize,
) -> Result<Vec<DetectionCandidate>, String> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}"));
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(format!("Unexpected YOLO output shape: {shape:?}"));
    }

    let feature = |det: usize, f: usize| -> f64 {
        if transposed {
            data[f * num_dets + det] as f64
        } else {
            data[det * num_feats + f] as f64
        }
    };

    let mut candidates = Vec::new();
    for i in 0..num_dets {
        let (confidence, class_id) = if transposed {
            best_class((4..num_feats.min(4 + num_classes)).map(|f| feature(i, f)))
        } else {
            let objectness = feature(i, 4);
            let class_range = 5..num_feats.min(5 + num_classes);
            if class_range.is_empty() {
                (objectness, 0)
            } else {
                let (score, class_id) = best_class(class_range.map(|f| feature(i, f)));
                (objectness * score, class_id)
            }
        };
        if !confidence.is_finite() {
            continue;
        }

        let (cx, cy, w, h) = (feature(i, 0), feature(i, 1), feature(i, 2), feature(i, 3));
        candidates.push(DetectionCandidate {
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            confidence,
            class_id,
        });
    }
    Ok(candidates)
}

fn best_class(scores: impl Iterator<Item = f64>) -> (f64, usize) {
    scores
        .enumerate()
        .fold((f64::NEG_INFINITY, 0), |(best, best_id), (id, s)| {
            if s > best {
                (s, id)
            } else {
                (best, best_id)
            }
        })
}
