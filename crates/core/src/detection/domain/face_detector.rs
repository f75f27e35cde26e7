use ndarray::Array4;

use crate::detection::domain::detection::DetectionCandidate;
use crate::pipeline::pipeline_error::BoxError;

/// Confidence and overlap thresholds applied inside the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionThresholds {
    pub conf_thres: f64,
    pub iou_thres: f64,
}

/// Face detection capability.
///
/// Receives a `[1, 3, S, S]` letterboxed tensor and returns candidates in
/// that tensor's coordinate space, already filtered by `conf_thres` and
/// de-duplicated with greedy NMS at `iou_thres`. Implementations wrap
/// inference runtimes that may not be re-entrant, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(
        &mut self,
        input: &Array4<f32>,
        thresholds: DetectionThresholds,
    ) -> Result<Vec<DetectionCandidate>, BoxError>;
}
