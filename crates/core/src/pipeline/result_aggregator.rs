use serde::Serialize;

use crate::detection::domain::detection::Detection;
use crate::emotion::domain::emotion_classifier::EmotionResult;
use crate::pipeline::pipeline_error::PipelineError;
use crate::shared::bounding_box::BoundingBox;

/// One face in a response: where it is, what it feels, how sure the
/// detector was.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionRecord {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub emotion: String,
    pub emotion_id: u32,
    pub confidence: f64,
}

/// Pairs detections with emotion results by position.
///
/// Both lists come from the same crop order, so a length mismatch means a
/// classifier broke its contract.
pub fn aggregate(
    detections: Vec<Detection>,
    emotions: Vec<EmotionResult>,
) -> Result<Vec<DetectionRecord>, PipelineError> {
    if detections.len() != emotions.len() {
        let message = format!(
            "{} detections but {} emotion results",
            detections.len(),
            emotions.len()
        );
        log::error!("Result aggregation failed: {message}");
        return Err(PipelineError::Invariant(message));
    }

    Ok(detections
        .into_iter()
        .zip(emotions)
        .map(|(detection, emotion)| DetectionRecord {
            bbox: detection.bbox,
            emotion: emotion.label,
            emotion_id: emotion.class_id,
            confidence: detection.confidence,
        })
        .collect())
}
