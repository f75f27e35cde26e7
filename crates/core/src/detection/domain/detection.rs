use crate::shared::bounding_box::BoundingBox;

/// Raw detector output in letterboxed-tensor space: `[x1, y1, x2, y2]`.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionCandidate {
    pub bbox: [f64; 4],
    pub confidence: f64,
    pub class_id: usize,
}

impl DetectionCandidate {
    pub fn new(bbox: [f64; 4], confidence: f64) -> Self {
        Self {
            bbox,
            confidence,
            class_id: 0,
        }
    }
}

/// A face in original-image pixel space with its detector confidence.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f64,
}
