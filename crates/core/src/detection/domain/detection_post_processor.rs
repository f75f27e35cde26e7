use crate::detection::domain::detection::{Detection, DetectionCandidate};
use crate::imaging::letterbox::PreprocessTransform;
use crate::shared::bounding_box::BoundingBox;

/// Maps detector candidates back onto the original image.
///
/// Each box is un-padded, un-scaled, rounded half-to-even and clipped to
/// `[0, width] x [0, height]`. Boxes left with no area are dropped; the rest
/// keep their input order.
pub fn post_process(
    candidates: &[DetectionCandidate],
    transform: &PreprocessTransform,
    width: u32,
    height: u32,
) -> Vec<Detection> {
    candidates
        .iter()
        .filter_map(|c| {
            let (x1, y1) = transform.to_original_space(c.bbox[0], c.bbox[1]);
            let (x2, y2) = transform.to_original_space(c.bbox[2], c.bbox[3]);
            let bbox = BoundingBox::new(
                clip(x1, width),
                clip(y1, height),
                clip(x2, width),
                clip(y2, height),
            );
            if bbox.is_empty() {
                log::debug!("Dropping degenerate detection {:?}", c.bbox);
                return None;
            }
            Some(Detection {
                bbox,
                confidence: c.confidence,
            })
        })
        .collect()
}

fn clip(v: f64, limit: u32) -> u32 {
    if !v.is_finite() {
        return 0;
    }
    v.round_ties_even().clamp(0.0, limit as f64) as u32
}
