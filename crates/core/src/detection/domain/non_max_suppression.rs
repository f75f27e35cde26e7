use crate::detection::domain::detection::DetectionCandidate;

/// IoU between two boxes represented as `[x1, y1, x2, y2]`.
pub fn box_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Confidence filter followed by greedy single-class NMS.
///
/// Keeps candidates with `confidence > conf_thres`, sorts them by descending
/// confidence and suppresses any later candidate whose IoU with a kept one
/// exceeds `iou_thres`. The sort is stable: equal confidences keep their
/// input order, so the earlier candidate wins a tie.
pub fn non_max_suppression(
    candidates: Vec<DetectionCandidate>,
    conf_thres: f64,
    iou_thres: f64,
    max_detections: usize,
) -> Vec<DetectionCandidate> {
    let mut dets: Vec<DetectionCandidate> = candidates
        .into_iter()
        .filter(|c| c.confidence > conf_thres)
        .collect();
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<DetectionCandidate> = Vec::new();
    for det in dets {
        if keep.len() >= max_detections {
            break;
        }
        let suppressed = keep.iter().any(|k| box_iou(&k.bbox, &det.bbox) > iou_thres);
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}
