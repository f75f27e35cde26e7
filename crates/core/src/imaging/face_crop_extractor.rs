use crate::detection::domain::detection::Detection;
use crate::shared::pixel_array::PixelArray;

/// Detections paired index-for-index with the pixels they cover.
#[derive(Clone, Debug, Default)]
pub struct FaceCrops {
    pub detections: Vec<Detection>,
    pub images: Vec<PixelArray>,
}

impl FaceCrops {
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Slices `image` by each detection box.
///
/// A box that cannot be sliced (no area, or outside the image) is skipped
/// together with its detection so both sequences stay aligned.
pub fn extract_face_crops(image: &PixelArray, detections: Vec<Detection>) -> FaceCrops {
    let mut crops = FaceCrops {
        detections: Vec::with_capacity(detections.len()),
        images: Vec::with_capacity(detections.len()),
    };
    for det in detections {
        match image.crop(&det.bbox) {
            Some(pixels) => {
                crops.detections.push(det);
                crops.images.push(pixels);
            }
            None => log::warn!("Skipping unsliceable face box {:?}", det.bbox),
        }
    }
    crops
}
