use ndarray::{ArrayView3, ArrayViewMut3};

use crate::shared::bounding_box::BoundingBox;

/// Decoded image pixels: contiguous RGB bytes in row-major order.
///
/// Every pipeline stage works in RGB; whatever channel layout the caller
/// supplied is normalized at decode time.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelArray {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

pub const CHANNELS: usize = 3;

impl PixelArray {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
        }
    }

    /// A `width` x `height` image filled with a single RGB value.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::new(data, width, height)
    }

    pub fn from_rgb_image(image: image::RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    pub fn to_rgb_image(&self) -> image::RgbImage {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| image::RgbImage::new(self.width, self.height))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("PixelArray data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        let shape = self.shape();
        ArrayViewMut3::from_shape(shape, &mut self.data)
            .expect("PixelArray data length must match dimensions")
    }

    /// Copies the pixels inside `bbox`, or `None` when the box has no area
    /// or does not fit inside the image.
    pub fn crop(&self, bbox: &BoundingBox) -> Option<PixelArray> {
        if bbox.is_empty() || bbox.x2 > self.width || bbox.y2 > self.height {
            return None;
        }
        let row_len = self.width as usize * CHANNELS;
        let x_start = bbox.x1 as usize * CHANNELS;
        let x_end = bbox.x2 as usize * CHANNELS;

        let mut data = Vec::with_capacity(bbox.area() as usize * CHANNELS);
        for row in bbox.y1 as usize..bbox.y2 as usize {
            let offset = row * row_len;
            data.extend_from_slice(&self.data[offset + x_start..offset + x_end]);
        }
        Some(PixelArray::new(data, bbox.width(), bbox.height()))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, CHANNELS)
    }
}
