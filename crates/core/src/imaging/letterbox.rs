use ndarray::Array4;

use crate::imaging::resize::{resize, Interpolation};
use crate::shared::constants::LETTERBOX_PAD_VALUE;
use crate::shared::pixel_array::{PixelArray, CHANNELS};

/// Inverse mapping from detector-tensor space back to the original image.
///
/// Created once per image by [`ImagePreprocessor::letterbox`] and never
/// modified afterwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreprocessTransform {
    scale_ratio: f64,
    pad_left: u32,
    pad_top: u32,
    target_size: u32,
}

impl PreprocessTransform {
    pub fn scale_ratio(&self) -> f64 {
        self.scale_ratio
    }

    pub fn pad_left(&self) -> u32 {
        self.pad_left
    }

    pub fn pad_top(&self) -> u32 {
        self.pad_top
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Original-image point -> tensor point.
    #[cfg(test)]
    pub fn to_tensor_space(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.scale_ratio + self.pad_left as f64,
            y * self.scale_ratio + self.pad_top as f64,
        )
    }

    /// Tensor point -> original-image point (unrounded, unclipped).
    pub fn to_original_space(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_left as f64) / self.scale_ratio,
            (y - self.pad_top as f64) / self.scale_ratio,
        )
    }
}

/// A square, padded image ready for the detector plus its inverse transform.
#[derive(Clone, Debug)]
pub struct LetterboxedImage {
    pub image: PixelArray,
    pub transform: PreprocessTransform,
}

impl LetterboxedImage {
    /// NCHW float32 tensor scaled to `[0, 1]`, shape `[1, 3, S, S]`.
    pub fn to_tensor(&self) -> Array4<f32> {
        let size = self.transform.target_size as usize;
        let src = self.image.as_ndarray();
        Array4::from_shape_fn((1, CHANNELS, size, size), |(_, c, y, x)| {
            src[[y, x, c]] as f32 / 255.0
        })
    }
}

/// Letterbox resize + pad to a fixed square size.
#[derive(Clone, Copy, Debug)]
pub struct ImagePreprocessor {
    target_size: u32,
}

impl ImagePreprocessor {
    pub fn new(target_size: u32) -> Self {
        Self { target_size }
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Scales the longer side to S, then pads both axes with neutral gray.
    ///
    /// Padding is split floor-before / ceil-after, so an odd remainder puts
    /// the extra pixel on the right/bottom.
    pub fn letterbox(&self, image: &PixelArray) -> LetterboxedImage {
        let size = self.target_size;
        let (w, h) = (image.width(), image.height());
        let r = size as f64 / w.max(h).max(1) as f64;

        let resized = if r != 1.0 {
            let new_w = ((w as f64 * r) as u32).clamp(1, size);
            let new_h = ((h as f64 * r) as u32).clamp(1, size);
            resize(image, new_w, new_h, Interpolation::for_scale(r))
        } else {
            image.clone()
        };

        let dw = size - resized.width();
        let dh = size - resized.height();
        let pad_left = dw / 2;
        let pad_top = dh / 2;

        let padded = pad(&resized, size, pad_left, pad_top);
        LetterboxedImage {
            image: padded,
            transform: PreprocessTransform {
                scale_ratio: r,
                pad_left,
                pad_top,
                target_size: size,
            },
        }
    }
}

fn pad(image: &PixelArray, size: u32, left: u32, top: u32) -> PixelArray {
    let mut out = PixelArray::filled(size, size, [LETTERBOX_PAD_VALUE; 3]);
    let src = image.as_ndarray();
    let mut dst = out.as_ndarray_mut();
    let (left, top) = (left as usize, top as usize);
    let (w, h) = (image.width() as usize, image.height() as usize);
    dst.slice_mut(ndarray::s![top..top + h, left..left + w, ..])
        .assign(&src);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    // landscape: r = 0.8, 512x384, dh = 128
    #[case::landscape(640, 480, 0.8, 0, 64)]
    // portrait with odd remainder: r = 512/300, new_w = int(200 * 1.7066) = 341, dw = 171
    #[case::portrait_enlarge(200, 300, 512.0 / 300.0, 85, 0)]
    #[case::square_identity(512, 512, 1.0, 0, 0)]
    fn test_letterbox_transform(
        #[case] w: u32,
        #[case] h: u32,
        #[case] ratio: f64,
        #[case] pad_left: u32,
        #[case] pad_top: u32,
    ) {
        let pre = ImagePreprocessor::new(512);
        let out = pre.letterbox(&PixelArray::filled(w, h, [10, 20, 30]));

        assert_eq!(out.image.width(), 512);
        assert_eq!(out.image.height(), 512);
        assert_relative_eq!(out.transform.scale_ratio(), ratio);
        assert_eq!(out.transform.pad_left(), pad_left);
        assert_eq!(out.transform.pad_top(), pad_top);
        assert_eq!(out.transform.target_size(), 512);
    }

    #[test]
    fn test_padding_is_gray_and_content_preserved() {
        let pre = ImagePreprocessor::new(64);
        // 64x32 -> r = 1, pad_top = 16
        let out = pre.letterbox(&PixelArray::filled(64, 32, [255, 0, 0]));
        let view = out.image.as_ndarray();

        assert_eq!(view[[0, 0, 0]], LETTERBOX_PAD_VALUE);
        assert_eq!(view[[63, 63, 2]], LETTERBOX_PAD_VALUE);
        assert_eq!(view[[16, 0, 0]], 255);
        assert_eq!(view[[47, 63, 1]], 0);
        assert_eq!(view[[48, 10, 0]], LETTERBOX_PAD_VALUE);
    }

    #[test]
    fn test_odd_padding_puts_extra_pixel_after() {
        // 64x33 at S=64: dh = 31 -> top 15, bottom 16
        let pre = ImagePreprocessor::new(64);
        let out = pre.letterbox(&PixelArray::filled(64, 33, [0, 0, 0]));
        let view = out.image.as_ndarray();

        assert_eq!(out.transform.pad_top(), 15);
        assert_eq!(view[[14, 0, 0]], LETTERBOX_PAD_VALUE);
        assert_eq!(view[[15, 0, 0]], 0);
        assert_eq!(view[[47, 0, 0]], 0);
        assert_eq!(view[[48, 0, 0]], LETTERBOX_PAD_VALUE);
    }

    #[test]
    fn test_inverse_transform_recovers_feature_location() {
        // White square at [100, 200) x [100, 200) in a 640x480 image.
        let mut img = PixelArray::filled(640, 480, [0, 0, 0]);
        for y in 100..200 {
            for x in 100..200 {
                for c in 0..3 {
                    img.as_ndarray_mut()[[y, x, c]] = 255;
                }
            }
        }
        let out = ImagePreprocessor::new(512).letterbox(&img);
        let view = out.image.as_ndarray();

        // Find the square's extent in tensor space.
        let white: Vec<(usize, usize)> = (0..512)
            .flat_map(|y| (0..512).map(move |x| (x, y)))
            .filter(|&(x, y)| view[[y, x, 0]] > 250)
            .collect();
        let min_x = white.iter().map(|p| p.0).min().unwrap() as f64;
        let min_y = white.iter().map(|p| p.1).min().unwrap() as f64;
        let max_x = white.iter().map(|p| p.0).max().unwrap() as f64 + 1.0;
        let max_y = white.iter().map(|p| p.1).max().unwrap() as f64 + 1.0;

        let (x1, y1) = out.transform.to_original_space(min_x, min_y);
        let (x2, y2) = out.transform.to_original_space(max_x, max_y);
        assert!((x1 - 100.0).abs() <= 1.0 / 0.8, "x1 = {x1}");
        assert!((y1 - 100.0).abs() <= 1.0 / 0.8, "y1 = {y1}");
        assert!((x2 - 200.0).abs() <= 1.0 / 0.8, "x2 = {x2}");
        assert!((y2 - 200.0).abs() <= 1.0 / 0.8, "y2 = {y2}");
    }

    #[rstest]
    #[case(640, 480, 512)]
    #[case(300, 1000, 512)]
    #[case(37, 23, 640)]
    fn test_transform_roundtrip_within_one_pixel(
        #[case] w: u32,
        #[case] h: u32,
        #[case] size: u32,
    ) {
        let out = ImagePreprocessor::new(size).letterbox(&PixelArray::filled(w, h, [0, 0, 0]));
        for &(px, py) in &[(0.0, 0.0), (w as f64 / 3.0, h as f64 / 2.0), (w as f64, h as f64)] {
            let (tx, ty) = out.transform.to_tensor_space(px, py);
            let (ox, oy) = out.transform.to_original_space(tx.round(), ty.round());
            assert!((ox - px).abs() <= 1.0, "x: {px} -> {ox}");
            assert!((oy - py).abs() <= 1.0, "y: {py} -> {oy}");
        }
    }

    #[test]
    fn test_to_tensor_shape_and_scale() {
        let out = ImagePreprocessor::new(32).letterbox(&PixelArray::filled(32, 16, [255, 0, 51]));
        let tensor = out.to_tensor();

        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
        // content rows start at pad_top = 8
        assert_relative_eq!(tensor[[0, 0, 8, 0]], 1.0);
        assert_relative_eq!(tensor[[0, 1, 8, 0]], 0.0);
        assert_relative_eq!(tensor[[0, 2, 8, 0]], 0.2);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 114.0 / 255.0);
    }
}
