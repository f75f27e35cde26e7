use base64::Engine;

use crate::pipeline::pipeline_error::PipelineError;
use crate::shared::pixel_array::PixelArray;

/// Encoded image bytes as received from a caller.
#[derive(Clone, Debug)]
pub struct RawImage {
    bytes: Vec<u8>,
}

impl RawImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Accepts plain base64 or a `data:<mime>;base64,` URL. Whitespace is ignored.
    pub fn from_base64(encoded: &str) -> Result<Self, PipelineError> {
        let payload = match encoded.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => encoded,
        };
        let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = base64::prelude::BASE64_STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| PipelineError::decode(format!("invalid base64: {e}")))?;
        Ok(Self { bytes })
    }

    #[cfg(test)]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Format sniffed from the leading magic bytes, if recognized.
    pub fn format(&self) -> Option<image::ImageFormat> {
        image::guess_format(&self.bytes).ok()
    }

    /// Decodes to RGB regardless of the source layout (gray, RGBA, 16-bit, ...).
    pub fn decode(&self) -> Result<PixelArray, PipelineError> {
        if self.bytes.is_empty() {
            return Err(PipelineError::decode("empty image data"));
        }
        let format = self
            .format()
            .ok_or_else(|| PipelineError::decode("unrecognized image format"))?;
        let decoded = image::load_from_memory_with_format(&self.bytes, format)
            .map_err(PipelineError::decode)?;
        let pixels = PixelArray::from_rgb_image(decoded.to_rgb8());
        if pixels.is_empty() {
            return Err(PipelineError::decode("image has zero width or height"));
        }
        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(img: image::DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn png_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
        encode(image::DynamicImage::ImageRgb8(img), image::ImageFormat::Png)
    }

    #[test]
    fn test_decode_png_keeps_rgb_order() {
        let raw = RawImage::from_bytes(png_rgb(4, 3, [200, 100, 50]));
        let pixels = raw.decode().unwrap();

        assert_eq!(pixels.width(), 4);
        assert_eq!(pixels.height(), 3);
        assert_eq!(&pixels.data()[..3], &[200, 100, 50]);
        assert_eq!(raw.format(), Some(image::ImageFormat::Png));
    }

    #[test]
    fn test_decode_rgba_drops_alpha() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 128]));
        let bytes = encode(image::DynamicImage::ImageRgba8(img), image::ImageFormat::Png);
        let pixels = RawImage::from_bytes(bytes).decode().unwrap();

        assert_eq!(pixels.data().len(), 12);
        assert_eq!(&pixels.data()[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_decode_grayscale_expands_to_three_channels() {
        let img = image::GrayImage::from_pixel(2, 1, image::Luma([77]));
        let bytes = encode(image::DynamicImage::ImageLuma8(img), image::ImageFormat::Png);
        let pixels = RawImage::from_bytes(bytes).decode().unwrap();

        assert_eq!(pixels.data(), &[77, 77, 77, 77, 77, 77]);
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let result = RawImage::from_bytes(b"definitely not an image".to_vec()).decode();
        assert!(matches!(result, Err(PipelineError::Decode(ref m)) if m.contains("unrecognized image format")));
    }

    #[test]
    fn test_decode_truncated_png_is_decode_error() {
        let mut png = png_rgb(8, 8, [1, 2, 3]);
        png.truncate(png.len() / 2);
        let raw = RawImage::from_bytes(png);

        assert_eq!(raw.format(), Some(image::ImageFormat::Png));
        assert!(matches!(raw.decode(), Err(PipelineError::Decode(_))));
    }

    #[test]
    fn test_decode_empty_is_decode_error() {
        let result = RawImage::from_bytes(Vec::new()).decode();
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }

    #[test]
    fn test_from_base64_plain_and_data_url() {
        let png = png_rgb(1, 1, [9, 9, 9]);
        let encoded = base64::prelude::BASE64_STANDARD.encode(&png);

        let plain = RawImage::from_base64(&encoded).unwrap();
        let data_url = RawImage::from_base64(&format!("data:image/png;base64,{encoded}")).unwrap();

        assert_eq!(plain.bytes(), &png[..]);
        assert_eq!(data_url.bytes(), &png[..]);
    }

    #[test]
    fn test_from_base64_ignores_line_breaks() {
        let png = png_rgb(1, 1, [9, 9, 9]);
        let encoded = base64::prelude::BASE64_STANDARD.encode(&png);
        let (a, b) = encoded.split_at(encoded.len() / 2);

        let raw = RawImage::from_base64(&format!("{a}\n{b}")).unwrap();

        assert_eq!(raw.bytes(), &png[..]);
    }

    #[test]
    fn test_from_base64_rejects_invalid_alphabet() {
        let result = RawImage::from_base64("@@@not-base64@@@");
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }
}
