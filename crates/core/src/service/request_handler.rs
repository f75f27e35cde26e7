use std::time::Instant;

use serde::Serialize;

use crate::imaging::raw_image::RawImage;
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_logger::{elapsed_ms, LogPipelineLogger, PipelineLogger};
use crate::pipeline::result_aggregator::DetectionRecord;
use crate::service::inference_context::InferenceContext;
use crate::shared::request_parameters::RequestParameters;

/// Where a single-image request's bytes came from.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageSource {
    Upload(Vec<u8>),
    Base64(String),
}

impl ImageSource {
    /// Picks the one image source out of the two optional request fields.
    pub fn select(upload: Option<Vec<u8>>, base64: Option<String>) -> Result<Self, PipelineError> {
        match (upload, base64) {
            (Some(bytes), None) => Ok(Self::Upload(bytes)),
            (None, Some(encoded)) => Ok(Self::Base64(encoded)),
            (None, None) => Err(PipelineError::MissingInput),
            (Some(_), Some(_)) => Err(PipelineError::Validation(
                "provide either an image upload or image_base64, not both".into(),
            )),
        }
    }

    fn into_raw(self) -> Result<RawImage, PipelineError> {
        match self {
            Self::Upload(bytes) => Ok(RawImage::from_bytes(bytes)),
            Self::Base64(encoded) => RawImage::from_base64(&encoded),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectResponse {
    pub success: bool,
    pub detections: Vec<DetectionRecord>,
    /// Seconds spent in the pipeline, decode excluded.
    pub processing_time: f64,
    pub num_faces: usize,
}

/// Outcome for one image of a batch; `error` is set only on failure.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchItemResult {
    pub image_index: usize,
    pub detections: Vec<DetectionRecord>,
    pub num_faces: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemResult {
    fn success(image_index: usize, detections: Vec<DetectionRecord>) -> Self {
        Self {
            image_index,
            num_faces: detections.len(),
            detections,
            error: None,
        }
    }

    fn failure(image_index: usize, error: String) -> Self {
        Self {
            image_index,
            detections: Vec::new(),
            num_faces: 0,
            error: Some(error),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub results: Vec<BatchItemResult>,
    /// Seconds for the whole batch, decode included.
    pub processing_time: f64,
    pub total_images: usize,
}

/// Transport-agnostic entry points for single-image and batch detection.
pub struct RequestHandler<'a> {
    context: &'a InferenceContext,
}

impl<'a> RequestHandler<'a> {
    pub fn new(context: &'a InferenceContext) -> Self {
        Self { context }
    }

    pub fn detect(
        &self,
        source: ImageSource,
        params: &RequestParameters,
    ) -> Result<DetectResponse, PipelineError> {
        let mut logger = LogPipelineLogger::new("detect");

        let t = Instant::now();
        let image = source.into_raw()?.decode()?;
        logger.timing("decode", elapsed_ms(t));

        let start = Instant::now();
        let detections = self.context.use_case().execute(&image, params, &mut logger)?;
        let processing_time = start.elapsed().as_secs_f64();
        logger.summary();

        log::info!(
            "Detected {} face(s) in {}x{} image in {:.3}s",
            detections.len(),
            image.width(),
            image.height(),
            processing_time
        );
        Ok(DetectResponse {
            success: true,
            num_faces: detections.len(),
            detections,
            processing_time,
        })
    }

    /// Runs every image independently; a failing image yields an error
    /// entry at its index and never affects the others.
    pub fn detect_batch(&self, images: &[String], params: &RequestParameters) -> BatchResponse {
        let start = Instant::now();
        let results: Vec<BatchItemResult> = images
            .iter()
            .enumerate()
            .map(|(index, encoded)| match self.detect_encoded(index, encoded, params) {
                Ok(detections) => BatchItemResult::success(index, detections),
                Err(e) => {
                    log::warn!("Batch image {index} failed: {e}");
                    BatchItemResult::failure(index, e.public_message())
                }
            })
            .collect();
        let processing_time = start.elapsed().as_secs_f64();

        let failed = results.iter().filter(|r| r.error.is_some()).count();
        log::info!(
            "Processed batch of {} image(s) ({failed} failed) in {processing_time:.3}s",
            images.len()
        );
        BatchResponse {
            success: true,
            total_images: results.len(),
            results,
            processing_time,
        }
    }

    fn detect_encoded(
        &self,
        index: usize,
        encoded: &str,
        params: &RequestParameters,
    ) -> Result<Vec<DetectionRecord>, PipelineError> {
        let mut logger = LogPipelineLogger::new(format!("batch image {index}"));

        let t = Instant::now();
        let image = RawImage::from_base64(encoded)?.decode()?;
        logger.timing("decode", elapsed_ms(t));

        let detections = self.context.use_case().execute(&image, params, &mut logger)?;
        logger.summary();
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::DetectionCandidate;
    use crate::pipeline::detect_emotions_use_case::test_support::*;
    use base64::prelude::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 180, 160]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn png_base64(width: u32, height: u32) -> String {
        BASE64_STANDARD.encode(png_bytes(width, height))
    }

    // Face regions of a 640x480 image at S=512 (r = 0.8, pad_top = 64).
    fn context() -> InferenceContext {
        let candidates = vec![
            DetectionCandidate::new([80.0, 144.0, 160.0, 224.0], 0.92),
            DetectionCandidate::new([320.0, 184.0, 416.0, 296.0], 0.81),
            // Overlaps the first face heavily; removed by NMS.
            DetectionCandidate::new([82.0, 146.0, 162.0, 226.0], 0.60),
        ];
        InferenceContext::new(
            Box::new(ScriptedDetector { candidates }),
            Box::new(WidthClassifier),
            "cpu",
            512,
        )
    }

    #[test]
    fn test_two_face_scenario() {
        let ctx = context();
        let params = RequestParameters::new(Some(0.5), Some(0.45), None).unwrap();

        let response = RequestHandler::new(&ctx)
            .detect(ImageSource::Upload(png_bytes(640, 480)), &params)
            .unwrap();

        assert!(response.success);
        assert_eq!(response.num_faces, 2);
        assert_eq!(response.detections.len(), 2);
        for record in &response.detections {
            let b = record.bbox;
            assert!(b.x1 < b.x2 && b.x2 <= 640);
            assert!(b.y1 < b.y2 && b.y2 <= 480);
            assert!(!record.emotion.is_empty());
        }
        assert!(response.processing_time >= 0.0);
    }

    #[test]
    fn test_base64_source_matches_upload() {
        let ctx = context();
        let handler = RequestHandler::new(&ctx);
        let params = RequestParameters::default();

        let upload = handler
            .detect(ImageSource::Upload(png_bytes(640, 480)), &params)
            .unwrap();
        let encoded = handler
            .detect(ImageSource::Base64(png_base64(640, 480)), &params)
            .unwrap();

        assert_eq!(upload.detections, encoded.detections);
    }

    #[test]
    fn test_repeated_requests_are_identical() {
        let ctx = context();
        let handler = RequestHandler::new(&ctx);
        let params = RequestParameters::default();

        let first = handler
            .detect(ImageSource::Upload(png_bytes(640, 480)), &params)
            .unwrap();
        let second = handler
            .detect(ImageSource::Upload(png_bytes(640, 480)), &params)
            .unwrap();

        assert_eq!(
            serde_json::to_string(&first.detections).unwrap(),
            serde_json::to_string(&second.detections).unwrap()
        );
    }

    #[test]
    fn test_high_threshold_gives_no_faces() {
        let ctx = context();
        let params = RequestParameters::new(Some(0.99), None, None).unwrap();

        let response = RequestHandler::new(&ctx)
            .detect(ImageSource::Upload(png_bytes(640, 480)), &params)
            .unwrap();

        assert_eq!(response.num_faces, 0);
        assert!(response.detections.is_empty());
    }

    #[test]
    fn test_corrupt_upload_is_decode_error() {
        let ctx = context();
        let err = RequestHandler::new(&ctx)
            .detect(
                ImageSource::Upload(b"definitely not an image".to_vec()),
                &RequestParameters::default(),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn test_select_source() {
        assert_eq!(
            ImageSource::select(Some(vec![1]), None).unwrap(),
            ImageSource::Upload(vec![1])
        );
        assert_eq!(
            ImageSource::select(None, Some("abc".into())).unwrap(),
            ImageSource::Base64("abc".into())
        );
        assert!(matches!(
            ImageSource::select(None, None),
            Err(PipelineError::MissingInput)
        ));
        assert!(matches!(
            ImageSource::select(Some(vec![1]), Some("abc".into())),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_batch_isolates_bad_image() {
        let ctx = context();
        let handler = RequestHandler::new(&ctx);
        let params = RequestParameters::default();
        let images = vec![
            png_base64(640, 480),
            BASE64_STANDARD.encode(b"not an image"),
            png_base64(640, 480),
        ];

        let response = handler.detect_batch(&images, &params);

        assert!(response.success);
        assert_eq!(response.total_images, 3);
        assert_eq!(response.results.len(), 3);
        for (i, result) in response.results.iter().enumerate() {
            assert_eq!(result.image_index, i);
        }
        assert!(response.results[1].error.is_some());
        assert!(response.results[1].detections.is_empty());
        assert_eq!(response.results[1].num_faces, 0);

        let single = handler
            .detect(ImageSource::Base64(images[0].clone()), &params)
            .unwrap();
        for i in [0, 2] {
            assert!(response.results[i].error.is_none());
            assert_eq!(response.results[i].num_faces, 2);
            assert_eq!(response.results[i].detections, single.detections);
        }
    }

    #[test]
    fn test_batch_invalid_base64_is_item_error() {
        let ctx = context();
        let response = RequestHandler::new(&ctx)
            .detect_batch(&["%%%".to_string()], &RequestParameters::default());

        let error = response.results[0].error.as_deref().unwrap();
        assert!(error.starts_with("failed to decode image"));
    }

    #[test]
    fn test_empty_batch() {
        let ctx = context();
        let response = RequestHandler::new(&ctx).detect_batch(&[], &RequestParameters::default());
        assert!(response.success);
        assert_eq!(response.total_images, 0);
        assert!(response.results.is_empty());
    }

    #[test]
    fn test_batch_item_serialization_omits_absent_error() {
        let ok = serde_json::to_value(BatchItemResult::success(0, Vec::new())).unwrap();
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(BatchItemResult::failure(1, "boom".into())).unwrap();
        assert_eq!(failed["error"], "boom");
        assert_eq!(failed["detections"], serde_json::json!([]));
        assert_eq!(failed["num_faces"], 0);
    }
}
