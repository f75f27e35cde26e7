use std::time::Instant;

use crate::detection::domain::detection_post_processor::post_process;
use crate::emotion::domain::emotion_classifier::EmotionResult;
use crate::imaging::face_crop_extractor::{extract_face_crops, FaceCrops};
use crate::imaging::letterbox::ImagePreprocessor;
use crate::pipeline::inference_dispatcher::InferenceDispatcher;
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_logger::{elapsed_ms, PipelineLogger};
use crate::pipeline::result_aggregator::{aggregate, DetectionRecord};
use crate::shared::pixel_array::PixelArray;
use crate::shared::request_parameters::RequestParameters;

/// Per-image pipeline: letterbox → detect → map back → crop → classify → zip.
///
/// Only the detect and classify steps cross into the dispatcher; everything
/// else runs on the calling thread.
pub struct DetectEmotionsUseCase<'a> {
    preprocessor: &'a ImagePreprocessor,
    dispatcher: &'a InferenceDispatcher,
}

impl<'a> DetectEmotionsUseCase<'a> {
    pub fn new(preprocessor: &'a ImagePreprocessor, dispatcher: &'a InferenceDispatcher) -> Self {
        Self {
            preprocessor,
            dispatcher,
        }
    }

    pub fn execute(
        &self,
        image: &PixelArray,
        params: &RequestParameters,
        logger: &mut dyn PipelineLogger,
    ) -> Result<Vec<DetectionRecord>, PipelineError> {
        let t = Instant::now();
        let letterboxed = self.preprocessor.letterbox(image);
        let tensor = letterboxed.to_tensor();
        logger.timing("preprocess", elapsed_ms(t));

        let t = Instant::now();
        let candidates = self
            .dispatcher
            .detect(tensor, params.thresholds())
            .map_err(PipelineError::inference)?;
        logger.timing("detect", elapsed_ms(t));

        let t = Instant::now();
        let detections = post_process(
            &candidates,
            &letterboxed.transform,
            image.width(),
            image.height(),
        );
        logger.timing("postprocess", elapsed_ms(t));

        let t = Instant::now();
        let crops = extract_face_crops(image, detections);
        logger.timing("crop", elapsed_ms(t));
        logger.metric("faces", crops.len() as f64);

        if crops.is_empty() {
            return Ok(Vec::new());
        }

        let t = Instant::now();
        let emotions = self.classify(&crops, params.show_conf())?;
        logger.timing("classify", elapsed_ms(t));

        aggregate(crops.detections, emotions)
    }

    /// Classifies all crops in one call, falling back to one call per crop
    /// when the batch fails. Crops that still fail get the unknown sentinel;
    /// the image fails only when no crop could be classified.
    fn classify(
        &self,
        crops: &FaceCrops,
        show_conf: bool,
    ) -> Result<Vec<EmotionResult>, PipelineError> {
        let batch_error = match self.dispatcher.classify(crops.images.clone(), show_conf) {
            Ok(results) => return Ok(results),
            Err(e) => e,
        };
        if crops.len() == 1 {
            return Err(PipelineError::inference(batch_error));
        }
        log::warn!(
            "Batch emotion classification of {} crops failed ({batch_error}); retrying per crop",
            crops.len()
        );

        let mut classified = 0usize;
        let results: Vec<EmotionResult> = crops
            .images
            .iter()
            .enumerate()
            .map(|(i, crop)| match self.dispatcher.classify(vec![crop.clone()], show_conf) {
                Ok(mut single) if single.len() == 1 => {
                    classified += 1;
                    single.remove(0)
                }
                Ok(other) => {
                    log::warn!("Crop {i}: classifier returned {} results", other.len());
                    EmotionResult::unknown()
                }
                Err(e) => {
                    log::warn!("Crop {i}: classification failed: {e}");
                    EmotionResult::unknown()
                }
            })
            .collect();

        if classified == 0 {
            return Err(PipelineError::inference(batch_error));
        }
        let unknown = results.iter().filter(|r| r.is_unknown()).count();
        if unknown > 0 {
            log::warn!("{unknown} of {} crops left unclassified", results.len());
        }
        Ok(results)
    }
}
