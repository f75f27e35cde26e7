use crate::detection::domain::face_detector::FaceDetector;
use crate::emotion::domain::emotion_classifier::EmotionClassifier;
use crate::imaging::letterbox::ImagePreprocessor;
use crate::pipeline::detect_emotions_use_case::DetectEmotionsUseCase;
use crate::pipeline::inference_dispatcher::InferenceDispatcher;

/// Everything built once at startup and shared by all requests.
pub struct InferenceContext {
    dispatcher: InferenceDispatcher,
    preprocessor: ImagePreprocessor,
    device: String,
}

impl InferenceContext {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        classifier: Box<dyn EmotionClassifier>,
        device: impl Into<String>,
        input_size: u32,
    ) -> Self {
        Self {
            dispatcher: InferenceDispatcher::spawn(detector, classifier),
            preprocessor: ImagePreprocessor::new(input_size),
            device: device.into(),
        }
    }

    /// Identifier of the compute device the models run on.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn input_size(&self) -> u32 {
        self.preprocessor.target_size()
    }

    pub fn use_case(&self) -> DetectEmotionsUseCase<'_> {
        DetectEmotionsUseCase::new(&self.preprocessor, &self.dispatcher)
    }
}
