use crate::pipeline::pipeline_error::BoxError;
use crate::shared::constants::{EMOTION_LABELS, UNKNOWN_EMOTION_CLASS_ID, UNKNOWN_EMOTION_LABEL};
use crate::shared::pixel_array::PixelArray;

/// Emotion predicted for one face crop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmotionResult {
    /// Display label, optionally carrying the class probability, e.g. `"happy (82.0%)"`.
    pub label: String,
    pub class_id: u32,
}

impl EmotionResult {
    /// Builds the result for `class_id`, appending the probability when `show_conf` is set.
    pub fn from_prediction(class_id: usize, probability: f32, show_conf: bool) -> Self {
        let Some(name) = EMOTION_LABELS.get(class_id) else {
            return Self::unknown();
        };
        let label = if show_conf {
            format!("{name} ({:.1}%)", probability * 100.0)
        } else {
            (*name).to_string()
        };
        Self {
            label,
            class_id: class_id as u32,
        }
    }

    /// Placeholder for a crop the classifier could not process.
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_EMOTION_LABEL.to_string(),
            class_id: UNKNOWN_EMOTION_CLASS_ID,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.class_id == UNKNOWN_EMOTION_CLASS_ID
    }
}

/// Emotion classification capability.
///
/// Must return exactly one result per crop, in crop order.
pub trait EmotionClassifier: Send {
    fn classify(
        &mut self,
        crops: &[PixelArray],
        show_conf: bool,
    ) -> Result<Vec<EmotionResult>, BoxError>;
}
