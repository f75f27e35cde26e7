pub const DETECTOR_MODEL_NAME: &str = "yolov7-tiny-face.onnx";
pub const EMOTION_MODEL_NAME: &str = "repvgg-emotion.onnx";

/// Letterbox target size S used when the caller does not configure one.
pub const DEFAULT_INPUT_SIZE: u32 = 512;

/// Largest stride of the detector's feature pyramid; S must be a multiple.
pub const DETECTOR_STRIDE: u32 = 32;

/// Neutral gray used for letterbox borders (YOLO convention).
pub const LETTERBOX_PAD_VALUE: u8 = 114;

pub const DEFAULT_CONF_THRES: f64 = 0.5;
pub const DEFAULT_IOU_THRES: f64 = 0.45;

/// Upper bound on faces kept per image after NMS.
pub const MAX_DETECTIONS: usize = 300;

/// Emotion classes in model output order.
pub const EMOTION_LABELS: [&str; 8] = [
    "anger", "contempt", "disgust", "fear", "happy", "neutral", "sad", "surprise",
];

/// Label and class id reported for a crop the classifier could not handle.
pub const UNKNOWN_EMOTION_LABEL: &str = "unknown";
pub const UNKNOWN_EMOTION_CLASS_ID: u32 = EMOTION_LABELS.len() as u32;
