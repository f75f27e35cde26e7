use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use emotion_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use emotion_core::emotion::infrastructure::onnx_emotion_classifier::OnnxEmotionClassifier;
use emotion_core::service::inference_context::InferenceContext;
use emotion_core::shared::constants::{DETECTOR_MODEL_NAME, EMOTION_MODEL_NAME};
use emotion_core::shared::execution_device::{open_with_cpu_fallback, ExecutionDevice};
use emotion_core::shared::model_resolver::{self, ProgressFn};

use crate::config::Config;

/// Resolves both model files, opens their sessions and wraps them in an
/// `InferenceContext`. Blocking; may download.
pub fn load_context(config: &Config) -> Result<InferenceContext, Box<dyn std::error::Error>> {
    let device = config.device.resolve();
    let bundled = config.models_dir.as_deref();

    let detector_path = model_path(
        config.detector_model.as_deref(),
        DETECTOR_MODEL_NAME,
        config.detector_model_url.as_deref(),
        bundled,
    )?;
    let emotion_path = model_path(
        config.emotion_model.as_deref(),
        EMOTION_MODEL_NAME,
        config.emotion_model_url.as_deref(),
        bundled,
    )?;

    log::info!("Loading face detector from {}", detector_path.display());
    let (detector, detector_device) =
        open_with_cpu_fallback(device, |d| OnnxYoloDetector::new(&detector_path, d))?;
    if let Some(size) = detector.input_size() {
        if size != config.input_size {
            return Err(format!(
                "Detector model expects {size}x{size} input but --input-size is {}",
                config.input_size
            )
            .into());
        }
    }

    log::info!("Loading emotion classifier from {}", emotion_path.display());
    let (classifier, classifier_device) = open_with_cpu_fallback(detector_device, |d| {
        OnnxEmotionClassifier::new(&emotion_path, d)
    })?;

    Ok(InferenceContext::new(
        Box::new(detector),
        Box::new(classifier),
        reported_device(detector_device, classifier_device),
        config.input_size,
    ))
}

/// Device name for `/health`; both names when the sessions ended up apart.
fn reported_device(detector: ExecutionDevice, classifier: ExecutionDevice) -> String {
    if detector == classifier {
        detector.to_string()
    } else {
        format!("{detector}/{classifier}")
    }
}

fn model_path(
    explicit: Option<&Path>,
    name: &str,
    url: Option<&str>,
    bundled_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    log::info!("Resolving model: {name}");
    Ok(model_resolver::resolve(
        name,
        url,
        bundled_dir,
        Some(download_progress(name.to_string())),
    )?)
}

/// Logs download progress in 10% steps.
fn download_progress(name: String) -> ProgressFn {
    let last_step = AtomicU64::new(u64::MAX);
    Box::new(move |downloaded, total| {
        if total == 0 {
            return;
        }
        let step = downloaded * 10 / total;
        if last_step.swap(step, Ordering::Relaxed) != step {
            log::info!("Downloading {name}... {}%", step * 10);
        }
    })
}
