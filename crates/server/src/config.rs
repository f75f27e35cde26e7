use std::path::PathBuf;

use clap::Parser;

use emotion_core::shared::constants::{DEFAULT_INPUT_SIZE, DETECTOR_STRIDE};
use emotion_core::shared::execution_device::DevicePreference;

/// Face detection and emotion classification over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "emotion-server", version)]
pub struct Config {
    /// Address to bind.
    #[arg(long, env = "EMOTION_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "EMOTION_PORT", default_value = "5139")]
    pub port: u16,

    /// Face detector ONNX file. Resolved from the model cache when omitted.
    #[arg(long, env = "EMOTION_DETECTOR_MODEL")]
    pub detector_model: Option<PathBuf>,

    /// Emotion classifier ONNX file. Resolved from the model cache when omitted.
    #[arg(long, env = "EMOTION_EMOTION_MODEL")]
    pub emotion_model: Option<PathBuf>,

    /// Directory with bundled model files, checked after the cache.
    #[arg(long, env = "EMOTION_MODELS_DIR")]
    pub models_dir: Option<PathBuf>,

    /// Download URL for the detector model when it is not found locally.
    #[arg(long, env = "EMOTION_DETECTOR_MODEL_URL")]
    pub detector_model_url: Option<String>,

    /// Download URL for the emotion model when it is not found locally.
    #[arg(long, env = "EMOTION_EMOTION_MODEL_URL")]
    pub emotion_model_url: Option<String>,

    /// Letterbox size fed to the detector (multiple of 32).
    #[arg(long, env = "EMOTION_INPUT_SIZE", default_value_t = DEFAULT_INPUT_SIZE)]
    pub input_size: u32,

    /// Compute device: auto or cpu.
    #[arg(long, env = "EMOTION_DEVICE", default_value = "auto")]
    pub device: DevicePreference,

    /// Maximum request body size in megabytes.
    #[arg(long, env = "EMOTION_MAX_BODY_MB", default_value = "32")]
    pub max_body_mb: usize,
}

impl Config {
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.input_size == 0 || self.input_size % DETECTOR_STRIDE != 0 {
            return Err(format!(
                "Input size must be a positive multiple of {DETECTOR_STRIDE}, got {}",
                self.input_size
            )
            .into());
        }
        if self.max_body_mb == 0 {
            return Err("Max body size must be at least 1 MB".into());
        }
        for path in [&self.detector_model, &self.emotion_model].into_iter().flatten() {
            if !path.exists() {
                return Err(format!("Model file not found: {}", path.display()).into());
            }
        }
        if let Some(dir) = &self.models_dir {
            if !dir.is_dir() {
                return Err(format!("Models directory not found: {}", dir.display()).into());
            }
        }
        Ok(())
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.max_body_mb.saturating_mul(1024 * 1024)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
