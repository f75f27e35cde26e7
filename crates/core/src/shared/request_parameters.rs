use crate::detection::domain::face_detector::DetectionThresholds;
use crate::pipeline::pipeline_error::PipelineError;
use crate::shared::constants::{DEFAULT_CONF_THRES, DEFAULT_IOU_THRES};

/// Per-request tuning knobs, validated at the boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RequestParameters {
    conf_thres: f64,
    iou_thres: f64,
    show_conf: bool,
}

impl Default for RequestParameters {
    fn default() -> Self {
        Self {
            conf_thres: DEFAULT_CONF_THRES,
            iou_thres: DEFAULT_IOU_THRES,
            show_conf: true,
        }
    }
}

impl RequestParameters {
    /// Applies defaults for missing values and rejects thresholds outside `[0, 1]`.
    pub fn new(
        conf_thres: Option<f64>,
        iou_thres: Option<f64>,
        show_conf: Option<bool>,
    ) -> Result<Self, PipelineError> {
        let defaults = Self::default();
        Ok(Self {
            conf_thres: check_threshold("conf_thres", conf_thres.unwrap_or(defaults.conf_thres))?,
            iou_thres: check_threshold("iou_thres", iou_thres.unwrap_or(defaults.iou_thres))?,
            show_conf: show_conf.unwrap_or(defaults.show_conf),
        })
    }

    /// Parses raw text fields as they arrive from a form or loosely typed JSON.
    pub fn from_fields(
        conf_thres: Option<&str>,
        iou_thres: Option<&str>,
        show_conf: Option<&str>,
    ) -> Result<Self, PipelineError> {
        Self::new(
            conf_thres.map(|v| parse_threshold("conf_thres", v)).transpose()?,
            iou_thres.map(|v| parse_threshold("iou_thres", v)).transpose()?,
            show_conf.map(parse_flag).transpose()?,
        )
    }

    pub fn conf_thres(&self) -> f64 {
        self.conf_thres
    }

    pub fn iou_thres(&self) -> f64 {
        self.iou_thres
    }

    pub fn show_conf(&self) -> bool {
        self.show_conf
    }

    pub fn thresholds(&self) -> DetectionThresholds {
        DetectionThresholds {
            conf_thres: self.conf_thres,
            iou_thres: self.iou_thres,
        }
    }
}

fn check_threshold(name: &str, value: f64) -> Result<f64, PipelineError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(PipelineError::Validation(format!(
            "{name} must be between 0 and 1, got {value}"
        )))
    }
}

fn parse_threshold(name: &str, raw: &str) -> Result<f64, PipelineError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| PipelineError::Validation(format!("{name} must be a number, got {raw:?}")))
}

fn parse_flag(raw: &str) -> Result<bool, PipelineError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(PipelineError::Validation(format!(
            "show_conf must be true or false, got {raw:?}"
        ))),
    }
}
