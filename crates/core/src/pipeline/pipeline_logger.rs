use std::time::Instant;

/// Cross-cutting logger for per-request pipeline events.
///
/// Use cases report stage timings and counts through this trait so the
/// request layer decides whether they reach the log.
pub trait PipelineLogger: Send {
    /// Record how long a named pipeline stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. face count).
    fn metric(&mut self, name: &str, value: f64);

    /// Emit an end-of-request summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

/// Collects stage timings for one image and writes a single debug line
/// when the image is done.
pub struct LogPipelineLogger {
    label: String,
    timings: Vec<(String, f64)>,
    metrics: Vec<(String, f64)>,
    start_time: Instant,
}

impl LogPipelineLogger {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            timings: Vec::new(),
            metrics: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }
        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;

        let mut parts: Vec<String> = self
            .timings
            .iter()
            .map(|(stage, ms)| format!("{stage} {ms:.1}ms"))
            .collect();
        parts.extend(
            self.metrics
                .iter()
                .map(|(name, value)| format!("{name}={value}")),
        );

        Some(format!(
            "{} ({elapsed_ms:.1}ms): {}",
            self.label,
            parts.join(", ")
        ))
    }

    pub fn timing_for(&self, stage: &str) -> Option<f64> {
        self.timings
            .iter()
            .find(|(name, _)| name == stage)
            .map(|(_, ms)| *ms)
    }

    pub fn metric_for(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings.push((stage.to_string(), duration_ms));
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::debug!("{text}");
        }
    }
}

/// Milliseconds elapsed since `start`.
pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
