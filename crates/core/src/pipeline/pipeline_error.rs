use thiserror::Error;

/// Error type returned by capability objects (detector, classifier).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure kinds of the detection/classification pipeline.
///
/// The HTTP layer maps these onto status codes; nothing below it knows about
/// transport concerns.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No image provided")]
    MissingInput,
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("inference failed: {0}")]
    Inference(String),
    /// A broken internal contract, never caused by caller input.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl PipelineError {
    pub fn inference(source: impl std::fmt::Display) -> Self {
        Self::Inference(source.to_string())
    }

    pub fn decode(source: impl std::fmt::Display) -> Self {
        Self::Decode(source.to_string())
    }

    /// True for errors caused by the request itself rather than by processing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingInput | Self::Validation(_))
    }

    /// Message safe to return to a caller. Invariant details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Invariant(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}
