use std::sync::{Arc, OnceLock};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use emotion_core::pipeline::pipeline_error::PipelineError;
use emotion_core::service::health_reporter::HealthReporter;
use emotion_core::service::inference_context::InferenceContext;
use emotion_core::service::request_handler::{
    BatchResponse, DetectResponse, ImageSource, RequestHandler,
};
use emotion_core::shared::request_parameters::RequestParameters;

/// Shared handler state. The context slot stays empty until background
/// model initialisation installs it.
#[derive(Clone, Default)]
pub struct AppState {
    health: Arc<HealthReporter>,
    context: Arc<OnceLock<Arc<InferenceContext>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, context: InferenceContext) {
        let device = context.device().to_string();
        if self.context.set(Arc::new(context)).is_err() {
            log::warn!("Inference context already installed; ignoring");
            return;
        }
        self.health.mark_ready(device);
    }

    pub fn fail(&self, error: impl Into<String>) {
        self.health.mark_failed(error);
    }

    /// Runs `load` on the blocking pool and records the outcome, a panic included.
    pub async fn initialize<F>(self, load: F)
    where
        F: FnOnce() -> Result<InferenceContext, String> + Send + 'static,
    {
        match tokio::task::spawn_blocking(load).await {
            Ok(Ok(context)) => {
                log::info!(
                    "Models ready on {} (input size {})",
                    context.device(),
                    context.input_size()
                );
                self.install(context);
            }
            Ok(Err(e)) => {
                log::error!("Model initialization failed: {e}");
                self.fail(e);
            }
            Err(e) => {
                log::error!("Model initialization did not complete: {e}");
                self.fail(format!("model initialization did not complete: {e}"));
            }
        }
    }

    fn ready_context(&self) -> Result<Arc<InferenceContext>, ApiError> {
        match self.context.get() {
            Some(context) => Ok(context.clone()),
            None => Err(ApiError::Unavailable(
                self.health
                    .status()
                    .error
                    .map(|e| format!("models failed to initialize: {e}"))
                    .unwrap_or_else(|| "models are still initializing".to_string()),
            )),
        }
    }
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/detect", post(detect))
        .route("/detect_batch", post(detect_batch))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
enum ApiError {
    Pipeline(PipelineError),
    BadRequest(String),
    Rejected(StatusCode, String),
    Unavailable(String),
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Pipeline(e) => {
                let status = if e.is_client_error() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                match &e {
                    PipelineError::Invariant(_) => log::error!("Request failed: {e}"),
                    _ if e.is_client_error() => log::debug!("Rejected request: {e}"),
                    _ => log::warn!("Request failed: {e}"),
                }
                (status, e.public_message())
            }
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Rejected(status, message) => (status, message),
            Self::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            Self::Internal(message) => {
                log::error!("{message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Response {
    let status = state.health.status();
    let code = if status.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status)).into_response()
}

async fn detect(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<DetectResponse>, ApiError> {
    let context = state.ready_context()?;
    let (source, params) = parse_detect_request(request).await?;
    let response =
        run_blocking(move || RequestHandler::new(&context).detect(source, &params)).await??;
    Ok(Json(response))
}

async fn detect_batch(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<BatchResponse>, ApiError> {
    let context = state.ready_context()?;
    let body = read_json::<BatchBody>(request).await?;
    let images = body
        .images_base64
        .ok_or_else(|| ApiError::BadRequest("No images provided".to_string()))?;
    let params = body.params.into_parameters()?;
    let response =
        run_blocking(move || RequestHandler::new(&context).detect_batch(&images, &params)).await?;
    Ok(Json(response))
}

/// Moves CPU-bound pipeline work off the async executor. A panic in `f`
/// becomes a generic 500.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("request worker failed: {e}")))
}

/// Threshold fields as they arrive in JSON: numbers, numeric strings or booleans.
#[derive(Debug, Default, Deserialize)]
struct RawParams {
    conf_thres: Option<Value>,
    iou_thres: Option<Value>,
    show_conf: Option<Value>,
}

impl RawParams {
    fn into_parameters(self) -> Result<RequestParameters, PipelineError> {
        RequestParameters::from_fields(
            field_text(self.conf_thres).as_deref(),
            field_text(self.iou_thres).as_deref(),
            field_text(self.show_conf).as_deref(),
        )
    }
}

fn field_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Default, Deserialize)]
struct DetectBody {
    image_base64: Option<String>,
    #[serde(flatten)]
    params: RawParams,
}

#[derive(Debug, Default, Deserialize)]
struct BatchBody {
    images_base64: Option<Vec<String>>,
    #[serde(flatten)]
    params: RawParams,
}

async fn parse_detect_request(
    request: Request,
) -> Result<(ImageSource, RequestParameters), ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;
        return parse_multipart(multipart).await;
    }

    let body = read_json::<DetectBody>(request).await?;
    let params = body.params.into_parameters()?;
    let source = ImageSource::select(None, body.image_base64)?;
    Ok((source, params))
}

async fn parse_multipart(
    mut multipart: Multipart,
) -> Result<(ImageSource, RequestParameters), ApiError> {
    let mut upload = None;
    let mut image_base64 = None;
    let mut params = RawParams::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;
            upload = Some(bytes.to_vec());
            continue;
        }
        let slot = match name.as_str() {
            "image_base64" => &mut image_base64,
            "conf_thres" => &mut params.conf_thres,
            "iou_thres" => &mut params.iou_thres,
            "show_conf" => &mut params.show_conf,
            _ => continue,
        };
        let text = field
            .text()
            .await
            .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;
        *slot = Some(Value::String(text));
    }

    let params = params.into_parameters()?;
    let image_base64 = image_base64.and_then(|v| field_text(Some(v)));
    let source = ImageSource::select(upload, image_base64)?;
    Ok((source, params))
}

/// Reads the body as JSON. An empty body is treated as `{}`.
async fn read_json<T>(request: Request) -> Result<T, ApiError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    let bytes = Bytes::from_request(request, &())
        .await
        .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| PipelineError::Validation(format!("invalid JSON body: {e}")).into())
}
