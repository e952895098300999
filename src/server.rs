use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::ai::customize_testimonial::{
    CustomizationRequest, CustomizedTestimonial, customize_testimonial,
};
use crate::ai::generate_testimonial::{GenerationRequest, TestimonialDraft, generate_testimonial};
use crate::ai::provider::Provider;
use crate::error::ErrorKind;
use crate::{AppError, AppResult};

/// Largest accepted request body.
pub const BODY_LIMIT: usize = 64 * 1024;

const SERVICE: &str = "testi-ai";

#[derive(Clone)]
pub struct AppState {
    provider: Arc<dyn Provider>,
}

impl AppState {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    ok: bool,
    service: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// An [`AppError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    error: AppError,
    status: StatusCode,
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        let status = match error.kind() {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::InFlight => StatusCode::CONFLICT,
            ErrorKind::Provider | ErrorKind::SchemaValidation => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { error, status }
    }
}

/// Oversized bodies and a wrong content type keep their 413/415; any other
/// unreadable body is a 422.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let status = if status == StatusCode::PAYLOAD_TOO_LARGE
            || status == StatusCode::UNSUPPORTED_MEDIA_TYPE
        {
            status
        } else {
            StatusCode::UNPROCESSABLE_ENTITY
        };
        Self {
            error: AppError::Validation(rejection.body_text()),
            status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {}", self.error);
        } else {
            warn!("Request rejected: {}", self.error);
        }
        let body = ErrorBody {
            error: self.error.kind().as_str(),
            message: self.error.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/generate", post(generate))
        .route("/api/customize", post(customize))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

async fn health() -> Json<Health> {
    Json(Health {
        ok: true,
        service: SERVICE,
    })
}

#[tracing::instrument(name = "POST /api/generate", level = "info", skip_all)]
async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<TestimonialDraft>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;
    let draft = generate_testimonial(state.provider.as_ref(), &request).await?;
    Ok(Json(draft))
}

#[tracing::instrument(name = "POST /api/customize", level = "info", skip_all)]
async fn customize(
    State(state): State<AppState>,
    payload: Result<Json<CustomizationRequest>, JsonRejection>,
) -> Result<Json<CustomizedTestimonial>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;
    let customized = customize_testimonial(state.provider.as_ref(), &request).await?;
    Ok(Json(customized))
}

/// Serve the API until ctrl-c.
#[tracing::instrument(name = "Serving HTTP API", level = "info", skip(state))]
pub async fn serve(bind: SocketAddr, state: AppState) -> AppResult<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {e}");
    }
}
