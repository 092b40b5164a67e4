use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use emotion_domain::{ErrorKind, Response as RecognitionResponse};

use crate::state::{stage_upload, AppState};

/// Largest accepted upload.
pub const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;
/// Multipart field carrying the recording.
pub const AUDIO_FIELD: &str = "audio";

pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.static_dir());
    Router::new()
        .route("/health", get(health))
        .route("/predict-emotion", post(predict_emotion))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_http_server<F>(
    state: AppState,
    addr: SocketAddr,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("serving HTTP router")
}

#[derive(Debug)]
pub enum HttpServerError {
    NoFile,
    Multipart(MultipartError),
    Internal(String),
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NoFile => (StatusCode::BAD_REQUEST, "No file uploaded.".to_string()),
            Self::Multipart(err) => (err.status(), err.body_text()),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<MultipartError> for HttpServerError {
    fn from(err: MultipartError) -> Self {
        Self::Multipart(err)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::AudioNotFound | ErrorKind::FeatureExtraction => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn predict_emotion(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, HttpServerError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(AUDIO_FIELD) {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;
            upload = Some((file_name, bytes));
            break;
        }
    }
    let (file_name, bytes) = upload.ok_or(HttpServerError::NoFile)?;
    info!(file = ?file_name, bytes = bytes.len(), "received upload");

    let recognizer = state.recognizer();
    let upload_dir = state.upload_dir().to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        let staged = stage_upload(&upload_dir, file_name.as_deref(), &bytes)?;
        // The staged file is removed when `staged` drops at the end of this scope.
        Ok::<_, std::io::Error>(recognizer.recognize(staged.path()))
    })
    .await
    .map_err(|err| HttpServerError::Internal(format!("prediction task failed: {err}")))?
    .map_err(|err| {
        error!(error = %err, "could not stage upload");
        HttpServerError::Internal("Failed to store upload.".to_string())
    })?;

    let response = RecognitionResponse::from(result);
    let status = match &response {
        RecognitionResponse::Success(report) => {
            info!(emotion = %report.emotion, "prediction served");
            StatusCode::OK
        }
        RecognitionResponse::Failure(report) => {
            warn!(error = %report.error, kind = report.kind.as_str(), "prediction failed");
            status_for(report.kind)
        }
    };
    Ok((status, Json(response)).into_response())
}
