//! HTTP surface: JSON API, homepage, static and pre-compressed assets.

mod api;
mod pages;

use std::path::PathBuf;

use axum::{
    Json, Router,
    body::Bytes,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use thiserror::Error;
use tower_http::services::ServeDir;
use tracing::{error, warn};

use crate::{
    operation::ValidationError,
    runtime::handle::{OperationLogHandle, RuntimeError},
};

pub use api::OperationQuery;
pub use pages::render_homepage;

/// Shared request state.
#[derive(Clone)]
pub struct AppState {
    /// Store/archive runtime.
    pub handle: OperationLogHandle,
    /// Homepage rendered at startup.
    pub homepage: Bytes,
    /// Static asset root.
    pub static_dir: PathBuf,
    /// Whether the add endpoint does anything.
    pub allow_uploads: bool,
    /// Upload body limit.
    pub max_upload_bytes: usize,
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(pages::homepage))
        .route("/api/v1/operations/get", get(api::get_operations))
        .route("/api/v1/operations/add", post(api::add_operation).layer(upload_limit))
        .route("/data/{*path}", get(pages::compressed_data))
        .fallback_service(static_files)
        .with_state(state)
}

/// Request-level failure rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad query parameter or form field.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Runtime command failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// Multipart body could not be read.
    #[error("bad upload: {0}")]
    BadUpload(String),
    /// Uploads are switched off.
    #[error("operation uploads are not enabled on this server")]
    NotImplemented,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadUpload(_) | Self::Runtime(RuntimeError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
