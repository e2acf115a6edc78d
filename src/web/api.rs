use axum::{
    Json,
    extract::{Multipart, RawQuery, State, multipart::MultipartRejection},
    http::StatusCode,
};
use tracing::debug;
use url::form_urlencoded;

use crate::operation::{Operation, OperationFields, OperationFilter};

use super::{ApiError, AppState};

/// Multipart part carrying the report payload.
const REPORT_PART: &str = "file";

/// Raw read-endpoint parameters; absent keys are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationQuery {
    /// Class substring (`type`).
    pub class: String,
    /// Mission-name substring.
    pub name: String,
    /// Inclusive upper date bound.
    pub older: String,
    /// Inclusive lower date bound.
    pub newer: String,
}

impl OperationQuery {
    /// Parses a urlencoded query string. A repeated key keeps its first
    /// value; unknown keys are ignored.
    pub fn from_query_string(raw: &str) -> Self {
        let mut query = Self::default();
        let mut seen = [false; 4];
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let (idx, slot) = match key.as_ref() {
                "type" => (0, &mut query.class),
                "name" => (1, &mut query.name),
                "older" => (2, &mut query.older),
                "newer" => (3, &mut query.newer),
                _ => continue,
            };
            if !seen[idx] {
                seen[idx] = true;
                *slot = value.into_owned();
            }
        }
        query
    }
}

pub(super) async fn get_operations(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Vec<Operation>>, ApiError> {
    let params = OperationQuery::from_query_string(raw.as_deref().unwrap_or(""));
    let filter = OperationFilter::from_params(&params.class, &params.name, &params.older, &params.newer)?;
    let ops = state.handle.query(filter).await?;
    debug!(count = ops.len(), "operations listed");
    Ok(Json(ops))
}

pub(super) async fn add_operation(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Operation>), ApiError> {
    if !state.allow_uploads {
        return Err(ApiError::NotImplemented);
    }

    let mut multipart = multipart.map_err(|e| ApiError::BadUpload(e.to_string()))?;
    let mut fields = OperationFields::default();
    let mut payload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadUpload(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        if name == REPORT_PART {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadUpload(e.to_string()))?;
            payload = Some(bytes.to_vec());
            continue;
        }
        let value = field
            .text()
            .await
            .map_err(|e| ApiError::BadUpload(e.to_string()))?;
        if !fields.set(&name, value) {
            debug!(field = %name, "ignoring unknown upload field");
        }
    }

    let payload = payload.ok_or_else(|| ApiError::BadUpload(format!("missing `{REPORT_PART}` part")))?;
    let op = state.handle.add(fields, payload).await?;
    Ok((StatusCode::CREATED, Json(op)))
}
