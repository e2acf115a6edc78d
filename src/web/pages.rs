use std::fs;
use std::path::Path;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
};
use minijinja::{Environment, context};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::{ConfigError, Options};

use super::AppState;

const HOMEPAGE_TEMPLATE: &str = "index.html";

/// Renders `<template_dir>/index.html` with the site options.
///
/// Called once at startup; the result is served as-is for `/`.
pub fn render_homepage(template_dir: &Path, options: &Options) -> Result<String, ConfigError> {
    let path = template_dir.join(HOMEPAGE_TEMPLATE);
    let source = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let template_error = |err: minijinja::Error| ConfigError::Template {
        path: path.clone(),
        message: err.to_string(),
    };

    let mut env = Environment::new();
    env.add_template(HOMEPAGE_TEMPLATE, &source)
        .map_err(template_error)?;
    let template = env.get_template(HOMEPAGE_TEMPLATE).map_err(template_error)?;
    template
        .render(context! {
            title => &options.title,
            description => &options.description,
            author => &options.author,
            language => &options.language,
            version => &options.version,
            classes => &options.classes_game,
        })
        .map_err(template_error)
}

pub(super) async fn homepage(State(state): State<AppState>) -> Html<axum::body::Bytes> {
    Html(state.homepage.clone())
}

/// Serves `/data/<path>` from the pre-compressed `<path>.gz` file.
pub(super) async fn compressed_data(State(state): State<AppState>, req: Request) -> Response {
    let (mut parts, body) = req.into_parts();
    let gz_uri = match parts.uri.query() {
        Some(query) => format!("{}.gz?{query}", parts.uri.path()),
        None => format!("{}.gz", parts.uri.path()),
    };
    parts.uri = match gz_uri.parse::<Uri>() {
        Ok(uri) => uri,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let served = ServeDir::new(&state.static_dir)
        .oneshot(Request::from_parts(parts, body))
        .await;
    let mut response = match served {
        Ok(resp) => resp.into_response(),
        Err(never) => match never {},
    };

    if response.status().is_success() {
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/x-gzip"));
    }
    response
}
