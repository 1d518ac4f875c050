use crate::{detail, history, AppState, Error, Result};
use axum::{
    body::Body,
    extract::{Path, Query},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use rust_embed::RustEmbed;
use std::path::PathBuf;
use std::sync::Arc;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/git-log", get(get_git_log))
        .route("/api/git-commit/:commit_id", get(get_git_commit))
        .fallback(get_static_asset)
        .layer(Extension(state))
}

/// Query parameters arrive as raw pairs so that repeated keys (`author`)
/// survive extraction.
fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

fn params(pairs: &[(String, String)], key: &str) -> Vec<String> {
    pairs
        .iter()
        .filter(|(name, _)| name == key)
        .map(|(_, value)| value.clone())
        .collect()
}

fn required_repo(pairs: &[(String, String)]) -> Result<&str> {
    param(pairs, "repo")
        .filter(|repo| !repo.is_empty())
        .ok_or_else(|| {
            Error::http(
                StatusCode::NOT_FOUND,
                "missing 'repo' parameter".to_string(),
            )
        })
}

async fn get_git_log(
    Query(pairs): Query<Vec<(String, String)>>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse> {
    let repo = required_repo(&pairs)?;
    let handle = state.repositories.get_or_open(std::path::Path::new(repo))?;

    let filters = history::Filters {
        subpath: param(&pairs, "path")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from),
        no_merges: param(&pairs, "noMerges") == Some("1"),
        commit: param(&pairs, "commit")
            .filter(|commit| !commit.is_empty())
            .map(str::to_string),
        authors: params(&pairs, "author"),
    };

    let stream = history::stream(handle, filters);
    Ok(Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::wrap_stream(stream))?)
}

async fn get_git_commit(
    Path(commit_id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>> {
    let repo = required_repo(&pairs)?;
    let handle = state.repositories.get_or_open(std::path::Path::new(repo))?;

    let subpath = param(&pairs, "path")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from);
    let ignore_whitespace = param(&pairs, "ignoreWhitespace") == Some("1");

    let value = detail::get(handle, subpath, &commit_id, ignore_whitespace).await?;
    Ok(Json(value))
}

#[derive(RustEmbed)]
#[folder = "wwwroot"]
#[exclude = "*.DS_Store"]
struct Assets;

/// Serves the frontend: embedded files by default, or the `--wwwroot`
/// directory when one was given.
async fn get_static_asset(
    uri: Uri,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };
    if path.split('/').any(|segment| segment == "..") {
        return StatusCode::NOT_FOUND.into_response();
    }

    if let Some(wwwroot) = &state.wwwroot {
        return match tokio::fs::read(wwwroot.join(path)).await {
            Ok(contents) => asset_response(path, contents),
            Err(_) => StatusCode::NOT_FOUND.into_response(),
        };
    }

    match Assets::get(path) {
        Some(file) => asset_response(path, file.data.into_owned()),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn asset_response(path: &str, contents: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, content_type(path))], contents).into_response()
}

fn content_type(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, extension)| extension) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
