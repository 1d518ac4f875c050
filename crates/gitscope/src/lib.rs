pub mod api;
pub mod detail;
pub mod history;
pub mod patch;

use axum::{http::StatusCode, response::IntoResponse};
use git::repository::{RepositoryCache, RepositoryError};
use std::path::PathBuf;
use std::sync::Arc;

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub enum Error {
    Http(StatusCode, String),
    Internal(anyhow::Error),
}

impl Error {
    pub fn http(code: StatusCode, message: String) -> Self {
        Self::Http(code, message)
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(error)
    }
}

impl From<RepositoryError> for Error {
    fn from(error: RepositoryError) -> Self {
        match error {
            error @ RepositoryError::NotFound { .. } => {
                Self::Http(StatusCode::NOT_FOUND, error.to_string())
            }
            RepositoryError::Internal(error) => Self::Internal(error),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Internal(error.into())
    }
}

impl From<axum::http::Error> for Error {
    fn from(error: axum::http::Error) -> Self {
        Self::Internal(error.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        match self {
            Error::Http(code, message) => {
                log::error!("HTTP error {}: {}", code, &message);
                (code, message).into_response()
            }
            Error::Internal(error) => {
                log::error!(
                    "HTTP error {}: {:?}",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &error
                );
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{}", &error)).into_response()
            }
        }
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(code, message) => (code, message).fmt(f),
            Error::Internal(error) => error.fmt(f),
        }
    }
}

/// Shared server state. The repository cache is the only state that
/// outlives a request.
pub struct AppState {
    pub repositories: RepositoryCache,
    pub wwwroot: Option<PathBuf>,
}

impl AppState {
    pub fn new(wwwroot: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            repositories: RepositoryCache::new(),
            wwwroot,
        })
    }
}
