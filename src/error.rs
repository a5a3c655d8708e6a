use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::feed::FetchError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("OPML error: {0}")]
    Opml(#[from] opml::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures of a single proxied feed request, as reported to the client.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("missing name in url path.")]
    MissingName,

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Store(#[from] AppError),
}

impl From<FetchError> for ProxyError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Upstream { status, message } => ProxyError::Upstream { status, message },
            FetchError::Transport(message) => ProxyError::Transport(message),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::MissingName => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::Transport(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
