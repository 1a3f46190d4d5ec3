use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

/// Failures talking to the progress table.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to access data file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode or decode progress rows: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("progress table request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("realtime connection failed: {0}")]
    Realtime(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("invalid backend url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl From<tokio_tungstenite::tungstenite::Error> for BackendError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Realtime(Box::new(err))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown PROGRESS_BACKEND '{0}' (expected 'local' or 'supabase')")]
    UnknownBackend(String),

    #[error("{0} must be set when PROGRESS_BACKEND=supabase")]
    Missing(&'static str),
}
