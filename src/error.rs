use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Realized prices unavailable: {0}")]
    PriceUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// How a caller should treat a failure. Retries are never attempted inside
/// the validator; this only tells the collaborator what kind of failure it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed forecast on append. Nothing was persisted.
    Validation,
    /// Ensemble / realized path shape problem. Only that participant is affected.
    DimensionMismatch,
    /// Transient store or sink failure (pool timeout, busy database, IO).
    Retryable,
    /// Anything a retry cannot fix.
    Fatal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::DimensionMismatch => "dimension_mismatch",
            ErrorKind::Retryable => "retryable",
            ErrorKind::Fatal => "fatal",
        };
        write!(f, "{s}")
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::DimensionMismatch(_) | AppError::InvalidInput(_) => {
                ErrorKind::DimensionMismatch
            }
            AppError::PriceUnavailable(_) | AppError::Io(_) | AppError::ChannelSend(_) => {
                ErrorKind::Retryable
            }
            AppError::Database(e) => classify_sqlx(e),
            AppError::NotFound(_)
            | AppError::Json(_)
            | AppError::Migration(_)
            | AppError::Config(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }
}

fn classify_sqlx(e: &sqlx::Error) -> ErrorKind {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            ErrorKind::Retryable
        }
        // SQLITE_BUSY (5) and SQLITE_LOCKED (6) clear once the other writer commits.
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("5") | Some("6") => ErrorKind::Retryable,
            _ => ErrorKind::Fatal,
        },
        _ => ErrorKind::Fatal,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
