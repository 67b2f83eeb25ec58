use std::fmt;

use derive_more::Display;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Conflict(String),
    ConfigError(String),
    IoError(String),
    FeedError(FetchError),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::IoError(msg) => write!(f, "I/O error: {}", msg),
            AppError::FeedError(err) => write!(f, "Feed error: {}", err),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                AppError::Conflict("Database conflict occurred".into())
            }
            sqlx::Error::RowNotFound => AppError::NotFound("Row not found".into()),
            _ => AppError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(format!("Serialization error: {}", err))
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::FeedError(err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Failures of a single metadata request against the archive endpoint.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum FetchError {
    #[display("Request timed out")]
    Timeout,

    #[display("Unexpected status code: {_0}")]
    Status(u16),

    #[display("Transport error: {_0}")]
    Transport(String),

    #[display("Failed to decode feed response: {_0}")]
    Decode(String),

    #[display("Gave up after {attempts} attempts, last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<FetchError> },
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Display)]
pub enum DownloadError {
    #[display("Can't derive file name from url: {_0}")]
    MalformedUrl(String),

    #[display("Invalid image date: {_0}")]
    MalformedDate(String),

    #[display("Download failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[display("Download transport error: {_0}")]
    Transport(String),

    #[display("Failed to write image: {_0}")]
    Io(String),
}

impl std::error::Error for DownloadError {}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        DownloadError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        DownloadError::Io(err.to_string())
    }
}
