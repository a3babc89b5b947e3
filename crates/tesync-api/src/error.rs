//! Errors raised while talking to the ThousandEyes API.

/// Transport or response failure. Callers treat this per account group:
/// the failing group contributes nothing, the others carry on.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("no API token configured (set TE_API_TOKEN)")]
    MissingToken,
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Http(err.to_string())
    }
}

/// Result type for API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
