use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found on tracker: {0}")]
    NotFound(String),

    #[error("Tracker rejected the API key: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The tracker's own error message, verbatim.
    #[error("Tracker refused the request: {0}")]
    Rejected(String),

    #[error("Unexpected tracker response: {0}")]
    BadResponse(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::BadResponse(err.to_string())
        } else if err.is_builder() {
            ApiError::Client(err.to_string())
        } else {
            ApiError::Network(err.without_url().to_string())
        }
    }
}
