use serde::Serialize;
use thiserror::Error;

/// Failure taxonomy shared by the explorer client, the normalizer and the
/// mirror read path. Transport and API failures never escape as raw errors;
/// they are converted into one of these at the client boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum FetchError {
    /// Network failure or timeout talking to the explorer.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Explicit non-success from the explorer (HTTP status or envelope status).
    #[error("upstream error: {0}")]
    UpstreamError(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A required field failed coercion during normalization.
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Neither live nor mirrored data exists.
    #[error("no data available for {0}")]
    NoDataAvailable(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            FetchError::UpstreamError(_) => "UpstreamError",
            FetchError::MalformedResponse(_) => "MalformedResponse",
            FetchError::InvalidField { .. } => "InvalidField",
            FetchError::NoDataAvailable(_) => "NoDataAvailable",
        }
    }

    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        FetchError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
