use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse};

/// Errors that can occur while serving a remote_read request.
///
/// None of these are retried or downgraded to a partial response.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("unsupported LabelMatcher type {0}")]
    UnsupportedMatcherType(i32),
    #[error("query execution failed: {0}")]
    Execution(String),
    #[error("failed to decode row: {0}")]
    RowDecode(String),
    #[error("invalid table name '{0}': use a non-quoted identifier")]
    InvalidTableName(String),
    #[error("failed to decode remote_read request: {0}")]
    Decode(String),
    #[error("failed to encode remote_read response: {0}")]
    Encode(String),
    #[error("remote_read request exceeded {0:?}")]
    Timeout(Duration),
    #[error("ClickHouse did not answer within {0:?}")]
    Unreachable(Duration),
}

impl ReadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedMatcherType(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Execution(_)
            | Self::RowDecode(_)
            | Self::InvalidTableName(_)
            | Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ReadError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
