//! Prometheus Remote Read Handler
//!
//! Serves the Prometheus remote_read protocol (SAMPLES response type) from
//! ClickHouse.
//!
//! ## Protocol Details
//!
//! - Content-Type: `application/x-protobuf`
//! - Content-Encoding: `snappy` (block format, not framed)
//! - Endpoint: `POST /api/v1/read`

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use common::prompb::{self, ReadRequest, ReadResponse};
use serde::{Deserialize, Serialize};

use crate::error::ReadError;
use crate::executor::{RemoteReader, SqlExecutor};

/// Shared state for the remote_read handler
pub struct ReadHandlerState<E> {
    pub reader: Arc<RemoteReader<E>>,
    /// Upper bound for a whole request; `None` waits for the store
    pub query_timeout: Option<Duration>,
}

impl<E> Clone for ReadHandlerState<E> {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
            query_timeout: self.query_timeout,
        }
    }
}

impl<E: SqlExecutor + 'static> ReadHandlerState<E> {
    pub fn new(reader: RemoteReader<E>, query_timeout: Option<Duration>) -> Self {
        Self {
            reader: Arc::new(reader),
            query_timeout,
        }
    }

    async fn handle_remote_read(&self, body: Bytes) -> Result<Vec<u8>, ReadError> {
        tracing::debug!(body_size = body.len(), "Handling Prometheus remote_read request");

        let request = prompb::decode_read_request(&body).map_err(|e| {
            tracing::warn!(error = %e, "Failed to decode Prometheus remote_read");
            ReadError::Decode(e.to_string())
        })?;

        let response = self.read(&request).await?;

        tracing::info!(
            queries = request.queries.len(),
            timeseries = response
                .results
                .iter()
                .map(|r| r.timeseries.len())
                .sum::<usize>(),
            "Completed Prometheus remote_read"
        );

        prompb::encode_read_response(&response).map_err(|e| {
            tracing::error!(error = %e, "Failed to encode remote_read response");
            ReadError::Encode(e.to_string())
        })
    }

    async fn read(&self, request: &ReadRequest) -> Result<ReadResponse, ReadError> {
        match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, self.reader.read(request))
                .await
                .map_err(|_| ReadError::Timeout(limit))?,
            None => self.reader.read(request).await,
        }
    }
}

/// Axum handler for POST /api/v1/read
pub async fn handle_prometheus_read<E: SqlExecutor + 'static>(
    State(state): State<ReadHandlerState<E>>,
    body: Bytes,
) -> Response {
    match state.handle_remote_read(body).await {
        Ok(encoded) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, prompb::CONTENT_TYPE),
                (header::CONTENT_ENCODING, prompb::CONTENT_ENCODING),
            ],
            encoded,
        )
            .into_response(),
        Err(e) => {
            if e.status_code().is_server_error() {
                tracing::error!(error = %e, "Prometheus remote_read failed");
            } else {
                tracing::warn!(error = %e, "Rejected Prometheus remote_read");
            }
            e.into_response()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Axum handler for GET /health
pub async fn health_handler() -> (StatusCode, Json<HealthResponse>) {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}

/// Build the HTTP router for the remote_read adapter.
pub fn create_router<E: SqlExecutor + 'static>(state: ReadHandlerState<E>) -> Router {
    Router::new()
        .route("/api/v1/read", post(handle_prometheus_read::<E>))
        .route("/health", get(health_handler))
        .with_state(state)
}
