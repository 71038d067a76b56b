//! Error types for each layer of the mesh.
//!
//! Only [`DiscoveryError`] and [`ApiError`] ever reach an HTTP caller.
//! Probe and peer errors are folded into the `ok` flag of the
//! measurement or vector they belong to.

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::types::Vector;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("the given SRV record name {0:?} does not have a valid format; it should look something like _foo._tcp.example.com")]
    InvalidName(String),
    #[error("failed to resolve SRV record {name}: {reason}")]
    Lookup { name: String, reason: String },
}

/// Why a single strategy could not measure a target.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to make request to {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("expected status code 200, got {0}")]
    Status(u16),
    #[error("failed to establish a TCP connection with {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("TCP connection to {0} timed out")]
    Timeout(String),
    #[error("this is no probe")]
    NoProbe,
}

/// Why a peer's vector could not be retrieved.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("failed to make GET request: {0}")]
    Request(#[source] reqwest::Error),
    #[error("peer failed to resolve SRV record")]
    Degraded,
    #[error("failed to read body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("response from node has wrong format: maybe it is not running this service?: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("{0}")]
    Collect(#[from] CollectError),
}

/// A failed fetch, still carrying the row to put in the matrix.
#[derive(Debug, Error)]
#[error("failed to get vector from {}: {source}", .vector.source)]
pub struct PeerFailure {
    pub vector: Vector,
    #[source]
    pub source: PeerError,
}

impl PeerFailure {
    pub fn into_vector(self) -> Vector {
        self.vector
    }
}

/// A fan-out task that never produced a value.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("task for target {index} panicked")]
    Panicked { index: usize },
    #[error("task for target {index} was cancelled")]
    Cancelled { index: usize },
}

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("failed to marshal data: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to render graph: {0}")]
    Render(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Discovery(DiscoveryError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            ApiError::Discovery(DiscoveryError::Lookup { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Encode(_) | ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), format!("{}\n", self)).into_response()
    }
}
