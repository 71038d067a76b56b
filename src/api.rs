//! HTTP surface of a mesh node.
//!
//! * `GET /ping` answers `pong`; the ping-style prober of every other
//!   node targets it.
//! * `GET /vector?srv=<name>` probes every peer behind `<name>` and
//!   returns the measurements as JSON.
//! * `GET /?srv=<name>&format=<fmt>` asks every sibling behind the
//!   node's own discovery name for its `/vector?srv=<name>`, aligns the
//!   rows and renders the matrix.  Any other path is answered the same
//!   way.

use std::sync::Arc;

use axum::extract::{MatchedPath, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{debug, error, warn};
use serde::Deserialize;

use crate::collector::get_latencies;
use crate::discovery::{resolve_srv, Discovery, SrvName};
use crate::error::ApiError;
use crate::matrix::Matrix;
use crate::metrics::Metrics;
use crate::peer::{collect_vectors, PeerClient};
use crate::prober::Probers;
use crate::render::{self, Format};

/// Everything a request handler needs, built once at startup.
pub struct Mesh {
    /// This service's own discovery name, used to find siblings.
    pub srv: SrvName,
    pub discovery: Arc<dyn Discovery>,
    pub probers: Probers,
    pub peers: Arc<PeerClient>,
    pub metrics: Metrics,
    pub graphviz_cmd: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MeshQuery {
    pub srv: Option<String>,
    pub format: Option<String>,
}

impl Mesh {
    /// The name named in the query, or this service's own one.
    fn target_name(&self, query: &MeshQuery) -> Result<SrvName, ApiError> {
        match &query.srv {
            Some(s) => Ok(s.parse()?),
            None => Ok(self.srv.clone()),
        }
    }

    fn failed(&self, e: ApiError) -> ApiError {
        error!("{}", e);
        self.metrics.record_error();
        e
    }
}

pub fn router(mesh: Arc<Mesh>) -> Router {
    Router::new()
        .route("/", get(collect_all))
        .route("/vector", get(vector))
        .route("/ping", get(ping))
        .fallback(collect_all)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&mesh),
            count_requests,
        ))
        .with_state(mesh)
}

/// Router for the metrics listener.
pub fn metrics_router(metrics: Metrics) -> Router {
    Router::new()
        .route("/metrics", get(export_metrics))
        .with_state(metrics)
}

/// Unmatched paths fall back to the matrix and are counted as `/`.
async fn count_requests(State(mesh): State<Arc<Mesh>>, req: Request, next: Next) -> Response {
    let handler = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    mesh.metrics.record_request(&handler, req.method().as_str());
    next.run(req).await
}

async fn ping() -> &'static str {
    "pong"
}

async fn vector(
    State(mesh): State<Arc<Mesh>>,
    Query(query): Query<MeshQuery>,
) -> Result<Response, ApiError> {
    let name = mesh.target_name(&query).map_err(|e| mesh.failed(e))?;
    let targets = resolve_srv(mesh.discovery.as_ref(), &name, "", "")
        .await
        .map_err(|e| mesh.failed(e.into()))?;

    let latencies = get_latencies(&targets, &mesh.probers, &mesh.discovery).await;
    for l in latencies.iter().filter(|l| !l.ok) {
        debug!("no prober reached {}", l.destination);
        mesh.metrics.record_error();
    }

    let body = serde_json::to_vec(&latencies).map_err(|e| mesh.failed(e.into()))?;
    Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
}

async fn collect_all(
    State(mesh): State<Arc<Mesh>>,
    Query(query): Query<MeshQuery>,
) -> Result<Response, ApiError> {
    // Siblings are always found through our own name; the requested
    // name is what each of them measures.
    let target = mesh.target_name(&query).map_err(|e| mesh.failed(e))?;
    let siblings = resolve_srv(
        mesh.discovery.as_ref(),
        &mesh.srv,
        "/vector",
        &format!("srv={}", target),
    )
    .await
    .map_err(|e| mesh.failed(e.into()))?;

    let rows = collect_vectors(&siblings, &mesh.peers)
        .await
        .into_iter()
        .map(|fetched| {
            fetched.unwrap_or_else(|failure| {
                warn!("{}", failure);
                mesh.metrics.record_error();
                failure.into_vector()
            })
        })
        .collect::<Vec<_>>();
    let matrix = Matrix::from(rows).pad();

    match Format::from_query(query.format.as_deref()) {
        Format::Json => {
            let body = serde_json::to_vec(&matrix).map_err(|e| mesh.failed(e.into()))?;
            Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
        }
        Format::Dot => {
            let body = render::dot(&matrix, target == mesh.srv);
            Ok(([(CONTENT_TYPE, "text/vnd.graphviz")], body).into_response())
        }
        Format::Svg => {
            let dot = render::dot(&matrix, target == mesh.srv);
            let body = render::svg(&dot, &mesh.graphviz_cmd)
                .await
                .map_err(|e| mesh.failed(e))?;
            Ok(([(CONTENT_TYPE, "image/svg+xml")], body).into_response())
        }
        table => Ok(render::table(&matrix, table).into_response()),
    }
}

async fn export_metrics(State(metrics): State<Metrics>) -> Response {
    match metrics.encode() {
        Ok(text) => ([(CONTENT_TYPE, prometheus::TEXT_FORMAT)], text).into_response(),
        Err(e) => {
            error!("failed to encode metrics: {}", e);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            )
                .into_response()
        }
    }
}
