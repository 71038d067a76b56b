//! Fetching the vectors other nodes have measured.
//!
//! Instead of measuring the whole mesh itself, a node asks every
//! sibling for its `/vector`.  A sibling that cannot be reached or
//! answers garbage still gets a row in the matrix, flagged `ok=false`.

use std::sync::Arc;

use reqwest::{Client, StatusCode};

use crate::collector::fan_out;
use crate::discovery::{Discovery, Target};
use crate::error::{PeerError, PeerFailure};
use crate::types::{Latency, Vector};

pub struct PeerClient {
    client: Client,
    discovery: Arc<dyn Discovery>,
}

impl PeerClient {
    /// `client` must already carry the vector fetch timeout.
    pub fn new(client: Client, discovery: Arc<dyn Discovery>) -> Self {
        Self { client, discovery }
    }

    /// Ask the node behind `target` for its measurements.
    pub async fn fetch_vector(&self, target: &Target) -> Result<Vector, PeerFailure> {
        let resolved_ip = self
            .discovery
            .lookup_ip(&target.host)
            .await
            .map(|ip| ip.to_string());
        let mut vector = Vector::pending(target.to_string(), resolved_ip, target.host.clone());

        match self.request(target).await {
            Ok(latencies) => {
                vector.latencies = latencies;
                vector.ok = true;
                Ok(vector)
            }
            Err(source) => Err(PeerFailure { vector, source }),
        }
    }

    async fn request(&self, target: &Target) -> Result<Vec<Latency>, PeerError> {
        let res = self
            .client
            .get(target.to_string())
            .send()
            .await
            .map_err(PeerError::Request)?;
        if res.status() == StatusCode::SERVICE_UNAVAILABLE {
            // The body only carries the peer's resolver error.
            let _ = res.bytes().await;
            return Err(PeerError::Degraded);
        }
        let body = res.bytes().await.map_err(PeerError::Body)?;
        serde_json::from_slice(&body).map_err(PeerError::Malformed)
    }
}

/// Fetch the vectors of all `targets` concurrently, one slot per target.
pub async fn collect_vectors(
    targets: &[Target],
    peers: &Arc<PeerClient>,
) -> Vec<Result<Vector, PeerFailure>> {
    let results = fan_out(targets, |target: Target| {
        let peers = Arc::clone(peers);
        async move { peers.fetch_vector(&target).await }
    })
    .await;

    results
        .into_iter()
        .zip(targets)
        .map(|(result, target)| match result {
            Ok(fetched) => fetched,
            Err(e) => Err(PeerFailure {
                vector: Vector::pending(target.to_string(), None, target.host.clone()),
                source: e.into(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticDiscovery;
    use crate::testutil::{closed_port, serve, test_client};
    use axum::{http::StatusCode as Status, routing::get, Json, Router};
    use std::time::Duration;

    fn client() -> Arc<PeerClient> {
        Arc::new(PeerClient::new(
            test_client(),
            Arc::new(StaticDiscovery::default()),
        ))
    }

    fn vector_target(port: u16) -> Target {
        Target {
            path: "/vector".into(),
            query: "srv=_svc._tcp.example.com".into(),
            ..Target::new("127.0.0.1", port)
        }
    }

    fn measured() -> Vec<Latency> {
        vec![Latency {
            destination: "http://127.0.0.1:1".into(),
            resolved_ip: Some("127.0.0.1".into()),
            resolved_host: Some("127.0.0.1".into()),
            duration: Duration::from_micros(250),
            ok: true,
            strategy: Some("http-ping-prober".into()),
            placeholder: false,
        }]
    }

    async fn healthy_peer() -> u16 {
        let app = Router::new().route("/vector", get(|| async { Json(measured()) }));
        serve(app).await.port()
    }

    async fn degraded_peer() -> u16 {
        let app = Router::new().route(
            "/vector",
            get(|| async { (Status::SERVICE_UNAVAILABLE, "failed to resolve SRV record") }),
        );
        serve(app).await.port()
    }

    #[tokio::test]
    async fn fetches_a_healthy_vector() {
        let target = vector_target(healthy_peer().await);
        let v = client().fetch_vector(&target).await.unwrap();
        assert!(v.ok);
        assert_eq!(v.source, target.to_string());
        assert_eq!(v.resolved_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(v.latencies, measured());
    }

    #[tokio::test]
    async fn service_unavailable_marks_the_peer_degraded() {
        let target = vector_target(degraded_peer().await);
        let failure = client().fetch_vector(&target).await.unwrap_err();
        assert!(matches!(failure.source, PeerError::Degraded));
        assert!(!failure.vector.ok);
        assert!(failure.vector.latencies.is_empty());
    }

    #[tokio::test]
    async fn malformed_bodies_are_rejected() {
        let app = Router::new().route("/vector", get(|| async { "<html>not json</html>" }));
        let target = vector_target(serve(app).await.port());
        let failure = client().fetch_vector(&target).await.unwrap_err();
        assert!(matches!(failure.source, PeerError::Malformed(_)));
        assert!(!failure.into_vector().ok);
    }

    #[tokio::test]
    async fn unreachable_peers_still_yield_a_row() {
        let target = vector_target(closed_port().await);
        let failure = client().fetch_vector(&target).await.unwrap_err();
        assert!(matches!(failure.source, PeerError::Request(_)));
        assert_eq!(failure.vector.source, target.to_string());
    }

    #[tokio::test]
    async fn one_degraded_peer_leaves_the_others_alone() {
        let targets = vec![
            vector_target(healthy_peer().await),
            vector_target(degraded_peer().await),
            vector_target(healthy_peer().await),
        ];

        let results = collect_vectors(&targets, &client()).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().is_ok_and(|v| v.ok));
        assert!(matches!(
            results[1].as_ref().map_err(|f| &f.source),
            Err(PeerError::Degraded)
        ));
        assert!(results[2].as_ref().is_ok_and(|v| v.ok));
    }
}
