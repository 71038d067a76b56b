use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::warn;
use reqwest::{Client, Response, StatusCode};

use super::Prober;
use crate::discovery::Target;
use crate::error::ProbeError;

/// Path every node answers with `pong`.
pub const PING_PATH: &str = "/ping";

/// Probes the `/ping` endpoint of another node and only accepts `200 OK`.
///
/// It is safe to use concurrently.
pub struct HttpPingProber {
    client: Client,
}

impl HttpPingProber {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Prober for HttpPingProber {
    async fn probe(&self, target: &Target) -> Result<Duration, ProbeError> {
        let url = target.with_path(PING_PATH).to_string();
        let start = Instant::now();
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ProbeError::Request { url, source })?;
        if res.status() != StatusCode::OK {
            return Err(ProbeError::Status(res.status().as_u16()));
        }
        let dur = start.elapsed();
        discard(res).await;
        Ok(dur)
    }

    fn name(&self) -> &'static str {
        "http-ping-prober"
    }
}

/// Issues a GET to the target itself; any response at all counts.
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &Target) -> Result<Duration, ProbeError> {
        let url = target.to_string();
        let start = Instant::now();
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ProbeError::Request { url, source })?;
        let dur = start.elapsed();
        discard(res).await;
        Ok(dur)
    }

    fn name(&self) -> &'static str {
        "http-prober"
    }
}

/// Read and drop the rest of the body so the connection can be reused.
async fn discard(mut res: Response) {
    loop {
        match res.chunk().await {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                warn!("failed to discard body: {}", e);
                break;
            }
        }
    }
}
