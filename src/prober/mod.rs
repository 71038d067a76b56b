//! Latency probing strategies.
//!
//! A [`Prober`] measures one round-trip to one [`Target`].  Probers are
//! tried in a fixed order by [`probe_target`]: the first one that
//! succeeds provides the measurement, and [`NoProber`] at the end of
//! the chain guarantees the walk terminates with a result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{error, warn};

use crate::discovery::{Discovery, Target};
use crate::error::ProbeError;
use crate::types::{Latency, UNREACHABLE};

pub mod http;
pub mod tcp;

pub use http::{HttpPingProber, HttpProber};
pub use tcp::TcpProber;

#[async_trait]
pub trait Prober: Send + Sync {
    /// Measure a single round-trip to `target`.
    async fn probe(&self, target: &Target) -> Result<Duration, ProbeError>;

    /// Stable name reported alongside each measurement.
    fn name(&self) -> &'static str;
}

/// The ordered strategy list shared by all requests.
pub type Probers = Arc<Vec<Box<dyn Prober>>>;

/// Build the strategy chain in priority order.
///
/// `client` must already carry the per-probe timeout; `timeout` bounds
/// the raw TCP connect.
pub fn default_chain(client: reqwest::Client, timeout: Duration) -> Probers {
    Arc::new(vec![
        Box::new(HttpPingProber::new(client.clone())),
        Box::new(HttpProber::new(client)),
        Box::new(TcpProber::new(timeout)),
        Box::new(NoProber),
    ])
}

/// Always fails, with the largest representable duration.
pub struct NoProber;

#[async_trait]
impl Prober for NoProber {
    async fn probe(&self, _target: &Target) -> Result<Duration, ProbeError> {
        Err(ProbeError::NoProbe)
    }

    fn name(&self) -> &'static str {
        "no-prober"
    }
}

/// Walk `probers` in order until one of them reaches `target`.
///
/// The IP lookup runs regardless of the probe outcome and never
/// changes it; a failed lookup only leaves `resolved_ip` empty.
pub async fn probe_target(
    target: &Target,
    probers: &[Box<dyn Prober>],
    discovery: &dyn Discovery,
) -> Latency {
    let mut outcome = Err(ProbeError::NoProbe);
    let mut strategy = None;
    for prober in probers {
        strategy = Some(prober.name());
        match prober.probe(target).await {
            Ok(d) => {
                outcome = Ok(d);
                break;
            }
            Err(e) => {
                warn!("prober {} failed: {}", prober.name(), e);
                outcome = Err(e);
            }
        }
    }

    let (duration, ok) = match outcome {
        Ok(d) => (d, true),
        Err(e) => {
            error!("failed to successfully determine any latency to {}: {}", target, e);
            (UNREACHABLE, false)
        }
    };

    let resolved_ip = discovery
        .lookup_ip(&target.host)
        .await
        .map(|ip| ip.to_string());

    Latency {
        destination: target.to_string(),
        resolved_ip,
        resolved_host: Some(target.host.clone()),
        duration,
        ok,
        strategy: strategy.map(str::to_string),
        placeholder: false,
    }
}
