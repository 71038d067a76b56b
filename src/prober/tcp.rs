use std::io;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::warn;
use tokio::net::TcpStream;

use super::Prober;
use crate::discovery::Target;
use crate::error::ProbeError;

/// Tries to establish a TCP connection to the host and port of the target.
///
/// If the peer answers the handshake with a reset, the probe still
/// succeeds: something is listening on that port, just not this service.
/// The duration is then the time until the reset arrived.
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, target: &Target) -> Result<Duration, ProbeError> {
        let addr = target.authority();
        let start = Instant::now();
        match tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(connected) => settle(addr, start, connected.map(drop)),
            Err(_) => Err(ProbeError::Timeout(addr)),
        }
    }

    fn name(&self) -> &'static str {
        "tcp-prober"
    }
}

/// Linux reports a reset sent in reply to a SYN as `ConnectionRefused`,
/// so there the reset branch is only reached on platforms that surface
/// `ECONNRESET` from `connect`.
fn settle(addr: String, start: Instant, connected: io::Result<()>) -> Result<Duration, ProbeError> {
    match connected {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
            warn!("Received ECONNRESET from {}, continuing", addr);
        }
        Err(source) => return Err(ProbeError::Connect { addr, source }),
    }
    Ok(start.elapsed())
}
