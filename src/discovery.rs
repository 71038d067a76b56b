//! Peer discovery through DNS SRV records.
//!
//! A discovery name such as `_adjacency._tcp.example.com` resolves to a
//! set of `host:port` records.  Each record becomes a [`Target`] that
//! carries the path and query string the caller wants to hit on it.
//!
//! Lookups go through the [`Discovery`] trait so that request handlers
//! do not care whether names come from the system resolver
//! ([`HickoryDiscovery`]) or from a fixed table.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use log::debug;

use crate::error::DiscoveryError;

/// A validated three-label discovery name.
///
/// Only DNS name characters are accepted, so the name can be passed on
/// in a query string as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvName(String);

impl SrvName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SrvName {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let labels: Vec<&str> = s.splitn(3, '.').collect();
        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
        if labels.len() != 3 || labels.iter().any(|l| l.is_empty()) || !s.chars().all(allowed) {
            return Err(DiscoveryError::InvalidName(s.to_string()));
        }
        Ok(SrvName(s.to_string()))
    }
}

impl fmt::Display for SrvName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One SRV answer: where a peer listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub host: String,
    pub port: u16,
}

/// An HTTP endpoint on one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: &'static str,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: String,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: "http",
            host: host.into(),
            port,
            path: String::new(),
            query: String::new(),
        }
    }

    /// The same peer, addressed at a different path without a query.
    pub fn with_path(&self, path: &str) -> Self {
        Self {
            path: path.to_string(),
            query: String::new(),
            ..self.clone()
        }
    }

    /// `host:port` suitable for a raw socket connect.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority(), self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait Discovery: Send + Sync {
    /// Resolve `name` to the peers behind it, most preferred first.
    async fn lookup_srv(&self, name: &SrvName) -> Result<Vec<SrvRecord>, DiscoveryError>;

    /// Best-effort address lookup used to decorate measurements.
    async fn lookup_ip(&self, host: &str) -> Option<IpAddr>;
}

/// Resolve `name` into targets that all carry `path` and `query`.
pub async fn resolve_srv(
    discovery: &dyn Discovery,
    name: &SrvName,
    path: &str,
    query: &str,
) -> Result<Vec<Target>, DiscoveryError> {
    let records = discovery.lookup_srv(name).await?;
    debug!("{} resolved to {} targets", name, records.len());
    Ok(records
        .into_iter()
        .map(|r| Target {
            path: path.to_string(),
            query: query.to_string(),
            ..Target::new(r.host, r.port)
        })
        .collect())
}

/// [`Discovery`] backed by the system resolver configuration.
pub struct HickoryDiscovery {
    resolver: TokioAsyncResolver,
}

impl HickoryDiscovery {
    pub fn from_system_conf() -> anyhow::Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| anyhow::anyhow!("Failed to load system resolv.conf: {}", e))?;
        Ok(Self { resolver })
    }
}

#[async_trait]
impl Discovery for HickoryDiscovery {
    async fn lookup_srv(&self, name: &SrvName) -> Result<Vec<SrvRecord>, DiscoveryError> {
        let lookup = self
            .resolver
            .srv_lookup(name.as_str())
            .await
            .map_err(|e| DiscoveryError::Lookup {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let mut answers: Vec<_> = lookup.iter().collect();
        answers.sort_by_key(|srv| srv.priority());
        Ok(answers
            .into_iter()
            .map(|srv| SrvRecord {
                host: srv.target().to_utf8().trim_end_matches('.').to_string(),
                port: srv.port(),
            })
            .collect())
    }

    async fn lookup_ip(&self, host: &str) -> Option<IpAddr> {
        match self.resolver.lookup_ip(host).await {
            Ok(lookup) => lookup.iter().next(),
            Err(e) => {
                debug!("Failed to look up IP of {}: {}", host, e);
                None
            }
        }
    }
}

/// A fixed name table, standing in for DNS in tests.
#[cfg(test)]
#[derive(Default)]
pub struct StaticDiscovery {
    pub records: std::collections::HashMap<String, Vec<SrvRecord>>,
}

#[cfg(test)]
impl StaticDiscovery {
    pub fn with(mut self, name: &str, peers: &[(&str, u16)]) -> Self {
        self.records.insert(
            name.to_string(),
            peers
                .iter()
                .map(|(host, port)| SrvRecord {
                    host: host.to_string(),
                    port: *port,
                })
                .collect(),
        );
        self
    }
}

#[cfg(test)]
#[async_trait]
impl Discovery for StaticDiscovery {
    async fn lookup_srv(&self, name: &SrvName) -> Result<Vec<SrvRecord>, DiscoveryError> {
        self.records
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| DiscoveryError::Lookup {
                name: name.to_string(),
                reason: "no records found".into(),
            })
    }

    async fn lookup_ip(&self, host: &str) -> Option<IpAddr> {
        host.parse().ok()
    }
}
