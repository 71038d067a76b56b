use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::discovery::SrvName;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// SRV record name used to find the other nodes of the mesh.
    pub srv: String,
    pub listen_addr: SocketAddr,
    pub metrics_addr: SocketAddr,
    pub ping_timeout_secs: u64,
    pub vector_timeout_secs: u64,
    /// Graphviz layout binary used for `format=svg`.
    pub graphviz_cmd: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            srv: "_service._proto.example.com".into(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            ping_timeout_secs: 5,
            vector_timeout_secs: 10,
            graphviz_cmd: "dot".into(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("adjacency.toml"))
                .merge(Json::file("adjacency.json"))
                .merge(Env::prefixed("ADJACENCY_")),
        )
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        // Refuse to start with a name no request could ever resolve.
        config.srv_name()?;

        Ok(config)
    }

    pub fn srv_name(&self) -> anyhow::Result<SrvName> {
        self.srv
            .parse()
            .map_err(|e| anyhow::anyhow!("{:?} is not a valid srv record name: {}", self.srv, e))
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn vector_timeout(&self) -> Duration {
        Duration::from_secs(self.vector_timeout_secs)
    }
}
