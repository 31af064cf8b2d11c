use std::net::SocketAddr;

use anyhow::Result;
use figment::{
    providers::{Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaasConfig {
    /// Backend driver name. Only the in-process "noop" driver ships in-tree;
    /// real backends register here.
    pub driver: String,
}

impl Default for FaasConfig {
    fn default() -> Self {
        FaasConfig {
            driver: "noop".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TracingConfig {
    // Enable span export.
    pub enabled: bool,
    // OpenTelemetry collector grpc endpoint. Defaults to using
    // OTEL_EXPORTER_OTLP_ENDPOINT env var or to localhost:4317 if empty.
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service_name: String,
    pub listen_addr: String,
    /// Resync sweep interval in seconds.
    pub resync_period_secs: u64,
    /// Worker-pool size for the controller.
    pub workers: usize,
    pub faas: FaasConfig,
    pub tracing: TracingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            service_name: "function-manager".to_string(),
            listen_addr: "0.0.0.0:8900".to_string(),
            resync_period_secs: 60,
            workers: 1,
            faas: Default::default(),
            tracing: TracingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_path(path: &str) -> Result<ServerConfig> {
        let config_str = std::fs::read_to_string(path)?;
        let config: ServerConfig = Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Yaml::string(&config_str))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "invalid listen address: {}",
                self.listen_addr
            ));
        }
        if self.resync_period_secs == 0 {
            return Err(anyhow::anyhow!("resync_period_secs must be positive"));
        }
        Ok(())
    }
}
