//! Configuration management for Warden.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::Result;

/// Prefix for environment variable overrides, e.g. `WARDEN__SERVER__GRPC_ADDR`.
const ENV_PREFIX: &str = "WARDEN";

/// Main configuration for the Warden service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission configuration
    #[serde(default)]
    pub admission: AdmissionConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC server address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
        }
    }
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8081))
}

/// Admission configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Path to the resource rules file. Without one, every resource is
    /// unlimited.
    pub rules_path: Option<String>,

    /// Interval in seconds between idle-history sweeps. Histories are kept
    /// forever when unset.
    pub sweep_interval_secs: Option<u64>,
}

impl AdmissionConfig {
    /// The sweep interval, if sweeping is enabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl WardenConfig {
    /// Load configuration from an optional YAML file, overridden by `WARDEN__*`
    /// environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        Self::load_layered(path, env_source())
    }

    /// Layer `env` over the optional file and deserialize the result.
    fn load_layered(path: Option<&str>, env: ::config::Environment) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path));
        }
        let config = builder.add_source(env).build()?;
        Ok(config.try_deserialize()?)
    }
}

fn env_source() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
}
