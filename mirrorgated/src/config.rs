use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{bail, Context, Result};
use shared::protocol::{DEFAULT_CATALOG_URL, DEFAULT_PORT};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// http(s) URL or local path of the catalog document
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Cap on outstanding probe requests across all services
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

fn default_source() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_timeout() -> u64 {
    3000
}

fn default_max_concurrent() -> usize {
    32
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl CatalogConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Replace the listening port with the value of a `PORT`-style variable.
    /// Unset and blank values keep the configured port.
    pub fn apply_port_override(&mut self, port: Option<String>) -> Result<()> {
        if let Some(port) = port.filter(|p| !p.trim().is_empty()) {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid port: {:?}", port))?;
            self.api.listen.set_port(port);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog.source.trim().is_empty() {
            bail!("catalog.source must not be empty");
        }
        if self.catalog.refresh_interval_secs == 0 {
            bail!("catalog.refresh_interval_secs must be greater than zero");
        }
        if self.probe.timeout_ms == 0 {
            bail!("probe.timeout_ms must be greater than zero");
        }
        if self.probe.max_concurrent_requests == 0 {
            bail!("probe.max_concurrent_requests must be greater than zero");
        }
        Ok(())
    }
}
