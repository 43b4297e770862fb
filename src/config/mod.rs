pub mod duration;
pub mod types;


pub use types::*;

use anyhow::Result;
use std::path::Path;

use crate::error::ProxyError;

impl ProxyConfig {
    /// Load configuration from a YAML file. When the file does not exist,
    /// built-in defaults are used — allowing the proxy to start with zero
    /// configuration for local development.
    pub fn load(path: &Path) -> Result<Self> {
        let config: ProxyConfig = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)
                .map_err(|e| ProxyError::Config(format!("invalid YAML: {e}")))?
        } else {
            tracing::info!(
                "config file not found at {}, using defaults",
                path.display()
            );
            ProxyConfig::default()
        };

        config.validate()?;
        tracing::info!("loaded proxy configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            return Err(ProxyError::Config("at least one backend must be configured".into()).into());
        }
        for b in &self.backends {
            if b.port == 0 {
                return Err(
                    ProxyError::Config(format!("backend {}:{} has invalid port", b.host, b.port))
                        .into(),
                );
            }
            if b.weight == 0 {
                return Err(ProxyError::Config(format!(
                    "backend {}:{} has weight 0, must be >= 1",
                    b.host, b.port
                ))
                .into());
            }
        }
        if self.server.thread_pool_size == 0 {
            return Err(ProxyError::Config("server.thread_pool_size must be >= 1".into()).into());
        }
        self.algorithm
            .parse::<Algorithm>()
            .map_err(ProxyError::Config)?;

        if self.health_check.enabled {
            self.health_check
                .interval_duration()
                .map_err(|e| ProxyError::Config(format!("health_check.interval: {e}")))?;
            self.health_check
                .timeout_duration()
                .map_err(|e| ProxyError::Config(format!("health_check.timeout: {e}")))?;
            if self.health_check.unhealthy_threshold == 0 {
                return Err(
                    ProxyError::Config("health_check.unhealthy_threshold must be >= 1".into())
                        .into(),
                );
            }
            if self.health_check.healthy_threshold == 0 {
                return Err(
                    ProxyError::Config("health_check.healthy_threshold must be >= 1".into())
                        .into(),
                );
            }
        }

        Ok(())
    }
}
