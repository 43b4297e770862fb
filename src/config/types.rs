use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration record consumed by the core at startup.
///
/// Mirrors the YAML shape in spec.md §6: `server`, `algorithm`, `backends`,
/// `health_check`, `logging`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            algorithm: default_algorithm(),
            backends: Vec::new(),
            health_check: HealthCheckConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_algorithm() -> String {
    "round-robin".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_thread_pool_size")]
    pub thread_pool_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            thread_pool_size: default_thread_pool_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_thread_pool_size() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,

    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_hc_interval")]
    pub interval: String,

    #[serde(default = "default_hc_timeout")]
    pub timeout: String,

    #[serde(default = "default_hc_path")]
    pub path: String,

    #[serde(default = "default_hc_threshold")]
    pub unhealthy_threshold: u32,

    #[serde(default = "default_hc_healthy_threshold")]
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_hc_interval(),
            timeout: default_hc_timeout(),
            path: default_hc_path(),
            unhealthy_threshold: default_hc_threshold(),
            healthy_threshold: default_hc_healthy_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_hc_interval() -> String {
    "10s".to_string()
}

fn default_hc_timeout() -> String {
    "2s".to_string()
}

fn default_hc_path() -> String {
    "/health".to_string()
}

fn default_hc_threshold() -> u32 {
    3
}

fn default_hc_healthy_threshold() -> u32 {
    2
}

impl HealthCheckConfig {
    pub fn interval_duration(&self) -> anyhow::Result<Duration> {
        super::duration::parse_duration_secs(&self.interval)
    }

    pub fn timeout_duration(&self) -> anyhow::Result<Duration> {
        super::duration::parse_duration_secs(&self.timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub file: Option<String>,
}

/// Selection policy named in configuration. Parsed once at startup into
/// `crate::balance::SelectionPolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    RoundRobin,
    LeastConnections,
    IpHash,
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" => Ok(Algorithm::RoundRobin),
            "least-connections" => Ok(Algorithm::LeastConnections),
            "ip-hash" => Ok(Algorithm::IpHash),
            other => Err(format!("unknown algorithm: {other}")),
        }
    }
}
