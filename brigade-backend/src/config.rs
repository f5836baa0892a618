use brigade_common::StoreConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "BRIGADE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Liveness probe period; a session is dropped after missing one full cycle
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Outbound messages buffered per viewer before it is disconnected
    #[serde(default = "default_session_queue_capacity")]
    pub session_queue_capacity: usize,

    /// Forget units that have not reported for this long. Unset = keep forever.
    #[serde(default)]
    pub unit_ttl_secs: Option<u64>,

    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,

    /// How far back to read the store when seeding the cache at startup
    #[serde(default = "default_warmup_window_minutes")]
    pub warmup_window_minutes: u64,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    #[serde(default)]
    pub store: StoreConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_probe_interval_secs() -> u64 {
    30
}

fn default_session_queue_capacity() -> usize {
    256
}

fn default_eviction_interval_secs() -> u64 {
    60
}

fn default_warmup_window_minutes() -> u64 {
    720
}

fn default_enable_cors() -> bool {
    true
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            probe_interval_secs: default_probe_interval_secs(),
            session_queue_capacity: default_session_queue_capacity(),
            unit_ttl_secs: None,
            eviction_interval_secs: default_eviction_interval_secs(),
            warmup_window_minutes: default_warmup_window_minutes(),
            enable_cors: default_enable_cors(),
            store: StoreConfig::default(),
        }
    }
}

impl BackendConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: BackendConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file named by `BRIGADE_CONFIG`, else `config.toml`.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(&path)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.probe_interval_secs == 0 {
            anyhow::bail!("probe_interval_secs must be greater than zero");
        }
        if self.session_queue_capacity == 0 {
            anyhow::bail!("session_queue_capacity must be greater than zero");
        }
        if self.unit_ttl_secs.is_some() && self.eviction_interval_secs == 0 {
            anyhow::bail!("eviction_interval_secs must be greater than zero when unit_ttl_secs is set");
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn unit_ttl(&self) -> Option<Duration> {
        self.unit_ttl_secs.map(Duration::from_secs)
    }

    pub fn warmup_window(&self) -> Duration {
        Duration::from_secs(self.warmup_window_minutes.saturating_mul(60))
    }
}
