use brigade_common::StoreConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "BRIGADE_VIEWER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "viewer.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// WebSocket URL of the backend's live channel
    #[serde(default = "default_live_url")]
    pub live_url: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// How far back each poll reads the store
    #[serde(default = "default_poll_window_minutes")]
    pub poll_window_minutes: u64,

    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    #[serde(default = "default_animation_steps")]
    pub animation_steps: u32,

    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Polling fallback is disabled when absent
    #[serde(default)]
    pub store: Option<StoreConfig>,
}

fn default_live_url() -> String {
    "ws://127.0.0.1:3000/ws".to_string()
}

fn default_poll_interval_secs() -> u64 {
    15
}

fn default_poll_window_minutes() -> u64 {
    720
}

fn default_frame_interval_ms() -> u64 {
    50
}

fn default_animation_steps() -> u32 {
    15
}

fn default_reconnect_interval_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            live_url: default_live_url(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_window_minutes: default_poll_window_minutes(),
            frame_interval_ms: default_frame_interval_ms(),
            animation_steps: default_animation_steps(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            store: None,
        }
    }
}

impl ViewerConfig {
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: ViewerConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse viewer config: {}", e))?;
        if config.frame_interval_ms == 0 || config.poll_interval_secs == 0 {
            anyhow::bail!("frame_interval_ms and poll_interval_secs must be greater than zero");
        }
        Ok(config)
    }

    /// Read the file named by `BRIGADE_VIEWER_CONFIG`, else `viewer.toml`.
    /// A missing default file means built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
                Self::from_toml(&content)
            }
            Err(_) => match std::fs::read_to_string(DEFAULT_CONFIG_PATH) {
                Ok(content) => Self::from_toml(&content),
                Err(_) => Ok(Self::default()),
            },
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_window(&self) -> Duration {
        Duration::from_secs(self.poll_window_minutes.saturating_mul(60))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::from_toml("").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.animation_steps, 15);
        assert!(config.store.is_none());
    }

    #[test]
    fn test_store_enables_polling() {
        let config = ViewerConfig::from_toml(
            r#"
            live_url = "ws://tracker.local/ws"

            [store]
            url = "https://store.example.com"
            api_key = "anon"
            "#,
        )
        .unwrap();

        assert_eq!(config.live_url, "ws://tracker.local/ws");
        assert_eq!(config.store.unwrap().positions_table, "ubicaciones");
    }

    #[test]
    fn test_huge_poll_window_saturates() {
        let config = ViewerConfig::from_toml("poll_window_minutes = 9223372036854775807").unwrap();
        assert_eq!(config.poll_window(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_rejects_zero_frame_interval() {
        assert!(ViewerConfig::from_toml("frame_interval_ms = 0").is_err());
    }
}
