use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SERVER: &str = "http://localhost:8080";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub server: Option<String>,
    /// Presenter bearer token; participants need none
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub presenter_interval_ms: u64,
    pub participant_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// Consecutive failures before the connection banner is shown
    pub failure_banner_threshold: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            presenter_interval_ms: 2000,
            participant_interval_ms: 3000,
            request_timeout_secs: 10,
            failure_banner_threshold: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 30_000,
        }
    }
}

impl PollingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Keys accepted by `liveqa config set|get`
pub const CONFIG_KEYS: &[&str] = &[
    "server",
    "token",
    "presenter_interval_ms",
    "participant_interval_ms",
    "request_timeout_secs",
    "failure_banner_threshold",
    "backoff_base_ms",
    "backoff_max_ms",
];

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "liveqa", "liveqa")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn server(&self) -> &str {
        self.remote.server.as_deref().unwrap_or(DEFAULT_SERVER)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let polling = &mut self.polling;
        match key {
            "server" => self.remote.server = Some(value.trim_end_matches('/').to_string()),
            "token" => self.remote.token = Some(value.to_string()),
            "presenter_interval_ms" => polling.presenter_interval_ms = value.parse()?,
            "participant_interval_ms" => polling.participant_interval_ms = value.parse()?,
            "request_timeout_secs" => polling.request_timeout_secs = value.parse()?,
            "failure_banner_threshold" => polling.failure_banner_threshold = value.parse()?,
            "backoff_base_ms" => polling.backoff_base_ms = value.parse()?,
            "backoff_max_ms" => polling.backoff_max_ms = value.parse()?,
            _ => anyhow::bail!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Value for display; the token is masked
    pub fn get(&self, key: &str) -> Result<String> {
        let polling = &self.polling;
        let value = match key {
            "server" => self.server().to_string(),
            "token" => self.remote.token.as_ref().map(|_| "****").unwrap_or_default().to_string(),
            "presenter_interval_ms" => polling.presenter_interval_ms.to_string(),
            "participant_interval_ms" => polling.participant_interval_ms.to_string(),
            "request_timeout_secs" => polling.request_timeout_secs.to_string(),
            "failure_banner_threshold" => polling.failure_banner_threshold.to_string(),
            "backoff_base_ms" => polling.backoff_base_ms.to_string(),
            "backoff_max_ms" => polling.backoff_max_ms.to_string(),
            _ => anyhow::bail!("Unknown config key: {}", key),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_polling_section_uses_defaults() {
        let config: Config = toml::from_str("[remote]\nserver = \"http://qna.local\"\n").unwrap();
        assert_eq!(config.server(), "http://qna.local");
        assert_eq!(config.polling.presenter_interval_ms, 2000);
        assert_eq!(config.polling.participant_interval_ms, 3000);
        assert_eq!(config.polling.failure_banner_threshold, 3);
    }

    #[test]
    fn test_partial_polling_section_keeps_other_defaults() {
        let config: Config =
            toml::from_str("[polling]\nparticipant_interval_ms = 5000\n").unwrap();
        assert_eq!(config.polling.participant_interval_ms, 5000);
        assert_eq!(config.polling.backoff_max_ms, 30_000);
        assert_eq!(config.server(), DEFAULT_SERVER);
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("server", "http://qna.local:9000/").unwrap();
        config.set("token", "secret").unwrap();
        config.set("backoff_base_ms", "250").unwrap();

        assert_eq!(config.get("server").unwrap(), "http://qna.local:9000");
        assert_eq!(config.get("token").unwrap(), "****");
        assert_eq!(config.polling.backoff_base_ms, 250);
        assert!(config.set("backoff_base_ms", "soon").is_err());
        assert!(config.set("colour", "blue").is_err());
    }
}
