use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

use crate::poll::PollPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub auth: AuthConfig,
    pub directory: DirectoryConfig,
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Timezone used when shifting event times of day
    pub timezone: String,
    /// Where mail stories send their messages; defaults to the signed-in user
    pub recipient_email: Option<String>,
    /// Per-request timeout for service calls
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Application (client) id registered with Azure AD
    pub client_id: String,
    pub common_authority: String,
    pub discovery_resource_id: String,
    pub discovery_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub resource_id: String,
    pub endpoint: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
    /// How far before the poll started a message may have been received
    pub lookback_secs: u64,
    /// Optional hard ceiling on the whole poll
    pub timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig {
                timezone: "UTC".to_string(),
                recipient_email: None,
                http_timeout_secs: 30,
            },
            auth: AuthConfig {
                client_id: String::new(),
                common_authority: "https://login.microsoftonline.com/common".to_string(),
                discovery_resource_id: "https://api.office.com/discovery/".to_string(),
                discovery_endpoint: "https://api.office.com/discovery/v1.0/me/".to_string(),
            },
            directory: DirectoryConfig {
                resource_id: "https://graph.windows.net/".to_string(),
                endpoint: "https://graph.windows.net/".to_string(),
                api_version: "1.6".to_string(),
            },
            polling: PollingConfig {
                max_attempts: 10,
                interval_ms: 200,
                lookback_secs: 60,
                timeout_ms: None,
            },
        }
    }
}

impl Config {
    /// Load from an explicit path or the default location, writing defaults
    /// when no file exists yet.
    pub async fn load(path: Option<&Path>) -> Result<Config> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path()?,
        };

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            toml::from_str(&content)
                .with_context(|| "Failed to parse config file")?
        } else {
            info!("Config file not found, creating default configuration");
            let default_config = Config::default();
            default_config.save_to(&config_path).await?;
            default_config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Fill an empty client id from the environment
    fn apply_env_overrides(&mut self) {
        if self.auth.client_id.is_empty() {
            if let Ok(client_id) = std::env::var("O365_CLIENT_ID") {
                debug!("Using client id from O365_CLIENT_ID");
                self.auth.client_id = client_id;
            }
        }
    }

    pub async fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(config_path, content).await
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Configuration saved to {:?}", config_path);
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("o365-snippets");

        Ok(config_dir.join("config.toml"))
    }

    pub fn get_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
            .context("Failed to get data directory")?
            .join("o365-snippets");

        Ok(data_dir)
    }

    pub fn get_token_cache_path() -> Result<PathBuf> {
        Ok(Self::get_data_dir()?.join("token_cache.json"))
    }

    /// Get timezone as parsed Tz object, falling back to UTC if invalid
    pub fn get_timezone(&self) -> chrono_tz::Tz {
        self.general.timezone.parse::<chrono_tz::Tz>()
            .unwrap_or(chrono_tz::UTC)
    }

    pub fn get_http_timeout(&self) -> Duration {
        Duration::from_secs(self.general.http_timeout_secs)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            max_attempts: self.polling.max_attempts,
            interval: Duration::from_millis(self.polling.interval_ms),
            lookback: Duration::from_secs(self.polling.lookback_secs),
            timeout: self.polling.timeout_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).await.unwrap();

        assert!(path.exists());
        assert_eq!(config.polling.max_attempts, 10);
        assert_eq!(config.directory.api_version, "1.6");
    }

    #[tokio::test]
    async fn test_load_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut custom = Config::default();
        custom.auth.client_id = "11111111-2222-3333-4444-555555555555".to_string();
        custom.polling.interval_ms = 50;
        custom.general.timezone = "Europe/Paris".to_string();
        custom.save_to(&path).await.unwrap();

        let loaded = Config::load(Some(&path)).await.unwrap();
        assert_eq!(loaded.auth.client_id, "11111111-2222-3333-4444-555555555555");
        assert_eq!(loaded.poll_policy().interval, Duration::from_millis(50));
        assert_eq!(loaded.get_timezone(), chrono_tz::Europe::Paris);
    }

    #[test]
    fn test_default_poll_policy_matches_fixed_bound() {
        let policy = Config::default().poll_policy();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.interval, Duration::from_millis(200));
        assert_eq!(policy.lookback, Duration::from_secs(60));
        assert!(policy.timeout.is_none());
    }

    #[test]
    fn test_config_with_log_level_still_parses() {
        let written = toml::to_string(&Config::default()).unwrap();
        assert!(!written.contains("log_level"));

        // verbosity comes from --debug and RUST_LOG, older files may carry it
        let older = written.replace("[general]\n", "[general]\nlog_level = \"debug\"\n");
        let parsed: Config = toml::from_str(&older).unwrap();
        assert_eq!(parsed.general.timezone, "UTC");
    }

    #[test]
    fn test_invalid_timezone_falls_back_to_utc() {
        let mut config = Config::default();
        config.general.timezone = "Mars/Olympus".to_string();
        assert_eq!(config.get_timezone(), chrono_tz::UTC);
    }
}
