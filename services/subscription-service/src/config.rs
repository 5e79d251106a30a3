use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::limits::AgentFloors;
use crate::storage::ConnectionConfig;

/// Headroom the HTTP timeout leaves past the store deadline, so a stalled
/// store is reported through `status` before the transport gives up.
pub const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub server_host: String,
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub database: String,
    pub collection: String,
    pub store_timeout_secs: u64,
    pub minimum_agents: i64,
    pub minimum_grandfathered_agents: i64,
    pub development: bool,
    pub log_level: String,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8190,
            data_dir: PathBuf::from("data/subscription"),
            database: "k8sdeploy".to_string(),
            collection: "subs".to_string(),
            store_timeout_secs: 10,
            minimum_agents: 2,
            minimum_grandfathered_agents: 10,
            development: false,
            log_level: "info".to_string(),
        }
    }
}

impl SubscriptionConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(host) = env::var("SUBSCRIPTION_HOST") {
            cfg.server_host = host;
        }
        if let Ok(port) = env::var("SUBSCRIPTION_PORT") {
            cfg.server_port = port
                .parse()
                .context("SUBSCRIPTION_PORT must be a valid u16")?;
        }
        if let Ok(dir) = env::var("STORE_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(database) = env::var("STORE_DATABASE") {
            cfg.database = database;
        }
        if let Ok(collection) = env::var("STORE_COLLECTION") {
            cfg.collection = collection;
        }
        if let Ok(timeout) = env::var("STORE_TIMEOUT_SECS") {
            cfg.store_timeout_secs = timeout
                .parse()
                .context("STORE_TIMEOUT_SECS must be a positive integer")?;
        }
        if let Ok(minimum) = env::var("MINIMUM_AGENTS") {
            cfg.minimum_agents = minimum
                .parse()
                .context("MINIMUM_AGENTS must be an integer")?;
        }
        if let Ok(minimum) = env::var("MINIMUM_GRANDFATHERED_AGENTS") {
            cfg.minimum_grandfathered_agents = minimum
                .parse()
                .context("MINIMUM_GRANDFATHERED_AGENTS must be an integer")?;
        }
        if let Ok(flag) = env::var("DEVELOPMENT") {
            cfg.development = parse_bool(&flag)
                .with_context(|| format!("DEVELOPMENT is invalid: {flag}"))?;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            cfg.log_level = level;
        }

        cfg.validate()?;
        ensure_directory(&cfg.data_dir)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.minimum_agents < 0 {
            anyhow::bail!("MINIMUM_AGENTS must not be negative");
        }
        if self.minimum_grandfathered_agents < 0 {
            anyhow::bail!("MINIMUM_GRANDFATHERED_AGENTS must not be negative");
        }
        if self.database.trim().is_empty() {
            anyhow::bail!("STORE_DATABASE cannot be empty");
        }
        if self.collection.trim().is_empty() {
            anyhow::bail!("STORE_COLLECTION cannot be empty");
        }
        if self.store_timeout_secs == 0 {
            anyhow::bail!("STORE_TIMEOUT_SECS must be greater than zero");
        }

        Ok(())
    }

    pub fn floors(&self) -> AgentFloors {
        AgentFloors {
            minimum_agents: self.minimum_agents,
            minimum_grandfathered_agents: self.minimum_grandfathered_agents,
        }
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            data_dir: self.data_dir.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        self.store_timeout() + REQUEST_TIMEOUT_MARGIN
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("{} exists but is not a directory", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("unable to create data directory {}", path.display()))?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => anyhow::bail!("invalid boolean value {value}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_floors() {
        let config = SubscriptionConfig::default();
        assert_eq!(
            config.floors(),
            AgentFloors {
                minimum_agents: 2,
                minimum_grandfathered_agents: 10,
            }
        );
        assert_eq!(config.connection().collection, "subs");
    }

    #[test]
    fn test_config_validation() {
        let mut config = SubscriptionConfig::default();
        assert!(config.validate().is_ok());

        config.minimum_agents = -1;
        assert!(config.validate().is_err());
        config.minimum_agents = 2;

        config.minimum_grandfathered_agents = -5;
        assert!(config.validate().is_err());
        config.minimum_grandfathered_agents = 10;

        config.collection = "  ".to_string();
        assert!(config.validate().is_err());
        config.collection = "subs".to_string();

        config.store_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.store_timeout_secs = 10;

        // zero floors are allowed
        config.minimum_agents = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("YES").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_request_timeout_outlasts_store_timeout() {
        let mut config = SubscriptionConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(15));

        config.store_timeout_secs = 60;
        assert!(config.request_timeout() > config.store_timeout());
    }

    #[test]
    fn test_listen_addr() {
        let config = SubscriptionConfig::default();
        assert_eq!(config.listen_addr(), "127.0.0.1:8190");
    }
}
