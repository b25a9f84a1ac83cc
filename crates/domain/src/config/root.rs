use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use super::forward::ForwardConfig;
use super::logging::LoggingConfig;
use crate::resolver_spec::ResolverSpec;

const LOCAL_CONFIG_PATH: &str = "ferrous-forward.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/ferrous-forward/config.toml";

/// Main configuration structure for Ferrous Forward
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Upstream forwarding configuration
    #[serde(default)]
    pub forward: ForwardConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. ferrous-forward.toml in current directory
    /// 3. /etc/ferrous-forward/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new(LOCAL_CONFIG_PATH).exists() {
            Self::from_file(LOCAL_CONFIG_PATH)?
        } else if std::path::Path::new(SYSTEM_CONFIG_PATH).exists() {
            Self::from_file(SYSTEM_CONFIG_PATH)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if !overrides.upstream_servers.is_empty() {
            self.forward.upstream_servers = overrides.upstream_servers;
        }
        if let Some(timeout) = overrides.query_timeout_ms {
            self.forward.query_timeout_ms = timeout;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if overrides.debug_send {
            self.forward.debug_send = true;
        }
    }

    /// Parses every configured upstream into a [`ResolverSpec`].
    pub fn resolvers(&self) -> Result<Vec<ResolverSpec>, ConfigError> {
        self.forward
            .upstream_servers
            .iter()
            .map(|s| {
                s.parse::<ResolverSpec>()
                    .map_err(|e| ConfigError::Validation(e.to_string()))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forward.upstream_servers.is_empty() {
            return Err(ConfigError::Validation(
                "No upstream servers configured".to_string(),
            ));
        }

        self.resolvers()?;

        if self.forward.max_udp_response_bytes < 512 {
            return Err(ConfigError::Validation(format!(
                "max_udp_response_bytes must be at least 512, got {}",
                self.forward.max_udp_response_bytes
            )));
        }

        if self.forward.query_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "query_timeout_ms cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub upstream_servers: Vec<String>,
    pub query_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
    pub debug_send: bool,
}
