use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote document-store settings
    pub remote: RemoteConfig,
    /// Serving temperature menu, in display order. The first entry is the
    /// default selection.
    pub temperatures: Vec<String>,
}

/// Connection settings for the remote document store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub server_url: Option<String>,
    pub api_key: Option<String>,
}

impl RemoteConfig {
    /// True when both a server URL and an API key are present.
    pub fn is_configured(&self) -> bool {
        self.server_url.is_some() && self.api_key.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            temperatures: vec!["hot".to_string(), "warm".to_string(), "iced".to_string()],
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Self::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        // Apply environment variable overrides
        if let Ok(server_url) = std::env::var("BREWMIX_SERVER_URL") {
            config.remote.server_url = Some(server_url);
        }
        if let Ok(api_key) = std::env::var("BREWMIX_API_KEY") {
            config.remote.api_key = Some(api_key);
        }

        Ok(config)
    }

    /// Default config file path: ~/.config/brewmix/config.yaml
    pub fn default_config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".config")
            .join("brewmix")
            .join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
