//! CLI configuration management
//!
//! Loads application configuration from a TOML file (an explicit `--config`
//! path, or `gigchat/config.toml` under the user config directory) and maps
//! it onto the client's `ClientConfig`. Command-line flags override file
//! values; every section is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gigchat_core::{ChatError, ClientConfig};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the gigchat CLI
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server connection settings
    pub server: ServerConfig,
    /// Chat session settings
    pub chat: ChatConfig,
    /// CLI behavior settings
    pub cli: CliSettings,
}

/// Server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base WebSocket URL of the chat server
    pub url: String,
    /// Handshake timeout in seconds
    pub connect_timeout_secs: u64,
    /// Maximum automatic reconnection attempts
    pub reconnect_attempts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8006".to_string(),
            connect_timeout_secs: 20,
            reconnect_attempts: 5,
        }
    }
}

/// Chat session settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChatConfig {
    /// Thread to join on startup when no `--thread` flag is given
    pub default_thread: Option<i64>,
    /// Auth token when no `--token` flag is given
    pub token: Option<String>,
}

/// CLI behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliSettings {
    /// Enable verbose logging output
    pub verbose: bool,
    /// Prompt shown before each input line
    pub prompt: String,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            prompt: "gigchat> ".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Loading
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration: an explicit path must exist; otherwise the
    /// default path is used when present, and defaults apply when not.
    pub fn load(explicit_path: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit_path {
            return Self::load_from_file(path);
        }
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.client_config().validate()?;
        Ok(config)
    }

    /// Default configuration file location
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gigchat").join("config.toml"))
    }

    /// Map the file settings onto the client configuration
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.server.url.clone());
        config.connect_timeout = Duration::from_secs(self.server.connect_timeout_secs);
        config.reconnect.max_attempts = self.server.reconnect_attempts;
        config
    }

    /// Example configuration file content
    pub fn example() -> String {
        let example = AppConfig {
            chat: ChatConfig {
                default_thread: Some(42),
                token: None,
            },
            ..Default::default()
        };
        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# failed to generate example config".to_string())
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ChatError),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.client_config().validate().is_ok());
        assert_eq!(config.server.url, "ws://localhost:8006");
        assert_eq!(config.cli.prompt, "gigchat> ");
    }

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chat]\ndefault_thread = 7").unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.chat.default_thread, Some(7));
        assert_eq!(config.server.reconnect_attempts, 5);
    }

    #[test]
    fn invalid_urls_are_rejected_at_load_time() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nurl = \"http://localhost:8006\"").unwrap();
        assert!(matches!(
            AppConfig::load_from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(matches!(
            AppConfig::load(Some("/nonexistent/gigchat.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn example_config_parses_back() {
        let example = AppConfig::example();
        let config: AppConfig = toml::from_str(&example).unwrap();
        assert_eq!(config.chat.default_thread, Some(42));
    }
}
