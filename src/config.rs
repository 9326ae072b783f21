//! Console settings
//!
//! A small TOML file that tells the console where the `bp` web backend lives,
//! which role the managed proxy runs in and how requests are wrapped. The
//! settings are read once at startup; the [`DeploymentRole`] found here is
//! handed to every controller and never changes afterwards.
//!
//! ```toml
//! base_url = "http://127.0.0.1:8080"
//! role = "client"
//! crypto = "none"
//! request_timeout_ms = 10000
//!
//! [logs]
//! poll_interval_ms = 2000
//! scroll_delay_ms = 20
//! auto_refresh = false
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

const SETTINGS_DIR: &str = "bp-console";
const SETTINGS_FILE: &str = "console.toml";

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV: &str = "BP_CONSOLE_SETTINGS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write settings file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Role of the managed proxy process.
///
/// Decides which configuration fields are legal and whether TLS files can
/// be provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentRole {
    #[default]
    Client,
    Server,
}

impl DeploymentRole {
    pub fn is_client(self) -> bool {
        self == DeploymentRole::Client
    }

    pub fn is_server(self) -> bool {
        self == DeploymentRole::Server
    }
}

impl fmt::Display for DeploymentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentRole::Client => write!(f, "CLIENT"),
            DeploymentRole::Server => write!(f, "SERVER"),
        }
    }
}

/// Symmetric wrapping applied to request and response payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CryptoMethod {
    #[default]
    None,
    Base64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Auto-refresh period of the log tail
    pub poll_interval_ms: u64,
    /// Delay between a finished fetch and the scroll-to-bottom
    pub scroll_delay_ms: u64,
    /// Start with auto-refresh enabled
    pub auto_refresh: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            scroll_delay_ms: 20,
            auto_refresh: false,
        }
    }
}

impl LogSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub base_url: String,
    pub role: DeploymentRole,
    pub crypto: CryptoMethod,
    pub request_timeout_ms: u64,
    /// Sent verbatim as the `Cookie` header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    /// Answers the hostname prompt of TLS provisioning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_hostname: Option<String>,
    pub logs: LogSettings,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            role: DeploymentRole::default(),
            crypto: CryptoMethod::default(),
            request_timeout_ms: 10_000,
            cookie: None,
            tls_hostname: None,
            logs: LogSettings::default(),
        }
    }
}

impl ConsoleSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| SettingsError::Invalid(format!("base_url {}: {}", self.base_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SettingsError::Invalid(format!(
                "base_url must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(SettingsError::Invalid(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.logs.poll_interval_ms == 0 {
            return Err(SettingsError::Invalid(
                "logs.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        let settings: ConsoleSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub async fn load_from(path: &Path) -> Result<Self, SettingsError> {
        debug!("Loading console settings from {}", path.display());
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
        Self::parse(&content)
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SettingsError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|source| SettingsError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Console settings written to {}", path.display());
        Ok(())
    }

    /// Loads the settings file, writing the defaults first when it is missing.
    pub async fn load_or_create(path: &Path) -> Result<Self, SettingsError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        if !exists {
            info!("Creating default console settings at {}", path.display());
            let settings = ConsoleSettings::default();
            settings.save_to(path).await?;
            return Ok(settings);
        }

        Self::load_from(path).await
    }
}

/// Location of the settings file, honouring [`SETTINGS_ENV`].
pub fn settings_path() -> PathBuf {
    if let Ok(path) = std::env::var(SETTINGS_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    let mut base = dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
    base.push(SETTINGS_DIR);
    base.push(SETTINGS_FILE);
    base
}
