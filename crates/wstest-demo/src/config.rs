//! Client configuration.
//!
//! Configuration can be loaded from:
//! - A TOML file (`--config`, or the first of the default paths that exists)
//! - Environment variables (`WSTEST_SECTION__KEY`, e.g.
//!   `WSTEST_SESSION__LOCATION=https://bus.example.com`)
//! - Command line overrides applied by the `run` command

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wstest_core::config::{ConfigError, DEFAULT_CHANNEL, DEFAULT_CONTEXT_PATH};
use wstest_core::{Location, PageConfig, SessionConfig};
use wstest_protocol::{ConnectionType, PROTOCOL_VERSION};
use wstest_transport::{LogLevel, LoopbackConfig};

/// Default configuration file locations, in search order.
const CONFIG_PATHS: [&str; 3] = [
    "wstest.toml",
    "/etc/wstest/wstest.toml",
    "~/.config/wstest/wstest.toml",
];

/// Client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Session settings.
    #[serde(default)]
    pub session: SessionSection,

    /// Page loader settings.
    #[serde(default)]
    pub page: PageConfig,

    /// Loopback transport settings.
    #[serde(default)]
    pub loopback: LoopbackSection,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Origin of the hosting page.
    #[serde(default = "default_location")]
    pub location: String,

    /// Path the endpoint is mounted under.
    #[serde(default = "default_context_path")]
    pub context_path: String,

    /// Transport log level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Channel to subscribe to.
    #[serde(default = "default_channel")]
    pub channel: String,
}

/// Loopback transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopbackSection {
    /// Whether handshakes succeed.
    #[serde(default = "default_true")]
    pub accept_handshakes: bool,

    /// Greet new subscriptions.
    #[serde(default = "default_true")]
    pub welcome: bool,

    /// Connection types the loopback offers.
    #[serde(default = "default_connection_types")]
    pub connection_types: Vec<ConnectionType>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_location() -> String {
    "http://localhost:8080".to_string()
}

fn default_context_path() -> String {
    DEFAULT_CONTEXT_PATH.to_string()
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_connection_types() -> Vec<ConnectionType> {
    vec![ConnectionType::Websocket]
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            location: default_location(),
            context_path: default_context_path(),
            log_level: LogLevel::default(),
            channel: default_channel(),
        }
    }
}

impl Default for LoopbackSection {
    fn default() -> Self {
        Self {
            accept_handshakes: true,
            welcome: true,
            connection_types: default_connection_types(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl SessionSection {
    /// Build the immutable session config.
    ///
    /// # Errors
    ///
    /// Returns an error if the location, context path, or channel is invalid.
    pub fn to_session_config(&self) -> Result<SessionConfig, ConfigError> {
        let location: Location = self.location.parse()?;
        Ok(SessionConfig::new(location)?
            .with_context_path(self.context_path.as_str())?
            .with_log_level(self.log_level)
            .with_channel(&self.channel)?)
    }
}

impl LoopbackSection {
    /// Build the loopback transport config.
    #[must_use]
    pub fn to_loopback_config(&self) -> LoopbackConfig {
        LoopbackConfig {
            accept_handshakes: self.accept_handshakes,
            welcome: self.welcome,
            supported_connection_types: self.connection_types.clone(),
            version: PROTOCOL_VERSION,
        }
    }
}

impl Config {
    /// The file `load` reads: `path` when given, otherwise the first default
    /// path that exists.
    #[must_use]
    pub fn file(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(path) => Some(path.to_path_buf()),
            None => CONFIG_PATHS
                .iter()
                .map(|candidate| PathBuf::from(shellexpand::tilde(candidate).into_owned()))
                .find(|candidate| candidate.exists()),
        }
    }

    /// Load configuration from [`Config::file`], then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or any source cannot
    /// be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        let file = Self::file(path);
        if let Some(file) = &file {
            builder = builder.add_source(
                config::File::from(file.as_path())
                    .format(config::FileFormat::Toml)
                    .required(path.is_some()),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix("WSTEST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let source = file.map_or_else(|| "defaults".to_string(), |f| f.display().to_string());
        builder
            .build()
            .with_context(|| format!("Failed to load config from {}", source))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse config from {}", source))
    }
}
