//! Session configuration.
//!
//! A [`SessionConfig`] is built once at startup and never changes for the
//! life of the session. The endpoint URL is derived from the page origin and
//! a context path: `<protocol>//<host><contextPath>/cometd`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use wstest_protocol::{ChannelName, ProtocolError};
use wstest_transport::{LogLevel, TransportOptions};

/// Context path the example server mounts its endpoint under.
pub const DEFAULT_CONTEXT_PATH: &str = "/ws";

/// Fixed suffix appended to the context path.
pub const COMETD_SUFFIX: &str = "/cometd";

/// Channel the bootstrapper subscribes to.
pub const DEFAULT_CHANNEL: &str = "/players";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The page origin could not be parsed.
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// The context path is malformed.
    #[error("Invalid context path: {0}")]
    InvalidContextPath(String),

    /// A channel name is malformed.
    #[error(transparent)]
    InvalidChannel(#[from] ProtocolError),

    /// A page dependency names a package that was not declared.
    #[error("Dependency {dep} is not in a declared package")]
    UnknownPackage {
        /// The offending module id.
        dep: String,
    },

    /// A package or module id is empty.
    #[error("Empty {0} name")]
    EmptyName(&'static str),

    /// A package is declared twice.
    #[error("Duplicate package: {0}")]
    DuplicatePackage(String),

    /// A 0/1 flag holds some other value.
    #[error("Flag {name} must be 0 or 1, got {value}")]
    InvalidFlag {
        /// Flag name.
        name: String,
        /// Value found.
        value: u8,
    },

    /// A build layer is malformed.
    #[error("Invalid layer {name}: {reason}")]
    InvalidLayer {
        /// Layer name.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A configuration file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A configuration file could not be parsed.
    #[error("Failed to parse {path}: {reason}")]
    Parse {
        /// File path.
        path: String,
        /// Parser message.
        reason: String,
    },
}

/// The origin of the page hosting the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Scheme including the trailing colon, e.g. `http:`.
    pub protocol: String,
    /// Host and optional port, e.g. `localhost:8080`.
    pub host: String,
}

impl Location {
    /// Create a location from its parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the protocol lacks its trailing colon, or the host
    /// is empty or carries path, query, fragment, or userinfo characters.
    pub fn new(protocol: impl Into<String>, host: impl Into<String>) -> Result<Self, ConfigError> {
        let protocol = protocol.into();
        let host = host.into();

        let scheme = protocol
            .strip_suffix(':')
            .ok_or_else(|| ConfigError::InvalidLocation(format!("protocol {protocol} must end with ':'")))?;
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
            return Err(ConfigError::InvalidLocation(format!("bad scheme in {protocol}")));
        }
        if host.is_empty()
            || host
                .chars()
                .any(|c| matches!(c, '/' | '?' | '#' | '@') || c.is_ascii_whitespace())
        {
            return Err(ConfigError::InvalidLocation(format!("bad host {host:?}")));
        }

        Ok(Self { protocol, host })
    }

    /// The origin string, e.g. `http://localhost:8080`.
    #[must_use]
    pub fn origin(&self) -> String {
        format!("{}//{}", self.protocol, self.host)
    }
}

impl FromStr for Location {
    type Err = ConfigError;

    /// Parse an origin such as `http://localhost:8080`. Any path, query, or
    /// fragment is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| ConfigError::InvalidLocation(s.to_string()))?;
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let host = &rest[..end];
        Self::new(format!("{scheme}:"), host)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}//{}", self.protocol, self.host)
    }
}

/// Immutable configuration for one client session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    location: Location,
    context_path: String,
    log_level: LogLevel,
    channel: ChannelName,
}

impl SessionConfig {
    /// Create a config for `location` with the default context path,
    /// `info` log level, and the `/players` channel.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in defaults; the `Result` covers the
    /// channel validation shared with [`SessionConfig::with_channel`].
    pub fn new(location: Location) -> Result<Self, ConfigError> {
        Ok(Self {
            location,
            context_path: DEFAULT_CONTEXT_PATH.to_string(),
            log_level: LogLevel::Info,
            channel: ChannelName::new(DEFAULT_CHANNEL)?,
        })
    }

    /// Set the context path. An empty path mounts the endpoint at the root.
    ///
    /// # Errors
    ///
    /// Returns an error unless the path is empty or starts with `/` and does
    /// not end with `/`.
    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Result<Self, ConfigError> {
        let context_path = context_path.into();
        let valid = context_path.is_empty()
            || (context_path.starts_with('/')
                && !context_path.ends_with('/')
                && !context_path.chars().any(|c| c.is_ascii_whitespace() || c == '?' || c == '#'));
        if !valid {
            return Err(ConfigError::InvalidContextPath(context_path));
        }
        self.context_path = context_path;
        Ok(self)
    }

    /// Set the transport log level.
    #[must_use]
    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    /// Set the channel `initialize` subscribes to.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel name is invalid.
    pub fn with_channel(mut self, channel: &str) -> Result<Self, ConfigError> {
        self.channel = ChannelName::new(channel)?;
        Ok(self)
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[must_use]
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    #[must_use]
    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// The endpoint URL: `<protocol>//<host><contextPath>/cometd`.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "{}//{}{}{}",
            self.location.protocol, self.location.host, self.context_path, COMETD_SUFFIX
        )
    }

    /// Options handed to [`wstest_transport::Transport::configure`].
    #[must_use]
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            url: self.url(),
            log_level: self.log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost() -> Location {
        "http://localhost:8080".parse().unwrap()
    }

    #[test]
    fn test_location_parse() {
        let location: Location = "https://example.com:8443/app/index.html".parse().unwrap();
        assert_eq!(location.protocol, "https:");
        assert_eq!(location.host, "example.com:8443");
        assert_eq!(location.origin(), "https://example.com:8443");
    }

    #[test]
    fn test_location_invalid() {
        assert!("localhost:8080".parse::<Location>().is_err());
        assert!("http://".parse::<Location>().is_err());
        assert!(Location::new("http", "localhost").is_err());
        assert!(Location::new("http:", "").is_err());
        assert!(Location::new("http:", "localhost?debug=1").is_err());
        assert!(Location::new("http:", "localhost#top").is_err());
        assert!(Location::new("http:", "user@localhost").is_err());
        assert!("http://user:pw@localhost".parse::<Location>().is_err());
    }

    #[test]
    fn test_location_drops_query_and_fragment() {
        for input in [
            "http://localhost:8080?debug=1",
            "http://localhost:8080#players",
            "http://localhost:8080/index.html?debug=1#players",
        ] {
            let location: Location = input.parse().unwrap();
            assert_eq!(location.host, "localhost:8080");
            let config = SessionConfig::new(location).unwrap();
            assert_eq!(config.url(), "http://localhost:8080/ws/cometd");
        }
    }

    #[test]
    fn test_url_with_ws_context_path() {
        let config = SessionConfig::new(localhost()).unwrap();
        assert_eq!(config.context_path(), "/ws");
        assert_eq!(config.url(), "http://localhost:8080/ws/cometd");

        let secure = SessionConfig::new(Location::new("https:", "bus.example.com").unwrap()).unwrap();
        assert_eq!(secure.url(), "https://bus.example.com/ws/cometd");
    }

    #[test]
    fn test_url_with_other_context_paths() {
        let root = SessionConfig::new(localhost())
            .unwrap()
            .with_context_path("")
            .unwrap();
        assert_eq!(root.url(), "http://localhost:8080/cometd");

        let nested = SessionConfig::new(localhost())
            .unwrap()
            .with_context_path("/app/bus")
            .unwrap();
        assert_eq!(nested.url(), "http://localhost:8080/app/bus/cometd");
    }

    #[test]
    fn test_invalid_context_path() {
        let config = SessionConfig::new(localhost()).unwrap();
        assert!(config.clone().with_context_path("ws").is_err());
        assert!(config.clone().with_context_path("/ws/").is_err());
        assert!(config.with_context_path("/ws?x=1").is_err());
    }

    #[test]
    fn test_defaults_and_overrides() {
        let config = SessionConfig::new(localhost()).unwrap();
        assert_eq!(config.channel().as_str(), "/players");
        assert_eq!(config.log_level(), LogLevel::Info);

        let config = config
            .with_log_level(LogLevel::Debug)
            .with_channel("/scores")
            .unwrap();
        let options = config.transport_options();
        assert_eq!(options.log_level, LogLevel::Debug);
        assert_eq!(options.url, "http://localhost:8080/ws/cometd");
        assert_eq!(config.channel().as_str(), "/scores");
    }

    #[test]
    fn test_invalid_channel() {
        let config = SessionConfig::new(localhost()).unwrap();
        assert!(matches!(
            config.with_channel("players"),
            Err(ConfigError::InvalidChannel(_))
        ));
    }
}
