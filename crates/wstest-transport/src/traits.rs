//! Transport client contract for wstest.
//!
//! The session bootstrapper only talks to a message bus through this trait,
//! so the concrete transport (an in-process loopback, a websocket client, a
//! test double) can be swapped freely.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use wstest_protocol::{ChannelName, EventMessage, HandshakeReply};

/// Callback invoked once per inbound message on a subscribed channel.
pub type Listener = Arc<dyn Fn(&EventMessage) + Send + Sync>;

/// Key returned by a subscribe call and handed back to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey(pub String);

impl SubscriptionKey {
    /// Create a new subscription key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SubscriptionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubscriptionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Transport log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// Name of the level as used in configuration and filter directives.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(TransportError::Other(format!("Unknown log level: {other}"))),
        }
    }
}

/// Options passed to [`Transport::configure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Absolute endpoint URL, e.g. `http://localhost:8080/ws/cometd`.
    pub url: String,
    /// Transport log verbosity.
    pub log_level: LogLevel,
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An operation was attempted before `configure`.
    #[error("Transport not configured")]
    NotConfigured,

    /// An operation needs a completed handshake.
    #[error("No handshake has completed")]
    NotHandshaken,

    /// The server refused a subscribe request.
    #[error("Subscribe to {channel} rejected: {reason}")]
    SubscribeRejected {
        /// Channel that was refused.
        channel: String,
        /// Reason reported by the server.
        reason: String,
    },

    /// The key does not name a live subscription.
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(SubscriptionKey),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] wstest_protocol::ProtocolError),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// A client-side pub/sub transport.
///
/// Transports own the connection to the message bus: handshake negotiation,
/// framing, reconnection. Callers only see these four operations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Set the endpoint URL and log verbosity.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are unusable by this transport.
    fn configure(&self, options: TransportOptions) -> Result<(), TransportError>;

    /// Perform the handshake and return the server's reply.
    ///
    /// A reply with `successful: false` is a normal return, not an error.
    async fn handshake(&self) -> Result<HandshakeReply, TransportError>;

    /// Subscribe `listener` to `channel`.
    async fn subscribe(
        &self,
        channel: &ChannelName,
        listener: Listener,
    ) -> Result<SubscriptionKey, TransportError>;

    /// Remove the subscription identified by `key`.
    async fn unsubscribe(&self, key: &SubscriptionKey) -> Result<(), TransportError>;

    /// Get the transport name (e.g., "loopback", "websocket").
    fn name(&self) -> &'static str;
}
