//! Message types for the Bayeux protocol.
//!
//! Every Bayeux message is a JSON object carrying a `channel` field. Meta
//! messages (`/meta/*`) drive the session; event messages carry application
//! data on ordinary channels.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::channel::{
    ChannelName, META_CONNECT, META_DISCONNECT, META_HANDSHAKE, META_SUBSCRIBE, META_UNSUBSCRIBE,
};
use crate::version::{Version, MINIMUM_VERSION, PROTOCOL_VERSION};

/// Default advice interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 60_000;

/// Connection types a Bayeux client and server can negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionType {
    Websocket,
    LongPolling,
    CallbackPolling,
    Iframe,
    Flash,
    /// Any connection type this client does not know about.
    #[serde(other)]
    Unsupported,
}

impl ConnectionType {
    /// Wire name of the connection type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Websocket => "websocket",
            ConnectionType::LongPolling => "long-polling",
            ConnectionType::CallbackPolling => "callback-polling",
            ConnectionType::Iframe => "iframe",
            ConnectionType::Flash => "flash",
            ConnectionType::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconnect policy advised by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reconnect {
    /// Retry the connect on the same session.
    Retry,
    /// Start over with a new handshake.
    Handshake,
    /// Do not reconnect.
    None,
}

/// Server or client advice attached to meta messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect: Option<Reconnect>,
    /// Delay before the next connect, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    /// Long-poll hold time, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Advice {
    /// Advice telling the client to retry after `interval` milliseconds.
    #[must_use]
    pub fn retry(interval: u64) -> Self {
        Self {
            reconnect: Some(Reconnect::Retry),
            interval: Some(interval),
            timeout: None,
        }
    }
}

/// Handshake request sent on `/meta/handshake`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    pub channel: String,
    pub version: Version,
    pub minimum_version: Version,
    pub supported_connection_types: Vec<ConnectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl HandshakeRequest {
    /// Create a handshake request advertising the given connection types.
    #[must_use]
    pub fn new(supported_connection_types: Vec<ConnectionType>) -> Self {
        Self {
            channel: META_HANDSHAKE.to_string(),
            version: PROTOCOL_VERSION,
            minimum_version: MINIMUM_VERSION,
            supported_connection_types,
            advice: Some(Advice {
                reconnect: None,
                interval: Some(DEFAULT_INTERVAL_MS),
                timeout: None,
            }),
            id: None,
        }
    }

    /// Attach a message id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Handshake reply received on `/meta/handshake`.
///
/// Only `successful` is guaranteed. Anything the server adds beyond the
/// known fields is kept in `ext`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeReply {
    #[serde(default = "default_handshake_channel")]
    pub channel: String,
    pub successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_version: Option<Version>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_connection_types: Vec<ConnectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_successful: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
    #[serde(flatten)]
    pub ext: Map<String, Value>,
}

fn default_handshake_channel() -> String {
    META_HANDSHAKE.to_string()
}

impl HandshakeReply {
    /// A successful reply assigning `client_id`.
    #[must_use]
    pub fn accepted(
        client_id: impl Into<String>,
        supported_connection_types: Vec<ConnectionType>,
    ) -> Self {
        Self {
            channel: META_HANDSHAKE.to_string(),
            successful: true,
            client_id: Some(client_id.into()),
            version: Some(PROTOCOL_VERSION),
            minimum_version: Some(MINIMUM_VERSION),
            supported_connection_types,
            auth_successful: Some(true),
            error: None,
            id: None,
            advice: Some(Advice::retry(0)),
            ext: Map::new(),
        }
    }

    /// A failed reply carrying an error description.
    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            channel: META_HANDSHAKE.to_string(),
            successful: false,
            client_id: None,
            version: Some(PROTOCOL_VERSION),
            minimum_version: Some(MINIMUM_VERSION),
            supported_connection_types: Vec::new(),
            auth_successful: None,
            error: Some(error.into()),
            id: None,
            advice: Some(Advice {
                reconnect: Some(Reconnect::None),
                interval: None,
                timeout: None,
            }),
            ext: Map::new(),
        }
    }

    /// Echo the id of the request this reply answers.
    #[must_use]
    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    /// Human-readable reason for a failed handshake.
    #[must_use]
    pub fn failure_reason(&self) -> String {
        match (&self.error, self.auth_successful) {
            (Some(error), _) => error.clone(),
            (None, Some(false)) => "authentication failed".to_string(),
            (None, _) => "handshake unsuccessful".to_string(),
        }
    }
}

/// Subscribe request sent on `/meta/subscribe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub channel: String,
    pub client_id: String,
    pub subscription: ChannelName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SubscribeRequest {
    /// Create a subscribe request.
    #[must_use]
    pub fn new(client_id: impl Into<String>, subscription: ChannelName) -> Self {
        Self {
            channel: META_SUBSCRIBE.to_string(),
            client_id: client_id.into(),
            subscription,
            id: None,
        }
    }

    /// Turn this into the matching unsubscribe request.
    #[must_use]
    pub fn into_unsubscribe(self) -> UnsubscribeRequest {
        UnsubscribeRequest {
            channel: META_UNSUBSCRIBE.to_string(),
            ..self
        }
    }
}

/// Subscribe reply received on `/meta/subscribe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeReply {
    pub channel: String,
    pub client_id: String,
    pub subscription: ChannelName,
    pub successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SubscribeReply {
    /// A successful reply to `request`.
    #[must_use]
    pub fn accepted(request: &SubscribeRequest) -> Self {
        Self {
            channel: request.channel.clone(),
            client_id: request.client_id.clone(),
            subscription: request.subscription.clone(),
            successful: true,
            error: None,
            id: request.id.clone(),
        }
    }

    /// A failed reply to `request`.
    #[must_use]
    pub fn rejected(request: &SubscribeRequest, error: impl Into<String>) -> Self {
        Self {
            successful: false,
            error: Some(error.into()),
            ..Self::accepted(request)
        }
    }
}

/// Unsubscribe messages share the subscribe layout.
pub type UnsubscribeRequest = SubscribeRequest;
/// Unsubscribe messages share the subscribe layout.
pub type UnsubscribeReply = SubscribeReply;

/// Connect request sent on `/meta/connect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub channel: String,
    pub client_id: String,
    pub connection_type: ConnectionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ConnectRequest {
    /// Create a connect request over `connection_type`.
    #[must_use]
    pub fn new(client_id: impl Into<String>, connection_type: ConnectionType) -> Self {
        Self {
            channel: META_CONNECT.to_string(),
            client_id: client_id.into(),
            connection_type,
            id: None,
        }
    }

    /// Attach a message id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Connect reply received on `/meta/connect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectReply {
    pub channel: String,
    pub successful: bool,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server time the reply was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ConnectReply {
    /// A successful reply to `request`, advising an immediate retry.
    #[must_use]
    pub fn accepted(request: &ConnectRequest) -> Self {
        Self {
            channel: request.channel.clone(),
            successful: true,
            client_id: request.client_id.clone(),
            error: None,
            timestamp: None,
            advice: Some(Advice::retry(0)),
            id: request.id.clone(),
        }
    }

    /// A failed reply to `request`, advising a new handshake.
    #[must_use]
    pub fn rejected(request: &ConnectRequest, error: impl Into<String>) -> Self {
        Self {
            successful: false,
            error: Some(error.into()),
            advice: Some(Advice {
                reconnect: Some(Reconnect::Handshake),
                interval: None,
                timeout: None,
            }),
            ..Self::accepted(request)
        }
    }

    /// Attach the server timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// Publish request sent on the target channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub channel: ChannelName,
    pub data: Value,
    /// Absent when the publisher has no session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl PublishRequest {
    /// Create a publish request.
    #[must_use]
    pub fn new(channel: ChannelName, data: Value) -> Self {
        Self {
            channel,
            data,
            client_id: None,
            id: None,
        }
    }

    /// Attach a message id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The event subscribers receive for this publish.
    #[must_use]
    pub fn to_event(&self) -> EventMessage {
        EventMessage {
            channel: self.channel.clone(),
            data: self.data.clone(),
            id: self.id.clone(),
        }
    }
}

/// Publish reply received on the published channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReply {
    pub channel: ChannelName,
    pub successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl PublishReply {
    /// A successful reply to `request`.
    #[must_use]
    pub fn accepted(request: &PublishRequest) -> Self {
        Self {
            channel: request.channel.clone(),
            successful: true,
            error: None,
            id: request.id.clone(),
        }
    }

    /// A failed reply to `request`.
    #[must_use]
    pub fn rejected(request: &PublishRequest, error: impl Into<String>) -> Self {
        Self {
            successful: false,
            error: Some(error.into()),
            ..Self::accepted(request)
        }
    }
}

/// Disconnect request sent on `/meta/disconnect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest {
    pub channel: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl DisconnectRequest {
    /// Create a disconnect request.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            channel: META_DISCONNECT.to_string(),
            client_id: client_id.into(),
            id: None,
        }
    }

    /// Attach a message id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Disconnect reply received on `/meta/disconnect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectReply {
    pub channel: String,
    pub client_id: String,
    pub successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl DisconnectReply {
    /// A successful reply to `request`.
    #[must_use]
    pub fn accepted(request: &DisconnectRequest) -> Self {
        Self {
            channel: request.channel.clone(),
            client_id: request.client_id.clone(),
            successful: true,
            id: request.id.clone(),
        }
    }
}

/// An event delivered to subscribers of an ordinary channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    pub channel: ChannelName,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl EventMessage {
    /// Create an event message.
    #[must_use]
    pub fn new(channel: ChannelName, data: Value) -> Self {
        Self {
            channel,
            data,
            id: None,
        }
    }
}
