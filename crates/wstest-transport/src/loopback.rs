//! In-process loopback transport.
//!
//! `LoopbackTransport` plays both ends of a Bayeux session inside the current
//! process: it answers handshakes, keeps a subscription registry, and routes
//! published events to every listener whose pattern matches. It is what the
//! demo binary runs against and what tests use when they need a transport
//! that behaves like a small server.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, trace, warn};
use wstest_protocol::{
    codec, ChannelName, ConnectReply, ConnectRequest, ConnectionType, DisconnectReply,
    DisconnectRequest, EventMessage, HandshakeReply, HandshakeRequest, PublishReply,
    PublishRequest, ProtocolError, SubscribeReply, SubscribeRequest, Version, PROTOCOL_VERSION,
};

use crate::fallback::{negotiate_connection_type, CLIENT_CONNECTION_TYPES};
use crate::traits::{
    Listener, LogLevel, SubscriptionKey, Transport, TransportError, TransportOptions,
};

/// Loopback transport configuration.
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Whether handshakes succeed.
    pub accept_handshakes: bool,
    /// Greet every new subscription with a welcome event.
    pub welcome: bool,
    /// Connection types the simulated server offers.
    pub supported_connection_types: Vec<ConnectionType>,
    /// Protocol version the simulated server speaks.
    pub version: Version,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            accept_handshakes: true,
            welcome: true,
            supported_connection_types: vec![ConnectionType::Websocket],
            version: PROTOCOL_VERSION,
        }
    }
}

/// Operation counters for a loopback transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopbackStats {
    pub handshakes: u64,
    pub subscribes: u64,
    pub unsubscribes: u64,
    pub delivered: u64,
}

#[derive(Default)]
struct Counters {
    handshakes: AtomicU64,
    subscribes: AtomicU64,
    unsubscribes: AtomicU64,
    delivered: AtomicU64,
}

struct Subscription {
    request: SubscribeRequest,
    listener: Listener,
}

/// An in-process transport.
pub struct LoopbackTransport {
    config: LoopbackConfig,
    options: RwLock<Option<TransportOptions>>,
    client_id: RwLock<Option<String>>,
    subscriptions: DashMap<SubscriptionKey, Subscription>,
    next_id: AtomicU64,
    counters: Counters,
}

impl LoopbackTransport {
    /// Create a loopback transport with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LoopbackConfig::default())
    }

    /// Create a loopback transport with custom config.
    #[must_use]
    pub fn with_config(config: LoopbackConfig) -> Self {
        debug!("Creating loopback transport with config: {:?}", config);
        Self {
            config,
            options: RwLock::new(None),
            client_id: RwLock::new(None),
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
        }
    }

    /// The options passed to the last `configure` call.
    #[must_use]
    pub fn options(&self) -> Option<TransportOptions> {
        self.options
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The client id assigned by the last successful handshake.
    #[must_use]
    pub fn client_id(&self) -> Option<String> {
        self.client_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Snapshot of the operation counters.
    #[must_use]
    pub fn stats(&self) -> LoopbackStats {
        LoopbackStats {
            handshakes: self.counters.handshakes.load(Ordering::Relaxed),
            subscribes: self.counters.subscribes.load(Ordering::Relaxed),
            unsubscribes: self.counters.unsubscribes.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
        }
    }

    /// Publish `data` on `channel`.
    ///
    /// Returns the number of listeners the event was delivered to.
    ///
    /// # Errors
    ///
    /// Returns an error if `channel` is a wildcard or meta channel.
    pub fn publish(&self, channel: &ChannelName, data: Value) -> Result<usize, TransportError> {
        let mut request = PublishRequest::new(channel.clone(), data).with_id(self.message_id());
        request.client_id = self.client_id();
        self.deliver(&request)
    }

    /// Decode a JSON batch of publish requests and publish each one.
    ///
    /// Returns the total number of deliveries.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be decoded or names a channel
    /// that cannot be published to.
    pub fn publish_batch(&self, data: &[u8]) -> Result<usize, TransportError> {
        let requests: Vec<PublishRequest> = codec::decode_batch(data)?;
        let mut total = 0;
        for request in &requests {
            total += self.deliver(request)?;
        }
        Ok(total)
    }

    /// Open the connect channel over `connection_type`.
    ///
    /// The reply is unsuccessful, advising a new handshake, when the type is
    /// not one the loopback offers.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotHandshaken`] before a successful
    /// handshake.
    pub fn connect(&self, connection_type: ConnectionType) -> Result<ConnectReply, TransportError> {
        let client_id = self.client_id().ok_or(TransportError::NotHandshaken)?;
        let request = ConnectRequest::new(client_id, connection_type).with_id(self.message_id());

        if !self
            .config
            .supported_connection_types
            .contains(&request.connection_type)
        {
            let reply = ConnectReply::rejected(
                &request,
                format!("400::connection type {} not supported", connection_type),
            );
            warn!(connection_type = %connection_type, "Loopback refused connect");
            return Ok(reply);
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        debug!(client = %request.client_id, connection_type = %connection_type, "Connected");
        Ok(ConnectReply::accepted(&request).with_timestamp(timestamp.to_string()))
    }

    /// End the session, dropping every subscription.
    ///
    /// Returns `None` when no session was established.
    pub fn disconnect(&self) -> Option<DisconnectReply> {
        let client_id = self
            .client_id
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;

        let request = DisconnectRequest::new(&client_id).with_id(self.message_id());
        let dropped = self.subscriptions.len();
        self.subscriptions.clear();

        info!(client = %client_id, dropped, "Loopback session disconnected");
        Some(DisconnectReply::accepted(&request))
    }

    fn deliver(&self, request: &PublishRequest) -> Result<usize, TransportError> {
        let refusal = if request.channel.is_wildcard() {
            Some("Cannot publish to a wildcard channel")
        } else if request.channel.is_meta() {
            Some("Cannot publish to a meta channel")
        } else {
            None
        };
        if let Some(reason) = refusal {
            let reply = PublishReply::rejected(request, reason);
            debug!(channel = %reply.channel, error = reason, "Publish refused");
            return Err(ProtocolError::InvalidChannel(reason).into());
        }

        let event = request.to_event();

        // Collect first so listeners run without holding map guards
        let listeners: Vec<Listener> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.request.subscription.matches(&event.channel))
            .map(|entry| entry.listener.clone())
            .collect();

        for listener in &listeners {
            listener(&event);
        }

        let count = listeners.len();
        self.counters
            .delivered
            .fetch_add(count as u64, Ordering::Relaxed);

        let reply = PublishReply::accepted(request);
        if self.log_level() >= LogLevel::Debug {
            debug!(channel = %reply.channel, recipients = count, "Delivered event");
        } else {
            trace!(channel = %event.channel, recipients = count, "Delivered event");
        }

        Ok(count)
    }

    fn log_level(&self) -> LogLevel {
        self.options
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|o| o.log_level)
            .unwrap_or_default()
    }

    fn message_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn generate_client_id(&self) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let counter = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("client_{:x}", timestamp.wrapping_add(counter))
    }

    fn answer_handshake(&self, request: &HandshakeRequest) -> HandshakeReply {
        if !self.config.accept_handshakes {
            return HandshakeReply::rejected("403::handshake denied");
        }
        if !request.version.is_compatible_with(&self.config.version) {
            return HandshakeReply::rejected(format!(
                "400::version {} not supported",
                request.version
            ));
        }

        let Some(connection_type) = negotiate_connection_type(
            &request.supported_connection_types,
            &self.config.supported_connection_types,
        ) else {
            return HandshakeReply::rejected("400::no common connection type");
        };

        let client_id = self.generate_client_id();
        debug!(client = %client_id, connection_type = %connection_type, "Handshake accepted");
        HandshakeReply::accepted(client_id, self.config.supported_connection_types.clone())
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn configure(&self, options: TransportOptions) -> Result<(), TransportError> {
        if options.url.is_empty() {
            return Err(TransportError::Other("Transport URL cannot be empty".into()));
        }

        debug!(url = %options.url, log_level = %options.log_level, "Loopback configured");
        *self.options.write().unwrap_or_else(|e| e.into_inner()) = Some(options);
        Ok(())
    }

    async fn handshake(&self) -> Result<HandshakeReply, TransportError> {
        let Some(options) = self.options() else {
            return Err(TransportError::NotConfigured);
        };
        self.counters.handshakes.fetch_add(1, Ordering::Relaxed);

        let request = HandshakeRequest::new(CLIENT_CONNECTION_TYPES.to_vec()).with_id(self.message_id());
        let reply = self.answer_handshake(&request).with_id(request.id.clone());

        if reply.successful {
            *self.client_id.write().unwrap_or_else(|e| e.into_inner()) = reply.client_id.clone();
        } else {
            warn!(url = %options.url, error = %reply.failure_reason(), "Loopback refused handshake");
        }

        Ok(reply)
    }

    async fn subscribe(
        &self,
        channel: &ChannelName,
        listener: Listener,
    ) -> Result<SubscriptionKey, TransportError> {
        let client_id = self.client_id().ok_or(TransportError::NotHandshaken)?;

        let mut request = SubscribeRequest::new(&client_id, channel.clone());
        request.id = Some(self.message_id());

        if channel.is_meta() {
            let reply = SubscribeReply::rejected(&request, "403::cannot subscribe to meta channels");
            return Err(TransportError::SubscribeRejected {
                channel: channel.to_string(),
                reason: reply.error.unwrap_or_default(),
            });
        }

        let key = SubscriptionKey::new(format!("sub_{}", self.message_id()));
        let reply = SubscribeReply::accepted(&request);
        self.subscriptions.insert(
            key.clone(),
            Subscription {
                request,
                listener: listener.clone(),
            },
        );
        self.counters.subscribes.fetch_add(1, Ordering::Relaxed);

        debug!(
            channel = %reply.subscription,
            client = %reply.client_id,
            key = %key,
            "Subscribed"
        );

        if self.config.welcome {
            let welcome = EventMessage::new(
                channel.clone(),
                json!({ "msg": format!("Welcome to {} Client '{}'", channel, client_id) }),
            );
            listener(&welcome);
            self.counters.delivered.fetch_add(1, Ordering::Relaxed);
        }

        Ok(key)
    }

    async fn unsubscribe(&self, key: &SubscriptionKey) -> Result<(), TransportError> {
        let (_, subscription) = self
            .subscriptions
            .remove(key)
            .ok_or_else(|| TransportError::UnknownSubscription(key.clone()))?;
        self.counters.unsubscribes.fetch_add(1, Ordering::Relaxed);

        let reply = SubscribeReply::accepted(&subscription.request.into_unsubscribe());
        debug!(channel = %reply.subscription, key = %key, "Unsubscribed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}
