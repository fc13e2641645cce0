//! Recording transport used by the unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use wstest_protocol::{ChannelName, ConnectionType, EventMessage, HandshakeReply};
use wstest_transport::{Listener, SubscriptionKey, Transport, TransportError, TransportOptions};

pub(crate) struct MockTransport {
    reply: Option<HandshakeReply>,
    greeting: Option<Value>,
    fail_unsubscribe: AtomicBool,
    unsubscribe_delay: Mutex<Option<Duration>>,
    next_key: AtomicU64,
    pub configured: Mutex<Vec<TransportOptions>>,
    pub handshakes: AtomicU64,
    pub subscribes: Mutex<Vec<(ChannelName, SubscriptionKey)>>,
    pub unsubscribes: Mutex<Vec<SubscriptionKey>>,
}

impl MockTransport {
    fn with_reply(reply: Option<HandshakeReply>) -> Self {
        Self {
            reply,
            greeting: None,
            fail_unsubscribe: AtomicBool::new(false),
            unsubscribe_delay: Mutex::new(None),
            next_key: AtomicU64::new(1),
            configured: Mutex::new(Vec::new()),
            handshakes: AtomicU64::new(0),
            subscribes: Mutex::new(Vec::new()),
            unsubscribes: Mutex::new(Vec::new()),
        }
    }

    /// Handshakes succeed.
    pub fn accepting() -> Self {
        Self::with_reply(Some(HandshakeReply::accepted(
            "mock-client",
            vec![ConnectionType::Websocket],
        )))
    }

    /// Handshakes come back with `successful: false`.
    pub fn rejecting() -> Self {
        Self::with_reply(Some(HandshakeReply::rejected("401::bad credentials")))
    }

    /// Handshakes fail at the transport level.
    pub fn broken() -> Self {
        Self::with_reply(None)
    }

    /// Every subscribe immediately delivers `data` to the new listener.
    pub fn with_greeting(mut self, data: Value) -> Self {
        self.greeting = Some(data);
        self
    }

    pub fn fail_unsubscribes(&self, fail: bool) {
        self.fail_unsubscribe.store(fail, Ordering::SeqCst);
    }

    /// Every unsubscribe sleeps for `delay` before answering.
    pub fn delay_unsubscribes(&self, delay: Duration) {
        *self.unsubscribe_delay.lock().unwrap() = Some(delay);
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.lock().unwrap().len()
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn configure(&self, options: TransportOptions) -> Result<(), TransportError> {
        self.configured.lock().unwrap().push(options);
        Ok(())
    }

    async fn handshake(&self) -> Result<HandshakeReply, TransportError> {
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| TransportError::Other("connection refused".into()))
    }

    async fn subscribe(
        &self,
        channel: &ChannelName,
        listener: Listener,
    ) -> Result<SubscriptionKey, TransportError> {
        let key = SubscriptionKey::new(format!(
            "key-{}",
            self.next_key.fetch_add(1, Ordering::SeqCst)
        ));
        self.subscribes
            .lock()
            .unwrap()
            .push((channel.clone(), key.clone()));

        if let Some(data) = &self.greeting {
            listener(&EventMessage::new(channel.clone(), data.clone()));
        }
        Ok(key)
    }

    async fn unsubscribe(&self, key: &SubscriptionKey) -> Result<(), TransportError> {
        let delay = *self.unsubscribe_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_unsubscribe.load(Ordering::SeqCst) {
            return Err(TransportError::Other("unsubscribe failed".into()));
        }
        self.unsubscribes.lock().unwrap().push(key.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
