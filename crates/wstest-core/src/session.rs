//! The session bootstrapper.
//!
//! [`Bootstrapper::initialize`] configures the transport, performs a single
//! handshake, and on success subscribes the session's channel with a
//! listener that logs every message:
//!
//! ```text
//! Unconnected ──▶ Handshaking ──┬──▶ Subscribed
//!                               └──▶ Failed
//! ```
//!
//! There is no retry and no reconnection; both belong to the transport.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wstest_protocol::{ChannelName, EventMessage, HandshakeReply, ProtocolError};
use wstest_transport::{
    negotiate_connection_type, Listener, Transport, TransportError, CLIENT_CONNECTION_TYPES,
};

use crate::config::SessionConfig;
use crate::handle::SubscriptionHandle;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unconnected,
    Handshaking,
    Subscribed,
    Failed,
}

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server answered the handshake with `successful: false`.
    #[error("Handshake rejected: {reason}")]
    HandshakeRejected {
        /// Reason taken from the reply.
        reason: String,
        /// The full reply, for callers that want the metadata.
        reply: Box<HandshakeReply>,
    },

    /// A channel name is invalid.
    #[error("Invalid channel: {0}")]
    InvalidChannel(#[from] ProtocolError),

    /// The transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Listener that logs every message it receives.
#[must_use]
pub fn logging_listener() -> Listener {
    Arc::new(|msg: &EventMessage| {
        info!(channel = %msg.channel, data = %msg.data, "Received message");
    })
}

/// Establishes a session with one message bus endpoint.
pub struct Bootstrapper {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    listener: Listener,
    state: watch::Sender<SessionState>,
}

impl Bootstrapper {
    /// Create a bootstrapper that logs messages on the configured channel.
    #[must_use]
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let (state, _) = watch::channel(SessionState::Unconnected);
        Self {
            config,
            transport,
            listener: logging_listener(),
            state,
        }
    }

    /// Replace the listener `initialize` subscribes with.
    #[must_use]
    pub fn with_listener(mut self, listener: Listener) -> Self {
        self.listener = listener;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch session state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Configure the transport, handshake, and subscribe the session channel.
    ///
    /// Calling this twice runs two independent handshakes.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::HandshakeRejected`] when the reply is not
    /// successful, or [`SessionError::Transport`] when the transport fails.
    /// In both cases nothing is subscribed and the state becomes `Failed`.
    pub async fn initialize(&self) -> Result<SubscriptionHandle, SessionError> {
        let options = self.config.transport_options();
        info!(url = %options.url, log_level = %options.log_level, "Initializing session");

        if let Err(e) = self.transport.configure(options) {
            return Err(self.fail(e));
        }

        self.set_state(SessionState::Handshaking);
        let reply = match self.transport.handshake().await {
            Ok(reply) => reply,
            Err(e) => return Err(self.fail(e)),
        };

        if !reply.successful {
            let reason = reply.failure_reason();
            warn!(reason = %reason, "Failed handshake");
            self.set_state(SessionState::Failed);
            return Err(SessionError::HandshakeRejected {
                reason,
                reply: Box::new(reply),
            });
        }

        let connection_type =
            negotiate_connection_type(&CLIENT_CONNECTION_TYPES, &reply.supported_connection_types);
        info!(
            client = reply.client_id.as_deref().unwrap_or("-"),
            connection_type = ?connection_type,
            "Handshake succeeded"
        );

        let channel = self.config.channel().clone();
        let handle = match self.subscribe_listener(channel, self.listener.clone()).await {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail(e)),
        };

        self.set_state(SessionState::Subscribed);
        Ok(handle)
    }

    /// Run [`Bootstrapper::initialize`] in the background.
    pub fn spawn_initialize(
        self: &Arc<Self>,
    ) -> JoinHandle<Result<SubscriptionHandle, SessionError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.initialize().await })
    }

    /// Subscribe `listener` to `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel name is invalid or the transport
    /// refuses the subscription.
    pub async fn subscribe<F>(&self, channel: &str, listener: F) -> Result<SubscriptionHandle, SessionError>
    where
        F: Fn(&EventMessage) + Send + Sync + 'static,
    {
        let channel = ChannelName::new(channel)?;
        self.subscribe_listener(channel, Arc::new(listener)).await
    }

    async fn subscribe_listener(
        &self,
        channel: ChannelName,
        listener: Listener,
    ) -> Result<SubscriptionHandle, SessionError> {
        let key = self.transport.subscribe(&channel, listener).await?;
        debug!(channel = %channel, key = %key, transport = self.transport.name(), "Subscribed");
        Ok(SubscriptionHandle::new(
            channel,
            key,
            Arc::clone(&self.transport),
        ))
    }

    fn fail(&self, e: impl Into<SessionError>) -> SessionError {
        let e = e.into();
        error!(error = %e, "Session failed");
        self.set_state(SessionState::Failed);
        e
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Session state changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Location;
    use crate::mock::MockTransport;
    use serde_json::json;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (buffer, guard)
    }

    fn config() -> SessionConfig {
        SessionConfig::new("http://localhost:8080".parse::<Location>().unwrap()).unwrap()
    }

    fn bootstrapper(transport: &Arc<MockTransport>) -> Bootstrapper {
        Bootstrapper::new(config(), transport.clone())
    }

    #[tokio::test]
    async fn test_successful_handshake_subscribes_once() {
        let transport = Arc::new(MockTransport::accepting());
        let session = bootstrapper(&transport);

        let handle = session.initialize().await.unwrap();

        let subscribes = transport.subscribes.lock().unwrap().clone();
        assert_eq!(subscribes.len(), 1);
        assert_eq!(subscribes[0].0.as_str(), "/players");
        assert_eq!(handle.channel().as_str(), "/players");
        assert_eq!(session.state(), SessionState::Subscribed);
    }

    #[tokio::test]
    async fn test_configure_uses_session_url() {
        let transport = Arc::new(MockTransport::accepting());
        bootstrapper(&transport).initialize().await.unwrap();

        let configured = transport.configured.lock().unwrap().clone();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].url, "http://localhost:8080/ws/cometd");
        assert_eq!(configured[0].log_level.as_str(), "info");
    }

    #[tokio::test]
    async fn test_failed_handshake_does_not_subscribe() {
        let (logs, _guard) = capture_logs();
        let transport = Arc::new(MockTransport::rejecting());
        let session = bootstrapper(&transport);

        let result = session.initialize().await;

        match result {
            Err(SessionError::HandshakeRejected { reason, reply }) => {
                assert_eq!(reason, "401::bad credentials");
                assert!(!reply.successful);
            }
            other => panic!("Expected HandshakeRejected, got {:?}", other),
        }
        assert_eq!(transport.subscribe_count(), 0);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(logs.contents().matches("Failed handshake").count(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_fails_session() {
        let transport = Arc::new(MockTransport::broken());
        let session = bootstrapper(&transport);

        assert!(matches!(
            session.initialize().await,
            Err(SessionError::Transport(_))
        ));
        assert_eq!(transport.subscribe_count(), 0);
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_end_to_end_logs_message() {
        let (logs, _guard) = capture_logs();
        let transport = Arc::new(MockTransport::accepting().with_greeting(json!({"msg": "hello"})));

        bootstrapper(&transport).initialize().await.unwrap();

        let output = logs.contents();
        assert!(output.contains("Received message"));
        assert!(output.contains("hello"));
    }

    #[tokio::test]
    async fn test_custom_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let transport = Arc::new(MockTransport::accepting().with_greeting(json!({"msg": "hi"})));
        let session = bootstrapper(&transport).with_listener(Arc::new(move |msg: &EventMessage| {
            sink.lock().unwrap().push(msg.data.clone());
        }));

        session.initialize().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![json!({"msg": "hi"})]);
    }

    #[tokio::test]
    async fn test_initialize_twice_handshakes_twice() {
        let transport = Arc::new(MockTransport::accepting());
        let session = bootstrapper(&transport);

        session.initialize().await.unwrap();
        session.initialize().await.unwrap();

        assert_eq!(transport.handshakes.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(transport.subscribe_count(), 2);
    }

    #[tokio::test]
    async fn test_spawn_initialize() {
        let transport = Arc::new(MockTransport::accepting());
        let session = Arc::new(bootstrapper(&transport));
        let mut states = session.watch_state();

        let handle = session.spawn_initialize().await.unwrap().unwrap();
        assert_eq!(handle.channel().as_str(), "/players");

        states.changed().await.unwrap();
        assert_eq!(*states.borrow(), SessionState::Subscribed);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_invalid_channel() {
        let transport = Arc::new(MockTransport::accepting());
        let session = bootstrapper(&transport);

        assert!(matches!(
            session.subscribe("", |_| {}).await,
            Err(SessionError::InvalidChannel(_))
        ));
        assert_eq!(transport.subscribe_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_unsubscribes_with_returned_key() {
        let transport = Arc::new(MockTransport::accepting());
        let session = bootstrapper(&transport);

        let handle = session.subscribe("/scores", |_| {}).await.unwrap();
        let key = transport.subscribes.lock().unwrap()[0].1.clone();
        assert_eq!(handle.key(), &key);

        assert!(handle.remove().await.unwrap());
        assert_eq!(*transport.unsubscribes.lock().unwrap(), vec![key]);
    }

    #[tokio::test]
    async fn test_remove_twice() {
        let transport = Arc::new(MockTransport::accepting());
        let session = bootstrapper(&transport);

        let handle = session.subscribe("/scores", |_| {}).await.unwrap();
        assert!(handle.remove().await.unwrap());
        assert!(!handle.remove().await.unwrap());
        assert_eq!(transport.unsubscribe_count(), 1);
        assert!(handle.is_removed());
    }

    #[tokio::test]
    async fn test_failed_remove_can_retry() {
        let transport = Arc::new(MockTransport::accepting());
        let session = bootstrapper(&transport);
        let handle = session.subscribe("/scores", |_| {}).await.unwrap();

        transport.fail_unsubscribes(true);
        assert!(handle.remove().await.is_err());
        assert!(!handle.is_removed());

        transport.fail_unsubscribes(false);
        assert!(handle.remove().await.unwrap());
        assert_eq!(transport.unsubscribe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_remove_waits_for_unsubscribe() {
        let transport = Arc::new(MockTransport::accepting());
        let session = bootstrapper(&transport);
        let handle = session.subscribe("/scores", |_| {}).await.unwrap();
        transport.delay_unsubscribes(Duration::from_millis(50));

        // A failing unsubscribe must not let the other caller report removal
        transport.fail_unsubscribes(true);
        let (first, second) = tokio::join!(handle.remove(), handle.remove());
        assert!(first.is_err());
        assert!(second.is_err());
        assert!(!handle.is_removed());

        transport.fail_unsubscribes(false);
        let (first, second) = tokio::join!(handle.remove(), handle.remove());
        assert!(first.unwrap());
        assert!(!second.unwrap());
        assert_eq!(transport.unsubscribe_count(), 1);
        assert!(handle.is_removed());
    }
}
