//! Disposable subscription handles.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use wstest_protocol::ChannelName;
use wstest_transport::{SubscriptionKey, Transport, TransportError};

/// A live subscription returned by [`crate::Bootstrapper::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`SubscriptionHandle::remove`].
pub struct SubscriptionHandle {
    channel: ChannelName,
    key: SubscriptionKey,
    transport: Arc<dyn Transport>,
    removed: AtomicBool,
    // Held for the duration of an unsubscribe
    removing: Mutex<()>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        channel: ChannelName,
        key: SubscriptionKey,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            channel,
            key,
            transport,
            removed: AtomicBool::new(false),
            removing: Mutex::new(()),
        }
    }

    /// The subscribed channel.
    #[must_use]
    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// The key the transport returned for this subscription.
    #[must_use]
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Whether `remove` has already succeeded.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    /// Unsubscribe using the captured key.
    ///
    /// Returns `Ok(true)` when this call unsubscribed and `Ok(false)` when the
    /// handle was already removed; later calls never reach the transport.
    /// Concurrent calls wait for an unsubscribe in flight, so `Ok(false)` is
    /// only returned once the subscription is gone.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the unsubscribe fails. The handle stays
    /// live so the call can be retried.
    pub async fn remove(&self) -> Result<bool, TransportError> {
        let _removing = self.removing.lock().await;
        if self.removed.load(Ordering::SeqCst) {
            debug!(channel = %self.channel, key = %self.key, "Subscription already removed");
            return Ok(false);
        }

        self.transport.unsubscribe(&self.key).await?;
        self.removed.store(true, Ordering::SeqCst);

        debug!(channel = %self.channel, key = %self.key, "Subscription removed");
        Ok(true)
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("channel", &self.channel)
            .field("key", &self.key)
            .field("transport", &self.transport.name())
            .field("removed", &self.is_removed())
            .finish()
    }
}
