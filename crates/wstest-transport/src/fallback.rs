//! Connection type negotiation.
//!
//! After a handshake the client and server each hold a list of connection
//! types they support. The client picks the best one both sides share.

use wstest_protocol::ConnectionType;

/// Connection types this client offers, in priority order.
pub const CLIENT_CONNECTION_TYPES: [ConnectionType; 3] = [
    ConnectionType::Websocket,
    ConnectionType::LongPolling,
    ConnectionType::CallbackPolling,
];

const PRIORITY: [ConnectionType; 5] = [
    ConnectionType::Websocket,
    ConnectionType::LongPolling,
    ConnectionType::CallbackPolling,
    ConnectionType::Iframe,
    ConnectionType::Flash,
];

/// Negotiate the best connection type for a session.
///
/// Returns the highest-priority type present in both lists, or `None` when
/// the two sides share nothing.
#[must_use]
pub fn negotiate_connection_type(
    client_types: &[ConnectionType],
    server_types: &[ConnectionType],
) -> Option<ConnectionType> {
    PRIORITY
        .into_iter()
        .find(|t| client_types.contains(t) && server_types.contains(t))
}
