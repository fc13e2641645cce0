//! # wstest-transport
//!
//! Transport client contract for the wstest session bootstrapper.
//!
//! - **`Transport`** - the four operations a session needs from a pub/sub
//!   client: `configure`, `handshake`, `subscribe`, `unsubscribe`
//! - **Negotiation** - picking a connection type both sides support
//! - **Loopback** - an in-process transport that answers handshakes and
//!   routes events locally
//!
//! ```rust,ignore
//! use wstest_transport::{LoopbackTransport, Transport, TransportOptions, LogLevel};
//!
//! let transport = LoopbackTransport::new();
//! transport.configure(TransportOptions {
//!     url: "http://localhost:8080/ws/cometd".into(),
//!     log_level: LogLevel::Info,
//! })?;
//! let reply = transport.handshake().await?;
//! ```

pub mod fallback;
pub mod loopback;
pub mod traits;

pub use fallback::{negotiate_connection_type, CLIENT_CONNECTION_TYPES};
pub use loopback::{LoopbackConfig, LoopbackStats, LoopbackTransport};
pub use traits::{Listener, LogLevel, SubscriptionKey, Transport, TransportError, TransportOptions};
