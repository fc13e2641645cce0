//! # wstest-protocol
//!
//! Bayeux message model for the wstest client.
//!
//! This crate defines the records a Bayeux client exchanges with a server,
//! the channel address scheme, protocol versions, and a JSON batch codec.
//! It carries no networking of its own.
//!
//! ## Example
//!
//! ```rust
//! use wstest_protocol::{codec, ChannelName, EventMessage};
//!
//! let channel = ChannelName::new("/players").unwrap();
//! let event = EventMessage::new(channel, serde_json::json!({"msg": "hello"}));
//!
//! let encoded = codec::encode(&event).unwrap();
//! let decoded: Vec<EventMessage> = codec::decode_batch(&encoded).unwrap();
//! assert_eq!(decoded[0], event);
//! ```

pub mod channel;
pub mod codec;
pub mod messages;
pub mod version;

pub use channel::{validate_channel_name, ChannelName};
pub use codec::{decode_batch, encode, encode_batch, ProtocolError};
pub use messages::{
    Advice, ConnectReply, ConnectRequest, ConnectionType, DisconnectReply, DisconnectRequest,
    EventMessage, HandshakeReply, HandshakeRequest, PublishReply, PublishRequest, Reconnect,
    SubscribeReply, SubscribeRequest, UnsubscribeReply, UnsubscribeRequest,
};
pub use version::{Version, MINIMUM_VERSION, PROTOCOL_VERSION};
