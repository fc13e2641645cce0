//! Bayeux channel names.
//!
//! Channels are absolute, slash-separated paths such as `/players` or
//! `/chat/lobby`. The last segment of a subscription pattern may be a
//! wildcard: `*` matches exactly one segment, `**` matches one or more.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::codec::ProtocolError;

/// Maximum channel name length.
pub const MAX_CHANNEL_NAME_LENGTH: usize = 256;

/// Handshake meta channel.
pub const META_HANDSHAKE: &str = "/meta/handshake";
/// Connect meta channel.
pub const META_CONNECT: &str = "/meta/connect";
/// Disconnect meta channel.
pub const META_DISCONNECT: &str = "/meta/disconnect";
/// Subscribe meta channel.
pub const META_SUBSCRIBE: &str = "/meta/subscribe";
/// Unsubscribe meta channel.
pub const META_UNSUBSCRIBE: &str = "/meta/unsubscribe";

const META_PREFIX: &str = "/meta/";
const SERVICE_PREFIX: &str = "/service/";

/// Validate a channel name.
///
/// # Errors
///
/// Returns an error message if the channel name is invalid.
pub fn validate_channel_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Channel name cannot be empty");
    }
    if name.len() > MAX_CHANNEL_NAME_LENGTH {
        return Err("Channel name too long");
    }
    if !name.starts_with('/') {
        return Err("Channel name must start with '/'");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && !c.is_ascii_whitespace())
    {
        return Err("Channel name contains invalid characters");
    }

    let segments: Vec<&str> = name[1..].split('/').collect();
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err("Channel name contains an empty segment");
        }
        if segment.contains('*') {
            let is_wildcard = *segment == "*" || *segment == "**";
            if !is_wildcard || i != last {
                return Err("Wildcards are only allowed as the last segment");
            }
            if i == 0 {
                return Err("Channel name cannot be a bare wildcard");
            }
        }
    }
    Ok(())
}

/// A validated channel name or subscription pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelName(String);

impl ChannelName {
    /// Create a channel name, validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidChannel`] if the name is not a valid
    /// channel address.
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        validate_channel_name(&name).map_err(ProtocolError::InvalidChannel)?;
        Ok(Self(name))
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a `/meta/...` channel.
    #[must_use]
    pub fn is_meta(&self) -> bool {
        self.0.starts_with(META_PREFIX)
    }

    /// Whether this is a `/service/...` channel.
    #[must_use]
    pub fn is_service(&self) -> bool {
        self.0.starts_with(SERVICE_PREFIX)
    }

    /// Whether the last segment is `*` or `**`.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0.ends_with("/*") || self.0.ends_with("/**")
    }

    /// The path segments, without the leading slash.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split('/')
    }

    /// Check whether a concrete channel matches this name used as a pattern.
    ///
    /// Non-wildcard names only match themselves.
    #[must_use]
    pub fn matches(&self, channel: &ChannelName) -> bool {
        if !self.is_wildcard() {
            return self == channel;
        }

        let pattern: Vec<&str> = self.segments().collect();
        let target: Vec<&str> = channel.segments().collect();
        let (prefix, wildcard) = pattern.split_at(pattern.len() - 1);

        if target.len() <= prefix.len() || !target.starts_with(prefix) {
            return false;
        }

        match wildcard[0] {
            "*" => target.len() == prefix.len() + 1,
            _ => true,
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChannelName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ChannelName {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ChannelName {
    type Error = ProtocolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelName> for String {
    fn from(name: ChannelName) -> String {
        name.0
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(name: &str) -> ChannelName {
        ChannelName::new(name).unwrap()
    }

    #[test]
    fn test_valid_channel_names() {
        assert!(validate_channel_name("/players").is_ok());
        assert!(validate_channel_name("/chat/lobby").is_ok());
        assert!(validate_channel_name("/chat/*").is_ok());
        assert!(validate_channel_name("/chat/**").is_ok());
        assert!(validate_channel_name(META_HANDSHAKE).is_ok());
    }

    #[test]
    fn test_invalid_channel_names() {
        assert!(validate_channel_name("").is_err());
        assert!(validate_channel_name("players").is_err());
        assert!(validate_channel_name("/").is_err());
        assert!(validate_channel_name("/players/").is_err());
        assert!(validate_channel_name("//players").is_err());
        assert!(validate_channel_name("/chat room").is_err());
        assert!(validate_channel_name("/*").is_err());
        assert!(validate_channel_name("/chat/*/lobby").is_err());
        assert!(validate_channel_name("/chat/lob*").is_err());
        assert!(validate_channel_name(&format!("/{}", "a".repeat(MAX_CHANNEL_NAME_LENGTH))).is_err());
    }

    #[test]
    fn test_channel_classification() {
        assert!(ch("/meta/connect").is_meta());
        assert!(!ch("/players").is_meta());
        assert!(ch("/service/echo").is_service());
        assert!(ch("/players/*").is_wildcard());
        assert!(!ch("/players").is_wildcard());
    }

    #[test]
    fn test_exact_match() {
        assert!(ch("/players").matches(&ch("/players")));
        assert!(!ch("/players").matches(&ch("/players/one")));
    }

    #[test]
    fn test_single_segment_wildcard() {
        let pattern = ch("/chat/*");
        assert!(pattern.matches(&ch("/chat/lobby")));
        assert!(!pattern.matches(&ch("/chat/lobby/side")));
        assert!(!pattern.matches(&ch("/chat")));
        assert!(!pattern.matches(&ch("/news/lobby")));
    }

    #[test]
    fn test_deep_wildcard() {
        let pattern = ch("/chat/**");
        assert!(pattern.matches(&ch("/chat/lobby")));
        assert!(pattern.matches(&ch("/chat/lobby/side")));
        assert!(!pattern.matches(&ch("/chat")));
    }

    #[test]
    fn test_serde_validates() {
        let name: ChannelName = serde_json::from_str("\"/players\"").unwrap();
        assert_eq!(name.as_str(), "/players");
        assert!(serde_json::from_str::<ChannelName>("\"players\"").is_err());
    }
}
