//! Channel identifier type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a chat channel.
///
/// Wraps the platform's signed chat id. Broadcast channels and supergroups
/// use negative ids, so the sign is part of the identity and is preserved in
/// storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(i64);

impl ChannelId {
    /// Create a new ChannelId from a raw chat id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Parse a ChannelId from its decimal representation.
    pub fn from_str(s: &str) -> Result<Self, std::num::ParseIntError> {
        Ok(Self(s.trim().parse()?))
    }

    /// Get the raw chat id.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChannelId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_negative_channel() {
        let id = ChannelId::from_str("-1001234567890").unwrap();
        assert_eq!(id.as_i64(), -1001234567890);
        assert_eq!(id.to_string(), "-1001234567890");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ChannelId::from_str("abc").is_err());
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&ChannelId::new(-42)).unwrap();
        assert_eq!(json, "-42");
    }
}
