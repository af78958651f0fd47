//! Identity and correlation-id types.
//!
//! Same newtype pattern throughout: a `String` wrapped in a named struct so
//! a `GroupId` can never be passed where a `UserId` is expected. The two
//! types that end up inside topic names ([`UserId`], [`GroupId`]) validate
//! on construction *and* on deserialization, so a malformed identity in a
//! payload is a decode error rather than a corrupted topic later on.

use std::fmt;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Mints `{prefix}_{unix_millis}_{7 random base36 chars}`.
fn mint(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let mut rng = rand::rng();
    let suffix: String = (0..7)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!("{prefix}_{millis}_{suffix}")
}

/// Rejects strings that would break topic addressing.
fn check_topic_segment(raw: &str) -> Result<(), ProtocolError> {
    if raw.is_empty() || raw.contains(['/', '+', '#']) {
        return Err(ProtocolError::InvalidIdentifier(raw.to_string()));
    }
    Ok(())
}

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Borrows the raw string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// An opaque participant identity, assigned by the bus (its client id)
/// and stable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validates and wraps an identity.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidIdentifier`] for an empty string or one
    /// containing `/`, `+` or `#`.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ProtocolError> {
        let raw = raw.into();
        check_topic_segment(&raw)?;
        Ok(Self(raw))
    }
}

string_id!(UserId);

impl TryFrom<String> for UserId {
    type Error = ProtocolError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

// ---------------------------------------------------------------------------
// GroupId
// ---------------------------------------------------------------------------

/// A group identifier, minted by the group's creator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId(String);

impl GroupId {
    /// Validates and wraps an existing group id.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidIdentifier`] under the same rules as
    /// [`UserId::parse`].
    pub fn parse(raw: impl Into<String>) -> Result<Self, ProtocolError> {
        let raw = raw.into();
        check_topic_segment(&raw)?;
        Ok(Self(raw))
    }

    /// Mints a fresh id of the form `group_{name}_{millis}_{random}`.
    ///
    /// Characters of `name` that are not ASCII alphanumerics become `-`,
    /// so the id is always a valid topic segment.
    pub fn mint(name: &str) -> Self {
        let slug: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let prefix = if slug.is_empty() {
            "group".to_string()
        } else {
            format!("group_{slug}")
        };
        Self(mint(&prefix))
    }
}

string_id!(GroupId);

impl TryFrom<String> for GroupId {
    type Error = ProtocolError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

// ---------------------------------------------------------------------------
// RequestId / MessageId
// ---------------------------------------------------------------------------

/// Correlates an invite or join request with its answer. Unique per sender.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wraps an id received from elsewhere.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Mints a fresh invite id (`invite_...`).
    pub fn mint_invite() -> Self {
        Self(mint("invite"))
    }

    /// Mints a fresh join-request id (`join_...`).
    pub fn mint_join() -> Self {
        Self(mint("join"))
    }
}

string_id!(RequestId);

/// Identifies one chat or group message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Mints a fresh one-to-one message id (`msg_...`).
    pub fn mint_chat() -> Self {
        Self(mint("msg"))
    }

    /// Mints a fresh group message id (`gmsg_...`).
    pub fn mint_group() -> Self {
        Self(mint("gmsg"))
    }
}

string_id!(MessageId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_parse_accepts_plain_names() {
        let id = UserId::parse("alice").unwrap();
        assert_eq!(id.as_str(), "alice");
        assert_eq!(id.to_string(), "alice");
        assert!(UserId::parse("user_42").is_ok());
    }

    #[test]
    fn test_user_id_parse_rejects_topic_breaking_characters() {
        for bad in ["", "a/b", "a+b", "a#", "#"] {
            assert!(
                matches!(UserId::parse(bad), Err(ProtocolError::InvalidIdentifier(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::parse("bob").unwrap()).unwrap();
        assert_eq!(json, "\"bob\"");
    }

    #[test]
    fn test_user_id_deserialize_validates() {
        assert!(serde_json::from_str::<UserId>("\"bob\"").is_ok());
        assert!(serde_json::from_str::<UserId>("\"bo/b\"").is_err());
    }

    #[test]
    fn test_group_id_mint_is_topic_safe_and_unique() {
        let a = GroupId::mint("Friends / Family #1");
        let b = GroupId::mint("Friends / Family #1");
        assert!(a.as_str().starts_with("group_Friends---Family--1_"));
        assert!(GroupId::parse(a.as_str()).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn test_group_id_mint_with_empty_name() {
        let id = GroupId::mint("");
        assert!(id.as_str().starts_with("group_"));
        assert!(GroupId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_request_id_mint_prefixes() {
        let invite = RequestId::mint_invite();
        let join = RequestId::mint_join();
        assert!(invite.as_str().starts_with("invite_"));
        assert!(join.as_str().starts_with("join_"));
        // prefix, millis, 7-char suffix
        let parts: Vec<&str> = invite.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 7);
    }

    #[test]
    fn test_message_id_mint_prefixes() {
        assert!(MessageId::mint_chat().as_str().starts_with("msg_"));
        assert!(MessageId::mint_group().as_str().starts_with("gmsg_"));
    }
}
