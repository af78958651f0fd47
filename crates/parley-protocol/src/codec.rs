//! Codec trait and implementations for serializing/deserializing payloads.
//!
//! The coordinators don't care HOW payloads become bytes; they hold
//! something that implements [`Codec`]. [`JsonCodec`] is the only
//! implementation today and is what every Parley peer speaks on the bus.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because a codec lives inside long-running
/// tasks for the lifetime of the client.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON keeps payloads readable by any bus tooling (retained messages can be
/// inspected straight from the broker), which matters more here than size.
///
/// ## Example
///
/// ```rust
/// use parley_protocol::{Codec, JsonCodec, WireMessage, GroupRemoved, GroupId};
///
/// let codec = JsonCodec;
/// let msg = WireMessage::GroupRemoved(GroupRemoved {
///     group_id: GroupId::parse("g1").unwrap(),
///     group_name: "Friends".into(),
/// });
///
/// let bytes = codec.encode(&msg).unwrap();
/// let decoded: WireMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{InviteRequest, RequestId, UserId, WireMessage};

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<WireMessage, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_encodes_flat_record() {
        let msg = WireMessage::Invite(InviteRequest {
            from: UserId::parse("alice").unwrap(),
            request_id: RequestId::new("invite_1_x"),
            timestamp: "2026-01-02T03:04:05Z".parse().unwrap(),
        });
        let bytes = JsonCodec.encode(&msg).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(r#"{"type":"invite_received""#));
    }
}
