//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the problem is in the shape of data
//! (identities, payload encoding), never in delivery or coordination.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a payload into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `type`
    /// discriminator, a missing required field, or a wrongly typed one.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// An identity or group id that cannot be embedded in a topic name
    /// (empty, or containing `/`, `+` or `#`).
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
}
