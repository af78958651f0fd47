//! Wire protocol for Parley.
//!
//! This crate defines the "language" peers speak over the bus:
//!
//! - **Identities** ([`UserId`], [`GroupId`], [`RequestId`], [`MessageId`])
//! - **Topic addressing** ([`topics`]) — deterministic topic names derived
//!   from identities, so peers rendezvous without any directory
//! - **Payloads** ([`WireMessage`] and its records) — what gets published
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — payloads to/from bytes
//! - **Errors** ([`ProtocolError`])
//!
//! It knows nothing about delivery or state; it only names things and
//! shapes data.

mod codec;
mod error;
mod ids;
pub mod topics;
mod wire;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use ids::{GroupId, MessageId, RequestId, UserId};
pub use topics::TopicKind;
pub use wire::{
    ChatMessage, ConversationEntry, ConversationList, GroupInfo,
    GroupJoinApproved, GroupJoinRejected, GroupJoinRequest, GroupMessage,
    GroupRemoved, InviteAccept, InviteReject, InviteRequest, PresenceRecord,
    PresenceStatus, Timestamp, WireMessage, now,
};
