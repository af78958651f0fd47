//! Payload records that travel on the bus.
//!
//! Every payload is a flat JSON object with a `type` discriminator and
//! camelCase fields. [`WireMessage`] is the single tagged union of all of
//! them; decoding into it is the validation step: an unknown `type`, a
//! missing required field, or an invalid identity fails the decode instead
//! of producing a half-filled record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GroupId, MessageId, RequestId, UserId};

/// Wall-clock time on the wire (RFC 3339, UTC).
pub type Timestamp = DateTime<Utc>;

/// Current time, for stamping outgoing payloads.
pub fn now() -> Timestamp {
    Utc::now()
}

// ---------------------------------------------------------------------------
// Invite handshake
// ---------------------------------------------------------------------------

/// Sent to the target's control topic to propose a one-to-one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub from: UserId,
    pub request_id: RequestId,
    pub timestamp: Timestamp,
}

/// Sent back to the inviter's control topic when the invite is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteAccept {
    pub from: UserId,
    pub to: UserId,
    /// Informational; receivers recompute the canonical topic themselves.
    pub chat_topic: String,
    pub request_id: RequestId,
    pub timestamp: Timestamp,
}

/// Sent back to the inviter's control topic when the invite is declined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteReject {
    pub from: UserId,
    pub to: UserId,
    pub request_id: RequestId,
    pub timestamp: Timestamp,
}

/// One message on a canonical chat topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub from: UserId,
    pub content: String,
    pub message_id: MessageId,
    pub chat_topic: String,
    pub timestamp: Timestamp,
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// A group as advertised on its discovery topic.
///
/// `members` lists approved members and never includes the admin;
/// `member_count` counts the admin too, so a fresh group has
/// `member_count == 1` and an empty `members`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub group_id: GroupId,
    pub group_name: String,
    pub admin_id: UserId,
    /// The admin's control topic, where join requests go.
    pub control_admin_topic: String,
    pub members: Vec<UserId>,
    pub member_count: u32,
    pub created_at: Timestamp,
}

impl GroupInfo {
    /// Returns `true` if `user` is the admin or an approved member.
    pub fn has_member(&self, user: &UserId) -> bool {
        self.admin_id == *user || self.members.contains(user)
    }
}

/// Sent to the admin's control topic to ask for membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupJoinRequest {
    pub group_id: GroupId,
    /// The requesting user.
    pub user_request_id: UserId,
    pub request_id: RequestId,
    pub admin_id: UserId,
    pub control_admin_topic: String,
    pub group_name: String,
    pub member_count: u32,
    pub members: Vec<UserId>,
    pub created_at: Timestamp,
}

/// Sent by the admin to the requester's control topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupJoinApproved {
    pub group_id: GroupId,
    pub group_name: String,
    pub group_topic: String,
    pub user_request_id: UserId,
    pub request_id: RequestId,
    pub approved_by: UserId,
    pub admin_id: UserId,
    pub control_admin_topic: String,
    pub timestamp: Timestamp,
}

/// Sent by the admin to the requester's control topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupJoinRejected {
    pub group_id: GroupId,
    pub group_name: String,
    pub user_request_id: UserId,
    pub request_id: RequestId,
    #[serde(alias = "repprovedBy")]
    pub rejected_by: UserId,
    pub admin_id: UserId,
    pub control_admin_topic: String,
    pub timestamp: Timestamp,
}

/// One message on a group chat topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessage {
    pub group_id: GroupId,
    pub from: UserId,
    pub content: String,
    pub message_id: MessageId,
    pub group_topic: String,
    pub timestamp: Timestamp,
}

/// Retained tombstone replacing a torn-down group's advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRemoved {
    pub group_id: GroupId,
    pub group_name: String,
}

// ---------------------------------------------------------------------------
// Presence and saved conversations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// Retained status record on a user's presence topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub timestamp: Timestamp,
}

/// One entry of a saved conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    /// The peer (one-to-one) or group id rendered as a string (group).
    pub user_id: String,
    pub topic: String,
    pub chat_individual: bool,
    pub timestamp: Timestamp,
}

/// Retained record on a user's own conversations topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationList {
    pub conversations: Vec<ConversationEntry>,
}

// ---------------------------------------------------------------------------
// WireMessage
// ---------------------------------------------------------------------------

/// Every payload shape, discriminated by its `type` field.
///
/// ```text
/// { "type": "invite_received", "from": "alice", "requestId": "...", "timestamp": "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    #[serde(rename = "invite_received")]
    Invite(InviteRequest),
    #[serde(rename = "invite_accepted")]
    InviteAccepted(InviteAccept),
    #[serde(rename = "invite_rejected")]
    InviteRejected(InviteReject),
    #[serde(rename = "message")]
    Chat(ChatMessage),
    #[serde(rename = "group_join_request")]
    JoinRequest(GroupJoinRequest),
    #[serde(rename = "group_join_approved")]
    JoinApproved(GroupJoinApproved),
    #[serde(rename = "group_join_rejected")]
    JoinRejected(GroupJoinRejected),
    #[serde(rename = "group_message")]
    GroupMessage(GroupMessage),
    #[serde(rename = "group_discovered")]
    GroupAdvertised(GroupInfo),
    #[serde(rename = "group_removed")]
    GroupRemoved(GroupRemoved),
    #[serde(rename = "presence")]
    Presence(PresenceRecord),
    #[serde(rename = "load_conversation")]
    Conversations(ConversationList),
}

impl WireMessage {
    /// The `type` discriminator as it appears on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Invite(_) => "invite_received",
            Self::InviteAccepted(_) => "invite_accepted",
            Self::InviteRejected(_) => "invite_rejected",
            Self::Chat(_) => "message",
            Self::JoinRequest(_) => "group_join_request",
            Self::JoinApproved(_) => "group_join_approved",
            Self::JoinRejected(_) => "group_join_rejected",
            Self::GroupMessage(_) => "group_message",
            Self::GroupAdvertised(_) => "group_discovered",
            Self::GroupRemoved(_) => "group_removed",
            Self::Presence(_) => "presence",
            Self::Conversations(_) => "load_conversation",
        }
    }

    /// The author of broadcast content, for payloads where a client would
    /// otherwise hear its own publish echoed back.
    pub fn author(&self) -> Option<&UserId> {
        match self {
            Self::Chat(m) => Some(&m.from),
            Self::GroupMessage(m) => Some(&m.from),
            Self::Presence(p) => Some(&p.user_id),
            _ => None,
        }
    }
}
