//! The [`Event`] tagged union.

use parley_protocol::{
    ConversationEntry, GroupId, GroupInfo, MessageId, PresenceStatus,
    RequestId, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

/// Broad classification of a failure, carried by [`Event::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// An inbound payload could not be parsed or did not fit its topic.
    Parse,
    /// A request id, group or chat the operation refers to is unknown.
    NotFound,
    /// A group mutation was attempted by someone who does not own it.
    Authorization,
    /// The operation does not apply in the current state (e.g. answering
    /// an invite twice, messaging a group you are not in).
    InvalidState,
    /// The bus refused the publish/subscribe.
    Transport,
    /// An outgoing payload or identity was malformed.
    Protocol,
    /// The client has shut down.
    Closed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Parse => "parse",
            Self::NotFound => "not_found",
            Self::Authorization => "authorization",
            Self::InvalidState => "invalid_state",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Everything the coordinators can report.
///
/// Serialized the same way as wire payloads (`type` discriminator,
/// camelCase fields) so events can be forwarded to a UI as-is:
///
/// ```text
/// { "type": "invite_rejected", "rejectedBy": "bob", "requestId": "...", "timestamp": "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Event {
    // -- Invite handshake --
    /// Someone invited us to a one-to-one chat.
    InviteReceived {
        from: UserId,
        request_id: RequestId,
        timestamp: Timestamp,
    },

    /// Our invite was accepted; we are now subscribed to `chat_topic`.
    InviteAccepted {
        accepted_by: UserId,
        chat_topic: String,
        request_id: RequestId,
        timestamp: Timestamp,
    },

    /// Our invite was declined; no chat topic exists.
    InviteRejected {
        rejected_by: UserId,
        request_id: RequestId,
        timestamp: Timestamp,
    },

    /// A peer wrote on a one-to-one chat.
    MessageReceived {
        from: UserId,
        content: String,
        message_id: MessageId,
        chat_topic: String,
        timestamp: Timestamp,
    },

    /// Our saved conversation list was (re)delivered by the bus.
    ConversationsLoaded {
        conversations: Vec<ConversationEntry>,
    },

    // -- Groups --
    /// We created a group and became its admin.
    GroupCreated {
        group: GroupInfo,
        group_topic: String,
    },

    /// (Admin) someone asked to join one of our groups.
    GroupJoinRequest {
        group_id: GroupId,
        group_name: String,
        admin_id: UserId,
        control_admin_topic: String,
        user_request_id: UserId,
        request_id: RequestId,
        member_count: u32,
        members: Vec<UserId>,
        created_at: Timestamp,
    },

    /// (Requester) the admin let us in; we are now subscribed to
    /// `group_topic`.
    GroupJoinApproved {
        group_id: GroupId,
        group_name: String,
        group_topic: String,
        approved_by: UserId,
        request_id: RequestId,
        timestamp: Timestamp,
    },

    /// (Requester) the admin turned us down.
    GroupJoinRejected {
        group_id: GroupId,
        group_name: String,
        rejected_by: UserId,
        request_id: RequestId,
        timestamp: Timestamp,
    },

    /// Another member wrote in a group we are in.
    GroupMessageReceived {
        group_id: GroupId,
        from: UserId,
        content: String,
        message_id: MessageId,
        group_topic: String,
        timestamp: Timestamp,
    },

    /// A group advertisement appeared or changed in the directory.
    GroupDiscovered { group: GroupInfo },

    /// A group was torn down by its admin.
    GroupRemoved {
        group_id: GroupId,
        group_name: String,
    },

    // -- Presence --
    /// A peer's retained presence record changed.
    PresenceUpdate {
        user_id: UserId,
        status: PresenceStatus,
        timestamp: Timestamp,
    },

    // -- Errors --
    /// Something failed. Inbound failures carry the offending topic and
    /// raw payload; command failures carry neither.
    Error {
        kind: ErrorKind,
        message: String,
        topic: Option<String>,
        payload: Option<String>,
    },
}

impl Event {
    /// An error event not tied to any delivery.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
            topic: None,
            payload: None,
        }
    }

    /// A [`ErrorKind::Parse`] event for an inbound delivery. The payload is
    /// kept as (lossy) UTF-8 so it can be logged or shown.
    pub fn parse_error(
        topic: &str,
        payload: &[u8],
        message: impl Into<String>,
    ) -> Self {
        Self::Error {
            kind: ErrorKind::Parse,
            message: message.into(),
            topic: Some(topic.to_string()),
            payload: Some(String::from_utf8_lossy(payload).into_owned()),
        }
    }

    /// The `type` discriminator of this event.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::InviteReceived { .. } => "invite_received",
            Self::InviteAccepted { .. } => "invite_accepted",
            Self::InviteRejected { .. } => "invite_rejected",
            Self::MessageReceived { .. } => "message_received",
            Self::ConversationsLoaded { .. } => "conversations_loaded",
            Self::GroupCreated { .. } => "group_created",
            Self::GroupJoinRequest { .. } => "group_join_request",
            Self::GroupJoinApproved { .. } => "group_join_approved",
            Self::GroupJoinRejected { .. } => "group_join_rejected",
            Self::GroupMessageReceived { .. } => "group_message_received",
            Self::GroupDiscovered { .. } => "group_discovered",
            Self::GroupRemoved { .. } => "group_removed",
            Self::PresenceUpdate { .. } => "presence_update",
            Self::Error { .. } => "error",
        }
    }

    /// Returns the error kind if this is an [`Event::Error`].
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
