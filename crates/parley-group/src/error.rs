//! Error types for the group layer.

use parley_bus::BusError;
use parley_events::ErrorKind;
use parley_protocol::{GroupId, ProtocolError, UserId};

/// Errors returned by [`GroupCoordinator`](crate::GroupCoordinator)
/// commands.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    /// Only the admin's own process may mutate a group.
    #[error("not the admin of group {0}")]
    Unauthorized(GroupId),

    /// The group is not in the discovered directory.
    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    /// No pending join request from this user for this group.
    #[error("no pending join request from {requester} for group {group_id}")]
    JoinRequestNotFound { group_id: GroupId, requester: UserId },

    /// We neither administer nor have joined this group.
    #[error("not a member of group {0}")]
    NotMember(GroupId),

    /// We already administer or belong to this group.
    #[error("already a member of group {0}")]
    AlreadyMember(GroupId),

    /// Admins tear their groups down with `clean_list_groups` instead.
    #[error("group {0} is administered here; it cannot be left")]
    OwnedGroup(GroupId),

    /// A group message was addressed to the wrong topic.
    #[error("topic {actual:?} is not the chat topic of the group (expected {expected:?})")]
    TopicMismatch { expected: String, actual: String },

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl GroupError {
    /// The [`ErrorKind`] this error is reported under in the event stream.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Authorization,
            Self::GroupNotFound(_) | Self::JoinRequestNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::NotMember(_)
            | Self::AlreadyMember(_)
            | Self::OwnedGroup(_)
            | Self::TopicMismatch { .. } => ErrorKind::InvalidState,
            Self::Bus(_) => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
        }
    }
}
