//! Records the group coordinator keeps about requests and memberships.

use std::fmt;

use parley_protocol::{GroupId, GroupInfo, RequestId, Timestamp, UserId};

/// (Admin side) a join request waiting for a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub request_id: RequestId,
    pub group_id: GroupId,
    pub requester: UserId,
    pub received_at: Timestamp,
}

/// Where one of our own join requests stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinState {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for JoinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// (Requester side) a join request we sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingJoin {
    pub request_id: RequestId,
    /// The advertisement we asked to join, as we saw it.
    pub group: GroupInfo,
    pub state: JoinState,
}

/// A group we were admitted to (not one we administer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedGroup {
    pub group_id: GroupId,
    pub group_name: String,
    pub group_topic: String,
    pub admin_id: UserId,
}
