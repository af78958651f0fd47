//! Invite records kept by each side of the handshake.

use std::fmt;

use parley_protocol::{RequestId, Timestamp, UserId};

/// Where an invite is in its lifecycle. `Accepted` and `Rejected` are
/// terminal; invites never expire on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InviteState {
    Pending,
    Accepted,
    Rejected,
}

impl InviteState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for InviteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// An invite someone sent us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingInvite {
    pub request_id: RequestId,
    pub from: UserId,
    /// The sender's timestamp, as carried in the payload.
    pub sent_at: Timestamp,
    pub state: InviteState,
}

/// An invite we sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingInvite {
    pub request_id: RequestId,
    pub to: UserId,
    pub sent_at: Timestamp,
    pub state: InviteState,
}
