//! Error types for the session layer.

use parley_bus::BusError;
use parley_events::ErrorKind;
use parley_protocol::{ProtocolError, RequestId, UserId};

use crate::InviteState;

/// Errors returned by [`SessionCoordinator`](crate::SessionCoordinator)
/// commands.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No invite with this request id was ever received (or sent) here.
    #[error("no invite with request id {0}")]
    NotFound(RequestId),

    /// The invite has already been accepted or rejected.
    #[error("invite {0} is already {1}")]
    AlreadyResolved(RequestId, InviteState),

    /// Messages can only go to a chat topic this session is subscribed to.
    #[error("not in a chat on topic {0:?}")]
    NotInChat(String),

    /// Inviting yourself would make both ends of the handshake the same
    /// control topic.
    #[error("cannot invite yourself ({0})")]
    SelfInvite(UserId),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl SessionError {
    /// The [`ErrorKind`] this error is reported under in the event stream.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyResolved(..) | Self::NotInChat(_) | Self::SelfInvite(_) => {
                ErrorKind::InvalidState
            }
            Self::Bus(_) => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
        }
    }
}
