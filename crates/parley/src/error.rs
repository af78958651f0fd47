//! Unified error type for Parley.

use parley_bus::BusError;
use parley_events::ErrorKind;
use parley_group::GroupError;
use parley_protocol::ProtocolError;
use parley_session::SessionError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` conversions let `?` lift sub-crate errors, so callers of
/// [`ParleyClient`](crate::ParleyClient) deal with this single type.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// The bus refused a publish or subscription.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Malformed identity or payload.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Invite handshake or chat failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Group lifecycle failure.
    #[error(transparent)]
    Group(#[from] GroupError),

    /// The client task has stopped.
    #[error("client is closed")]
    Closed,
}

impl ParleyError {
    /// The [`ErrorKind`] this error is reported under in the event stream.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Bus(_) => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Session(e) => e.kind(),
            Self::Group(e) => e.kind(),
            Self::Closed => ErrorKind::Closed,
        }
    }
}
