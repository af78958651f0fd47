//! One-to-one sessions for Parley.
//!
//! This crate runs the invite handshake that lets two peers agree on a
//! shared chat topic without any directory service:
//!
//! ```text
//! alice                                   bob
//!   │ send_invite(bob)                     │
//!   │ ── invite_received ─→ control/bob ──→│ on_invite        (Pending)
//!   │                                      │ accept_invite    (Accepted)
//!   │                                      │   subscribe chat/alice_bob
//!   │←── control/alice ←─ invite_accepted ─│
//!   │ on_invite_accepted                   │
//!   │   subscribe chat/alice_bob           │
//! ```
//!
//! Both sides compute the chat topic with the same deterministic function
//! ([`parley_protocol::topics::canonical_chat_topic`]), so nothing about the
//! topic has to be negotiated. A rejection goes back the same way and no
//! topic is ever subscribed.
//!
//! # How it fits in the stack
//!
//! ```text
//! Client actor (above)   ← owns the coordinator, routes deliveries to it
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol + Bus (below) ← topic names, payloads, publish/subscribe
//! ```

mod coordinator;
mod error;
mod invite;

pub use coordinator::SessionCoordinator;
pub use error::SessionError;
pub use invite::{IncomingInvite, InviteState, OutgoingInvite};
