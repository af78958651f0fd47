//! Group coordination for Parley.
//!
//! A group is owned by exactly one process: the admin that created it.
//! Everyone else learns about it from a **retained advertisement** on its
//! discovery topic, which doubles as the directory:
//!
//! ```text
//! admin                          bus                          peer
//! create_group ── retained ──→ group/list/{id} ──(replay)──→ start_listing_groups
//!                                                             request_join_group
//! on_join_request ←──────── control/{admin} ←──────────────── group_join_request
//! approve_join_request ─────→ control/{peer} ──────────────→ on_join_approved
//!                 └─ retained → group/list/{id} (roster +1)    subscribe group/chat/{id}
//! ```
//!
//! # Known gaps
//!
//! - **Non-atomic approval.** Approving publishes the approval and then the
//!   updated advertisement as two independent publishes. A crash between
//!   them leaves the requester approved but the advertised roster stale.
//!   Within one admin process approvals are serialized against the admin's
//!   own record, so they cannot overwrite each other; the advertisement
//!   itself is last-writer-wins.
//! - **Implicit trust.** Anyone who can publish on an admin's control
//!   topic can ask to join; nothing is authenticated.
//! - **Silent leave.** [`GroupCoordinator::leave_group`] only unsubscribes
//!   locally. The admin's roster is not updated.

mod coordinator;
mod error;
mod state;

pub use coordinator::GroupCoordinator;
pub use error::GroupError;
pub use state::{JoinRequest, JoinState, JoinedGroup, OutgoingJoin};
