//! # Parley
//!
//! Peer-to-peer chat sessions and groups over a publish/subscribe bus.
//!
//! Every peer is equal: there is no server, only a bus that routes topics.
//! Parley layers four things on top of it:
//!
//! - an invite handshake that converges two peers on one chat topic
//! - admin-owned groups with a retained, browsable directory
//! - retained online/offline presence
//! - a single ordered event stream the application polls
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn demo() -> Result<(), ParleyError> {
//! let broker = LocalBus::new();
//! let alice = ParleyClient::connect(broker.connect("alice")?).await?;
//! let bob = ParleyClient::connect(broker.connect("bob")?).await?;
//!
//! let request_id = alice.send_invite(bob.user_id()).await?;
//! let topic = bob.accept_invite(&request_id).await?;
//! bob.send_message(&topic, "hi alice").await?;
//!
//! for event in alice.poll_events().await? {
//!     println!("{}", event.type_name());
//! }
//! # Ok(())
//! # }
//! ```

mod actor;
mod client;
mod config;
mod dispatcher;
mod error;
mod presence;

pub use actor::ClientSnapshot;
pub use client::{ParleyClient, ParleyClientBuilder};
pub use config::ClientConfig;
pub use dispatcher::{Classified, Dispatcher, Inbound};
pub use error::ParleyError;
pub use presence::PresenceTracker;

pub use parley_bus as bus;
pub use parley_events as events;
pub use parley_group as group;
pub use parley_protocol as protocol;
pub use parley_session as session;

/// Everything an application usually needs.
pub mod prelude {
    pub use crate::{ClientConfig, ClientSnapshot, ParleyClient, ParleyError};
    pub use parley_bus::{LocalBus, LocalBusClient, MessageBus, Qos};
    pub use parley_events::{ErrorKind, Event};
    pub use parley_group::{JoinRequest, JoinedGroup};
    pub use parley_protocol::{
        GroupId, GroupInfo, MessageId, PresenceStatus, RequestId, UserId,
    };
    pub use parley_session::IncomingInvite;
}
