//! Typed events and the queue that buffers them for Parley.
//!
//! Delivery from the bus is push-based and arrives whenever the bus
//! decides; applications usually want to pull ("what happened since I last
//! looked?"). Every outcome the coordinators can report is an [`Event`],
//! appended to an [`EventQueue`] in arrival order and drained by the
//! application with [`EventQueue::poll_one`] / [`EventQueue::poll_all`].

mod event;
mod queue;

pub use event::{ErrorKind, Event};
pub use queue::{DEFAULT_WARN_THRESHOLD, EventQueue};
