//! Publish/subscribe bus abstraction for Parley.
//!
//! Everything Parley does travels over a generic topic-based message bus:
//! topics, per-message delivery quality, and retained messages. This crate
//! defines the [`MessageBus`] contract the coordinators are written against
//! and ships [`LocalBus`], an in-process broker with the same semantics.
//!
//! # Delivery model
//!
//! A bus client registers exactly one *global handler*: a channel sender
//! that receives every [`Delivery`] for the client, whichever subscription
//! matched it. The consumer on the other end of that channel owns all
//! classification and routing.
//!
//! # Feature Flags
//!
//! - `local` (default) — the in-process [`LocalBus`] broker
//! - `testing` — [`testing::RecordingBus`], a bus that only records calls

mod error;
mod filter;
#[cfg(feature = "local")]
mod local;
mod subscriptions;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::BusError;
pub use filter::{topic_matches, validate_filter, validate_topic};
#[cfg(feature = "local")]
pub use local::{LocalBus, LocalBusClient};
pub use subscriptions::SubscriptionSet;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Delivery quality requested for a publish or subscription.
///
/// The bus is solely responsible for honouring it; coordinators only pass
/// it through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    /// Fire and forget (QoS 0).
    AtMostOnce,
    /// Acknowledged delivery, duplicates possible (QoS 1).
    #[default]
    AtLeastOnce,
    /// Four-way handshake, no duplicates (QoS 2).
    ExactlyOnce,
}

impl Qos {
    /// Returns the numeric MQTT level (0, 1 or 2).
    pub fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

/// Options attached to a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOptions {
    pub qos: Qos,
    /// Keep this payload as the topic's retained message, redelivered to
    /// every future subscriber until overwritten.
    pub retain: bool,
}

impl PublishOptions {
    /// Non-retained publish at the given quality.
    pub fn with_qos(qos: Qos) -> Self {
        Self { qos, retain: false }
    }

    /// Retained publish at the given quality.
    pub fn retained(qos: Qos) -> Self {
        Self { qos, retain: true }
    }
}

/// One message handed to a client's global handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The concrete topic the message was published on (never a filter).
    pub topic: String,
    /// Raw payload bytes, uninterpreted by the bus.
    pub payload: Vec<u8>,
    /// `true` when this is a replay of a retained message triggered by a
    /// new subscription rather than a live publish.
    pub retained: bool,
}

/// The channel a bus pushes deliveries into.
pub type DeliverySink = mpsc::UnboundedSender<Delivery>;

/// The publish/subscribe contract Parley is built on.
///
/// All methods are fire-and-forget: they return as soon as the request is
/// handed to the bus. Acknowledgement (QoS) is the bus's business and never
/// surfaces here.
pub trait MessageBus: Send + Sync + 'static {
    /// This process's stable identity on the bus.
    fn client_id(&self) -> &str;

    /// Publishes `payload` on `topic`.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        options: PublishOptions,
    ) -> Result<(), BusError>;

    /// Subscribes to `filter`, which may end in the multi-level wildcard
    /// `#` or contain single-level `+` wildcards.
    fn subscribe(&self, filter: &str, qos: Qos) -> Result<(), BusError>;

    /// Removes a subscription previously made with the exact same filter.
    fn unsubscribe(&self, filter: &str) -> Result<(), BusError>;

    /// Registers the sink that receives every delivery for this client.
    /// Replaces any previously registered sink.
    fn set_global_handler(&self, sink: DeliverySink);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_default_is_at_least_once() {
        assert_eq!(Qos::default(), Qos::AtLeastOnce);
        assert_eq!(Qos::default().level(), 1);
    }

    #[test]
    fn test_publish_options_constructors() {
        let plain = PublishOptions::with_qos(Qos::AtMostOnce);
        assert!(!plain.retain);
        assert_eq!(plain.qos.level(), 0);

        let kept = PublishOptions::retained(Qos::ExactlyOnce);
        assert!(kept.retain);
        assert_eq!(kept.qos.level(), 2);
    }

    #[test]
    fn test_qos_serializes_as_snake_case() {
        let json = serde_json::to_string(&Qos::AtLeastOnce).unwrap();
        assert_eq!(json, "\"at_least_once\"");
        let qos: Qos = serde_json::from_str("\"exactly_once\"").unwrap();
        assert_eq!(qos, Qos::ExactlyOnce);
    }
}
