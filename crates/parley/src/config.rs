//! Client configuration.

use parley_bus::Qos;
use parley_events::DEFAULT_WARN_THRESHOLD;
use serde::{Deserialize, Serialize};

/// Configuration for a [`ParleyClient`](crate::ParleyClient).
///
/// Every field has a default, so a config file only needs to name what it
/// changes:
///
/// ```
/// let config: parley::ClientConfig =
///     serde_json::from_str(r#"{ "qos": "exactly_once" }"#).unwrap();
/// assert!(config.announce_presence);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Delivery quality for every publish and subscription.
    pub qos: Qos,

    /// Capacity of the command channel between client handles and the
    /// client task. Callers wait when it is full.
    pub command_channel_size: usize,

    /// Pending-event count at which a warning is logged. The event queue
    /// itself is unbounded. `0` disables the warning.
    pub queue_warn_threshold: usize,

    /// Publish a retained "online" record and watch every peer's presence
    /// on connect.
    pub announce_presence: bool,

    /// Subscribe to the group directory on connect.
    pub list_groups_on_start: bool,

    /// Subscribe to our own saved conversation list on connect.
    pub load_conversations: bool,

    /// Publish a retained "offline" record when the client stops.
    pub offline_on_shutdown: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            qos: Qos::AtLeastOnce,
            command_channel_size: 64,
            queue_warn_threshold: DEFAULT_WARN_THRESHOLD,
            announce_presence: true,
            list_groups_on_start: true,
            load_conversations: true,
            offline_on_shutdown: true,
        }
    }
}
