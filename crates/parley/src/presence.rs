//! Online/offline presence over retained records.
//!
//! Each peer keeps one retained record on `presence/{identity}`. Because
//! the record is retained, subscribing to `presence/#` immediately yields
//! the last known status of every peer, and an "offline" publish simply
//! overwrites the "online" one.

use std::collections::BTreeMap;
use std::sync::Arc;

use parley_bus::{MessageBus, PublishOptions, Qos, SubscriptionSet};
use parley_events::Event;
use parley_protocol::topics::{PRESENCE_WILDCARD, presence_topic};
use parley_protocol::{
    Codec, JsonCodec, PresenceRecord, PresenceStatus, UserId, WireMessage,
    now,
};

use crate::ParleyError;

/// Publishes our status and tracks everyone else's.
pub struct PresenceTracker<B: MessageBus, C: Codec = JsonCodec> {
    me: UserId,
    bus: Arc<B>,
    codec: C,
    qos: Qos,
    status: Option<PresenceStatus>,
    peers: BTreeMap<UserId, PresenceRecord>,
    subscriptions: SubscriptionSet,
}

impl<B: MessageBus, C: Codec> PresenceTracker<B, C> {
    pub fn new(me: UserId, bus: Arc<B>, codec: C, qos: Qos) -> Self {
        Self {
            me,
            bus,
            codec,
            qos,
            status: None,
            peers: BTreeMap::new(),
            subscriptions: SubscriptionSet::new(),
        }
    }

    /// Publishes a retained "online" record and starts watching peers.
    pub fn go_online(&mut self) -> Result<(), ParleyError> {
        self.announce(PresenceStatus::Online)?;
        self.subscriptions
            .subscribe(self.bus.as_ref(), PRESENCE_WILDCARD, self.qos)?;
        Ok(())
    }

    /// Overwrites our retained record with "offline".
    pub fn go_offline(&mut self) -> Result<(), ParleyError> {
        self.announce(PresenceStatus::Offline)
    }

    /// Re-subscribes the presence wildcard so the bus replays every
    /// retained record.
    pub fn refresh(&mut self) -> Result<(), ParleyError> {
        self.subscriptions
            .unsubscribe(self.bus.as_ref(), PRESENCE_WILDCARD)?;
        self.subscriptions
            .subscribe(self.bus.as_ref(), PRESENCE_WILDCARD, self.qos)?;
        tracing::debug!("presence refreshed");
        Ok(())
    }

    /// A peer's presence record arrived.
    ///
    /// A replay of the record we already hold is not reported again.
    pub fn on_presence(&mut self, record: PresenceRecord) -> Option<Event> {
        if self.peers.get(&record.user_id) == Some(&record) {
            return None;
        }
        tracing::debug!(user_id = %record.user_id, status = %record.status, "presence changed");
        self.peers.insert(record.user_id.clone(), record.clone());
        Some(Event::PresenceUpdate {
            user_id: record.user_id,
            status: record.status,
            timestamp: record.timestamp,
        })
    }

    /// Last known record of every peer seen.
    pub fn peers(&self) -> Vec<PresenceRecord> {
        self.peers.values().cloned().collect()
    }

    /// Returns `true` if `user`'s last known status is online.
    pub fn is_online(&self, user: &UserId) -> bool {
        self.peers
            .get(user)
            .is_some_and(|r| r.status == PresenceStatus::Online)
    }

    /// Our own last announced status, if any.
    pub fn status(&self) -> Option<PresenceStatus> {
        self.status
    }

    fn announce(&mut self, status: PresenceStatus) -> Result<(), ParleyError> {
        let record = WireMessage::Presence(PresenceRecord {
            user_id: self.me.clone(),
            status,
            timestamp: now(),
        });
        let payload = self.codec.encode(&record)?;
        self.bus
            .publish(
                &presence_topic(&self.me),
                payload,
                PublishOptions::retained(self.qos),
            )?;
        self.status = Some(status);
        tracing::info!(user_id = %self.me, %status, "presence announced");
        Ok(())
    }
}
