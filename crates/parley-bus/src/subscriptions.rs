//! Per-owner subscription bookkeeping.

use std::collections::BTreeSet;

use crate::{BusError, MessageBus, Qos};

/// Tracks which filters one owner has subscribed to, so each filter is
/// subscribed on the bus at most once.
///
/// Not thread-safe on its own; it lives inside a coordinator that is
/// already accessed from a single task.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    filters: BTreeSet<String>,
}

impl SubscriptionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to `filter` unless it is already held.
    ///
    /// Returns `Ok(true)` if the bus was asked to subscribe, `Ok(false)`
    /// if the filter was already held and nothing was sent.
    pub fn subscribe<B: MessageBus + ?Sized>(
        &mut self,
        bus: &B,
        filter: &str,
        qos: Qos,
    ) -> Result<bool, BusError> {
        if self.filters.contains(filter) {
            return Ok(false);
        }
        bus.subscribe(filter, qos)?;
        self.filters.insert(filter.to_string());
        tracing::debug!(client_id = bus.client_id(), filter, "subscribed");
        Ok(true)
    }

    /// Unsubscribes from `filter` if it is held.
    ///
    /// Returns `Ok(true)` if the bus was asked to unsubscribe.
    pub fn unsubscribe<B: MessageBus + ?Sized>(
        &mut self,
        bus: &B,
        filter: &str,
    ) -> Result<bool, BusError> {
        if !self.filters.contains(filter) {
            return Ok(false);
        }
        bus.unsubscribe(filter)?;
        self.filters.remove(filter);
        tracing::debug!(client_id = bus.client_id(), filter, "unsubscribed");
        Ok(true)
    }

    /// Returns `true` if `filter` is currently held.
    pub fn contains(&self, filter: &str) -> bool {
        self.filters.contains(filter)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
