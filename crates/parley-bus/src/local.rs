//! In-process broker with retained messages and wildcard subscriptions.
//!
//! [`LocalBus`] is the broker; each participant gets a [`LocalBusClient`]
//! from [`LocalBus::connect`]. Several clients on one broker behave like
//! separate processes attached to the same MQTT server: they share the
//! retained store and see each other's publishes, nothing else.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    BusError, Delivery, DeliverySink, MessageBus, PublishOptions, Qos,
    topic_matches, validate_filter, validate_topic,
};

#[derive(Default)]
struct ClientEntry {
    filters: BTreeSet<String>,
    sink: Option<DeliverySink>,
}

impl ClientEntry {
    fn matches(&self, topic: &str) -> bool {
        self.filters.iter().any(|f| topic_matches(f, topic))
    }

    fn deliver(&self, client_id: &str, delivery: Delivery) {
        match &self.sink {
            Some(sink) => {
                if sink.send(delivery).is_err() {
                    tracing::debug!(client_id, "delivery sink closed, dropping");
                }
            }
            None => {
                tracing::debug!(
                    client_id,
                    topic = %delivery.topic,
                    "no global handler registered, dropping delivery"
                );
            }
        }
    }
}

#[derive(Default)]
struct Broker {
    /// Last retained payload per exact topic.
    retained: BTreeMap<String, Vec<u8>>,
    clients: HashMap<String, ClientEntry>,
}

/// An in-process publish/subscribe broker.
///
/// Cheap to clone; every clone refers to the same broker.
///
/// Semantics follow MQTT where it matters to Parley:
/// - a retained publish replaces the topic's retained payload, and an
///   empty retained payload clears it (still forwarded to live subscribers);
/// - subscribing immediately replays every retained message the new filter
///   matches, flagged with [`Delivery::retained`];
/// - a publish reaches each client at most once, even when several of its
///   filters match;
/// - publishers receive their own messages when subscribed to the topic.
#[derive(Clone, Default)]
pub struct LocalBus {
    broker: Arc<Mutex<Broker>>,
}

impl LocalBus {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Broker> {
        self.broker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches a new client with the given identity.
    ///
    /// # Errors
    /// [`BusError::ClientIdInUse`] if a client with this id is still
    /// connected.
    pub fn connect(
        &self,
        client_id: impl Into<String>,
    ) -> Result<LocalBusClient, BusError> {
        let client_id = client_id.into();
        let mut broker = self.lock();
        if broker.clients.contains_key(&client_id) {
            return Err(BusError::ClientIdInUse(client_id));
        }
        broker.clients.insert(client_id.clone(), ClientEntry::default());
        tracing::info!(%client_id, "client connected to local bus");
        Ok(LocalBusClient {
            client_id,
            bus: self.clone(),
        })
    }

    /// Returns the retained payload currently stored for `topic`.
    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.lock().retained.get(topic).cloned()
    }

    /// Lists every topic that currently holds a retained payload.
    pub fn retained_topics(&self) -> Vec<String> {
        self.lock().retained.keys().cloned().collect()
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }

    fn disconnect(&self, client_id: &str) {
        if self.lock().clients.remove(client_id).is_some() {
            tracing::info!(client_id, "client disconnected from local bus");
        }
    }
}

/// One participant's connection to a [`LocalBus`].
///
/// Dropping the client disconnects it and discards its subscriptions.
pub struct LocalBusClient {
    client_id: String,
    bus: LocalBus,
}

impl LocalBusClient {
    fn with_entry<T>(
        &self,
        f: impl FnOnce(&mut Broker, &str) -> T,
    ) -> Result<T, BusError> {
        let mut broker = self.bus.lock();
        if !broker.clients.contains_key(&self.client_id) {
            return Err(BusError::Disconnected(self.client_id.clone()));
        }
        Ok(f(&mut broker, &self.client_id))
    }
}

impl MessageBus for LocalBusClient {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        options: PublishOptions,
    ) -> Result<(), BusError> {
        validate_topic(topic)?;
        self.with_entry(|broker, publisher| {
            if options.retain {
                if payload.is_empty() {
                    broker.retained.remove(topic);
                } else {
                    broker.retained.insert(topic.to_string(), payload.clone());
                }
            }

            let mut recipients = 0usize;
            for (client_id, entry) in &broker.clients {
                if entry.matches(topic) {
                    entry.deliver(
                        client_id,
                        Delivery {
                            topic: topic.to_string(),
                            payload: payload.clone(),
                            retained: false,
                        },
                    );
                    recipients += 1;
                }
            }

            tracing::trace!(
                publisher,
                topic,
                retain = options.retain,
                qos = options.qos.level(),
                recipients,
                "published"
            );
        })
    }

    fn subscribe(&self, filter: &str, _qos: Qos) -> Result<(), BusError> {
        validate_filter(filter)?;
        self.with_entry(|broker, client_id| {
            let Broker { retained, clients } = broker;
            let Some(entry) = clients.get_mut(client_id) else {
                return;
            };
            entry.filters.insert(filter.to_string());

            for (topic, payload) in retained.iter() {
                if topic_matches(filter, topic) {
                    entry.deliver(
                        client_id,
                        Delivery {
                            topic: topic.clone(),
                            payload: payload.clone(),
                            retained: true,
                        },
                    );
                }
            }
        })
    }

    fn unsubscribe(&self, filter: &str) -> Result<(), BusError> {
        self.with_entry(|broker, client_id| {
            if let Some(entry) = broker.clients.get_mut(client_id) {
                entry.filters.remove(filter);
            }
        })
    }

    fn set_global_handler(&self, sink: DeliverySink) {
        let result = self.with_entry(|broker, client_id| {
            if let Some(entry) = broker.clients.get_mut(client_id) {
                entry.sink = Some(sink);
            }
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "cannot register handler");
        }
    }
}

impl Drop for LocalBusClient {
    fn drop(&mut self) {
        self.bus.disconnect(&self.client_id);
    }
}
