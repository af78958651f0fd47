//! Test double for [`MessageBus`]: records every call, delivers nothing.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{BusError, DeliverySink, MessageBus, PublishOptions, Qos};

/// One recorded bus call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Publish {
        topic: String,
        payload: Vec<u8>,
        options: PublishOptions,
    },
    Subscribe {
        filter: String,
        qos: Qos,
    },
    Unsubscribe {
        filter: String,
    },
}

/// Which calls an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailOn {
    Any,
    Publish,
    Subscribe,
}

#[derive(Default)]
struct Recorded {
    ops: Vec<BusOp>,
    fail_next: Option<(FailOn, String)>,
}

/// A [`MessageBus`] that records calls in order.
///
/// Use [`fail_next`](Self::fail_next) to make the following call fail with
/// [`BusError::Disconnected`], or [`fail_next_publish`](Self::fail_next_publish)
/// / [`fail_next_subscribe`](Self::fail_next_subscribe) to let other calls
/// through until the first call of that kind.
pub struct RecordingBus {
    client_id: String,
    recorded: Mutex<Recorded>,
}

impl RecordingBus {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: BusOp) -> Result<(), BusError> {
        let mut recorded = self.lock();
        let hit = match (&recorded.fail_next, &op) {
            (None, _) => false,
            (Some((FailOn::Any, _)), _) => true,
            (Some((FailOn::Publish, _)), BusOp::Publish { .. }) => true,
            (Some((FailOn::Subscribe, _)), BusOp::Subscribe { .. }) => true,
            _ => false,
        };
        if hit {
            if let Some((_, reason)) = recorded.fail_next.take() {
                return Err(BusError::Disconnected(reason));
            }
        }
        recorded.ops.push(op);
        Ok(())
    }

    /// Makes the next bus call fail.
    pub fn fail_next(&self, reason: &str) {
        self.lock().fail_next = Some((FailOn::Any, reason.to_string()));
    }

    /// Makes the next `publish` fail; other calls still succeed.
    pub fn fail_next_publish(&self, reason: &str) {
        self.lock().fail_next = Some((FailOn::Publish, reason.to_string()));
    }

    /// Makes the next `subscribe` fail; other calls still succeed.
    pub fn fail_next_subscribe(&self, reason: &str) {
        self.lock().fail_next = Some((FailOn::Subscribe, reason.to_string()));
    }

    /// All recorded calls, oldest first.
    pub fn ops(&self) -> Vec<BusOp> {
        self.lock().ops.clone()
    }

    /// Filters passed to `subscribe`, in call order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::Subscribe { filter, .. } => Some(filter),
                _ => None,
            })
            .collect()
    }

    /// Filters passed to `unsubscribe`, in call order.
    pub fn unsubscriptions(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::Unsubscribe { filter } => Some(filter),
                _ => None,
            })
            .collect()
    }

    /// `(topic, payload, options)` of every publish, in call order.
    pub fn published(&self) -> Vec<(String, Vec<u8>, PublishOptions)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::Publish { topic, payload, options } => {
                    Some((topic, payload, options))
                }
                _ => None,
            })
            .collect()
    }

    /// Payloads published on exactly `topic`, in call order.
    pub fn published_to(&self, topic: &str) -> Vec<Vec<u8>> {
        self.published()
            .into_iter()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, payload, _)| payload)
            .collect()
    }

    /// Forgets all recorded calls.
    pub fn clear(&self) {
        self.lock().ops.clear();
    }
}

impl MessageBus for RecordingBus {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        options: PublishOptions,
    ) -> Result<(), BusError> {
        crate::validate_topic(topic)?;
        self.record(BusOp::Publish {
            topic: topic.to_string(),
            payload,
            options,
        })
    }

    fn subscribe(&self, filter: &str, qos: Qos) -> Result<(), BusError> {
        crate::validate_filter(filter)?;
        self.record(BusOp::Subscribe {
            filter: filter.to_string(),
            qos,
        })
    }

    fn unsubscribe(&self, filter: &str) -> Result<(), BusError> {
        self.record(BusOp::Unsubscribe {
            filter: filter.to_string(),
        })
    }

    /// Nothing is ever delivered, so the sink is dropped.
    fn set_global_handler(&self, _sink: DeliverySink) {}
}
