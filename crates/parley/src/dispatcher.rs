//! Classification of inbound deliveries.
//!
//! The bus hands the client every delivery through one channel, whichever
//! subscription matched it. The [`Dispatcher`] turns each raw
//! `(topic, payload)` pair into exactly one of:
//!
//! - [`Classified::Inbound`] — a validated payload for a coordinator
//! - [`Classified::Ignored`] — nothing to report (retained-record clears,
//!   our own publishes echoed back)
//! - [`Classified::Error`] — an [`Event::Error`] describing why the
//!   delivery could not be used
//!
//! It never panics and never returns an error to the bus. Routing the
//! inbound value to the owning coordinator is the client task's job.

use parley_bus::Delivery;
use parley_events::Event;
use parley_protocol::{
    ChatMessage, Codec, ConversationList, GroupInfo, GroupJoinApproved,
    GroupJoinRejected, GroupJoinRequest, GroupMessage, GroupRemoved,
    InviteAccept, InviteReject, InviteRequest, JsonCodec, PresenceRecord,
    TopicKind, UserId, WireMessage,
};

/// A validated inbound payload, ready for its coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    // -- Session --
    Invite(InviteRequest),
    InviteAccepted(InviteAccept),
    InviteRejected(InviteReject),
    Chat { topic: String, message: ChatMessage },
    Conversations(ConversationList),

    // -- Group --
    JoinRequest(GroupJoinRequest),
    JoinApproved(GroupJoinApproved),
    JoinRejected(GroupJoinRejected),
    GroupMessage { topic: String, message: GroupMessage },
    GroupAdvertised(GroupInfo),
    GroupRemoved(GroupRemoved),

    // -- Presence --
    Presence(PresenceRecord),
}

/// What the dispatcher made of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Inbound(Inbound),
    Ignored,
    Error(Event),
}

/// Stateless classifier for one identity's deliveries.
#[derive(Debug, Clone)]
pub struct Dispatcher<C: Codec = JsonCodec> {
    me: UserId,
    codec: C,
}

impl<C: Codec> Dispatcher<C> {
    pub fn new(me: UserId, codec: C) -> Self {
        Self { me, codec }
    }

    /// Classifies one delivery.
    ///
    /// Checks, in order: empty payload (a retained record being cleared),
    /// topic namespace, payload decoding, that the payload type belongs
    /// on that namespace (and that personal topics are ours), and finally
    /// whether we authored it.
    pub fn classify(&self, delivery: &Delivery) -> Classified {
        let topic = delivery.topic.as_str();

        if delivery.payload.is_empty() {
            tracing::debug!(topic, "empty payload (cleared record), ignoring");
            return Classified::Ignored;
        }

        let Some(kind) = TopicKind::parse(topic) else {
            return self.reject(delivery, "topic is outside every known namespace");
        };

        let message: WireMessage = match self.codec.decode(&delivery.payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(topic, error = %e, "undecodable payload");
                return Classified::Error(Event::parse_error(
                    topic,
                    &delivery.payload,
                    e.to_string(),
                ));
            }
        };

        let type_name = message.type_name();
        let inbound = match self.route(kind, topic, message) {
            Ok(inbound) => inbound,
            Err(reason) => return self.reject(delivery, &reason),
        };

        if self.is_own(&inbound) {
            tracing::trace!(topic, type_name, "own publish echoed back, dropping");
            return Classified::Ignored;
        }

        tracing::debug!(topic, namespace = kind.namespace(), type_name, "delivery classified");
        Classified::Inbound(inbound)
    }

    /// Pairs a namespace with the payload types allowed on it.
    fn route(
        &self,
        kind: TopicKind<'_>,
        topic: &str,
        message: WireMessage,
    ) -> Result<Inbound, String> {
        match kind {
            TopicKind::Control { user } | TopicKind::Conversations { user }
                if user != self.me.as_str() =>
            {
                Err(format!("personal topic of {user} delivered to {}", self.me))
            }
            TopicKind::Control { .. } => match message {
                WireMessage::Invite(m) => Ok(Inbound::Invite(m)),
                WireMessage::InviteAccepted(m) => Ok(Inbound::InviteAccepted(m)),
                WireMessage::InviteRejected(m) => Ok(Inbound::InviteRejected(m)),
                WireMessage::JoinRequest(m) => Ok(Inbound::JoinRequest(m)),
                WireMessage::JoinApproved(m) => Ok(Inbound::JoinApproved(m)),
                WireMessage::JoinRejected(m) => Ok(Inbound::JoinRejected(m)),
                other => Err(misplaced(&other, kind)),
            },
            TopicKind::Conversations { .. } => match message {
                WireMessage::Conversations(m) => Ok(Inbound::Conversations(m)),
                other => Err(misplaced(&other, kind)),
            },
            TopicKind::Chat { .. } => match message {
                WireMessage::Chat(m) => Ok(Inbound::Chat {
                    topic: topic.to_string(),
                    message: m,
                }),
                other => Err(misplaced(&other, kind)),
            },
            TopicKind::GroupChat { group } => match message {
                WireMessage::GroupMessage(m) if m.group_id.as_str() == group => {
                    Ok(Inbound::GroupMessage {
                        topic: topic.to_string(),
                        message: m,
                    })
                }
                WireMessage::GroupMessage(m) => Err(format!(
                    "group message for {} on the topic of group {group}",
                    m.group_id
                )),
                other => Err(misplaced(&other, kind)),
            },
            TopicKind::GroupDiscovery { group } => match message {
                WireMessage::GroupAdvertised(m) if m.group_id.as_str() == group => {
                    Ok(Inbound::GroupAdvertised(m))
                }
                WireMessage::GroupRemoved(m) if m.group_id.as_str() == group => {
                    Ok(Inbound::GroupRemoved(m))
                }
                WireMessage::GroupAdvertised(_) | WireMessage::GroupRemoved(_) => {
                    Err(format!("advertisement for another group on the topic of group {group}"))
                }
                other => Err(misplaced(&other, kind)),
            },
            TopicKind::Presence { user } => match message {
                WireMessage::Presence(m) if m.user_id.as_str() == user => {
                    Ok(Inbound::Presence(m))
                }
                WireMessage::Presence(m) => Err(format!(
                    "presence of {} on the topic of {user}",
                    m.user_id
                )),
                other => Err(misplaced(&other, kind)),
            },
        }
    }

    /// Chat, group and presence payloads we authored come back to us
    /// because we are subscribed to the topics we publish on.
    fn is_own(&self, inbound: &Inbound) -> bool {
        let author = match inbound {
            Inbound::Chat { message, .. } => &message.from,
            Inbound::GroupMessage { message, .. } => &message.from,
            Inbound::Presence(record) => &record.user_id,
            _ => return false,
        };
        *author == self.me
    }

    fn reject(&self, delivery: &Delivery, reason: &str) -> Classified {
        tracing::warn!(topic = %delivery.topic, reason, "delivery rejected");
        Classified::Error(Event::parse_error(
            &delivery.topic,
            &delivery.payload,
            reason,
        ))
    }
}

fn misplaced(message: &WireMessage, kind: TopicKind<'_>) -> String {
    format!(
        "{} payload is not valid on a {} topic",
        message.type_name(),
        kind.namespace()
    )
}
