//! The session coordinator: invite handshake plus one-to-one chats.
//!
//! # Concurrency note
//!
//! Like every coordinator in Parley, `SessionCoordinator` is a plain struct
//! with `&mut self` methods and no internal locking. It is owned by the
//! client actor, which feeds it both caller commands and bus deliveries
//! from a single task, so the maps below are never touched concurrently.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parley_bus::{MessageBus, PublishOptions, Qos, SubscriptionSet};
use parley_events::Event;
use parley_protocol::topics::{
    canonical_chat_topic, control_topic, conversations_topic,
};
use parley_protocol::{
    ChatMessage, Codec, ConversationEntry, ConversationList, InviteAccept,
    InviteReject, InviteRequest, JsonCodec, MessageId, RequestId, UserId,
    WireMessage, now,
};

use crate::{IncomingInvite, InviteState, OutgoingInvite, SessionError};

/// Runs the invite handshake and owns this peer's one-to-one chats.
///
/// ## Lifecycle of one invite
///
/// ```text
/// sender                         receiver
/// send_invite() ──→ [Pending] ──→ on_invite()       [Pending]
///                                   │
///                      accept_invite() / reject_invite()
///                                   │
/// on_invite_accepted() ←────────────┤  [Accepted]  (both subscribe the chat)
/// on_invite_rejected() ←────────────┘  [Rejected]  (nothing subscribed)
/// ```
///
/// Command methods return `Result`; inbound handlers (`on_*`) return the
/// [`Event`] to surface, if any, and never fail.
pub struct SessionCoordinator<B: MessageBus, C: Codec = JsonCodec> {
    me: UserId,
    bus: Arc<B>,
    codec: C,
    qos: Qos,

    /// Invites we received, keyed by the sender's request id.
    incoming: HashMap<RequestId, IncomingInvite>,

    /// Invites we sent.
    outgoing: HashMap<RequestId, OutgoingInvite>,

    /// Chat topic → peer, for every chat currently subscribed.
    chats: BTreeMap<String, UserId>,

    subscriptions: SubscriptionSet,
}

impl<B: MessageBus, C: Codec> SessionCoordinator<B, C> {
    /// Creates a coordinator for identity `me`. Nothing is subscribed yet.
    pub fn new(me: UserId, bus: Arc<B>, codec: C, qos: Qos) -> Self {
        Self {
            me,
            bus,
            codec,
            qos,
            incoming: HashMap::new(),
            outgoing: HashMap::new(),
            chats: BTreeMap::new(),
            subscriptions: SubscriptionSet::new(),
        }
    }

    /// This peer's identity.
    pub fn me(&self) -> &UserId {
        &self.me
    }

    // -----------------------------------------------------------------
    // Invite commands
    // -----------------------------------------------------------------

    /// Invites `target` to a one-to-one chat.
    ///
    /// Each call mints a fresh request id; sending twice produces two
    /// independent pending invites on the other side.
    ///
    /// # Errors
    /// [`SessionError::SelfInvite`] if `target` is us; bus or encode
    /// failures otherwise.
    pub fn send_invite(
        &mut self,
        target: &UserId,
    ) -> Result<RequestId, SessionError> {
        if *target == self.me {
            return Err(SessionError::SelfInvite(target.clone()));
        }

        let request_id = RequestId::mint_invite();
        let sent_at = now();
        let invite = WireMessage::Invite(InviteRequest {
            from: self.me.clone(),
            request_id: request_id.clone(),
            timestamp: sent_at,
        });
        self.publish(&control_topic(target), &invite, false)?;

        self.outgoing.insert(
            request_id.clone(),
            OutgoingInvite {
                request_id: request_id.clone(),
                to: target.clone(),
                sent_at,
                state: InviteState::Pending,
            },
        );
        tracing::info!(%target, %request_id, "invite sent");
        Ok(request_id)
    }

    /// Accepts a pending incoming invite and joins the chat.
    ///
    /// Subscribes to the canonical chat topic first, then tells the
    /// inviter, so our own subscription is in place before they can start
    /// talking. Returns the chat topic.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] — no invite with this id was received
    /// - [`SessionError::AlreadyResolved`] — it was already answered
    pub fn accept_invite(
        &mut self,
        request_id: &RequestId,
    ) -> Result<String, SessionError> {
        let from = self.pending_incoming(request_id)?.from.clone();
        let already_joined = self
            .chats
            .contains_key(&canonical_chat_topic(&self.me, &from));
        let chat_topic = self.join_chat(&from)?;

        let accept = WireMessage::InviteAccepted(InviteAccept {
            from: self.me.clone(),
            to: from.clone(),
            chat_topic: chat_topic.clone(),
            request_id: request_id.clone(),
            timestamp: now(),
        });
        if let Err(e) = self.publish(&control_topic(&from), &accept, false) {
            // The invite stays pending; only undo a chat this call opened.
            if !already_joined {
                if let Err(undo) = self.leave_chat(&chat_topic) {
                    tracing::warn!(%chat_topic, error = %undo, "could not leave chat after failed accept");
                }
            }
            return Err(e);
        }

        self.resolve_incoming(request_id, InviteState::Accepted);
        tracing::info!(%from, %request_id, %chat_topic, "invite accepted");
        Ok(chat_topic)
    }

    /// Declines a pending incoming invite. No chat topic is subscribed.
    ///
    /// # Errors
    /// Same lookup rules as [`accept_invite`](Self::accept_invite).
    pub fn reject_invite(
        &mut self,
        request_id: &RequestId,
    ) -> Result<(), SessionError> {
        let from = self.pending_incoming(request_id)?.from.clone();

        let reject = WireMessage::InviteRejected(InviteReject {
            from: self.me.clone(),
            to: from.clone(),
            request_id: request_id.clone(),
            timestamp: now(),
        });
        self.publish(&control_topic(&from), &reject, false)?;

        self.resolve_incoming(request_id, InviteState::Rejected);
        tracing::info!(%from, %request_id, "invite rejected");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Chat commands
    // -----------------------------------------------------------------

    /// Subscribes to the chat with `peer` directly, without a handshake.
    ///
    /// Used to restore a saved conversation. Returns the chat topic.
    pub fn open_chat(&mut self, peer: &UserId) -> Result<String, SessionError> {
        self.join_chat(peer)
    }

    /// Leaves an active chat: unsubscribes its topic and forgets the peer.
    ///
    /// Nothing is sent; the peer keeps its own subscription. Returns the
    /// peer we were chatting with.
    ///
    /// # Errors
    /// [`SessionError::NotInChat`] if `chat_topic` is not an active chat.
    pub fn leave_chat(&mut self, chat_topic: &str) -> Result<UserId, SessionError> {
        if !self.chats.contains_key(chat_topic) {
            return Err(SessionError::NotInChat(chat_topic.to_string()));
        }
        self.subscriptions
            .unsubscribe(self.bus.as_ref(), chat_topic)?;
        let peer = self
            .chats
            .remove(chat_topic)
            .ok_or_else(|| SessionError::NotInChat(chat_topic.to_string()))?;
        tracing::info!(chat_topic, %peer, "left chat");
        Ok(peer)
    }

    /// Leaves every active chat. Returns the topics left.
    ///
    /// Stops at the first bus failure; chats left before it stay left.
    pub fn leave_all_chats(&mut self) -> Result<Vec<String>, SessionError> {
        let topics: Vec<String> = self.chats.keys().cloned().collect();
        for topic in &topics {
            self.leave_chat(topic)?;
        }
        Ok(topics)
    }

    /// Publishes a message on an active chat topic.
    ///
    /// The bus echoes it back to us as well; the dispatcher drops that
    /// echo because we are the author.
    ///
    /// # Errors
    /// [`SessionError::NotInChat`] if `chat_topic` is not an active chat.
    pub fn send_message(
        &mut self,
        chat_topic: &str,
        content: impl Into<String>,
    ) -> Result<MessageId, SessionError> {
        if !self.chats.contains_key(chat_topic) {
            return Err(SessionError::NotInChat(chat_topic.to_string()));
        }

        let message_id = MessageId::mint_chat();
        let message = WireMessage::Chat(ChatMessage {
            from: self.me.clone(),
            content: content.into(),
            message_id: message_id.clone(),
            chat_topic: chat_topic.to_string(),
            timestamp: now(),
        });
        self.publish(chat_topic, &message, false)?;

        tracing::debug!(chat_topic, %message_id, "chat message sent");
        Ok(message_id)
    }

    // -----------------------------------------------------------------
    // Saved conversations
    // -----------------------------------------------------------------

    /// Subscribes to our own retained conversation list, so the bus
    /// redelivers the last saved one.
    pub fn load_conversations(&mut self) -> Result<(), SessionError> {
        let topic = conversations_topic(&self.me);
        self.subscriptions.subscribe(self.bus.as_ref(), &topic, self.qos)?;
        Ok(())
    }

    /// Publishes `entries` as our retained conversation list, replacing
    /// whatever was saved before.
    pub fn save_conversations(
        &self,
        entries: Vec<ConversationEntry>,
    ) -> Result<(), SessionError> {
        let count = entries.len();
        let list = WireMessage::Conversations(ConversationList {
            conversations: entries,
        });
        self.publish(&conversations_topic(&self.me), &list, true)?;
        tracing::debug!(count, "conversations saved");
        Ok(())
    }

    /// Clears the retained conversation list.
    pub fn clear_conversations(&self) -> Result<(), SessionError> {
        self.bus.publish(
            &conversations_topic(&self.me),
            Vec::new(),
            PublishOptions::retained(self.qos),
        )?;
        tracing::debug!("conversations cleared");
        Ok(())
    }

    /// The active chats as conversation-list entries.
    pub fn conversation_entries(&self) -> Vec<ConversationEntry> {
        let timestamp = now();
        self.chats
            .iter()
            .map(|(topic, peer)| ConversationEntry {
                user_id: peer.to_string(),
                topic: topic.clone(),
                chat_individual: true,
                timestamp,
            })
            .collect()
    }

    // -----------------------------------------------------------------
    // Inbound handlers
    // -----------------------------------------------------------------

    /// Someone invited us.
    pub fn on_invite(&mut self, invite: InviteRequest) -> Option<Event> {
        if let Some(existing) = self.incoming.get(&invite.request_id) {
            tracing::debug!(
                request_id = %invite.request_id,
                state = %existing.state,
                "duplicate invite delivery, ignoring"
            );
            return None;
        }

        tracing::info!(from = %invite.from, request_id = %invite.request_id, "invite received");
        self.incoming.insert(
            invite.request_id.clone(),
            IncomingInvite {
                request_id: invite.request_id.clone(),
                from: invite.from.clone(),
                sent_at: invite.timestamp,
                state: InviteState::Pending,
            },
        );
        Some(Event::InviteReceived {
            from: invite.from,
            request_id: invite.request_id,
            timestamp: invite.timestamp,
        })
    }

    /// The peer accepted one of our invites.
    ///
    /// The chat topic is recomputed locally; the one in the payload is
    /// informational only. An accept for an invite we have no record of is
    /// still honoured (the topic is derivable from the two identities).
    pub fn on_invite_accepted(&mut self, accept: InviteAccept) -> Option<Event> {
        if accept.to != self.me {
            tracing::warn!(to = %accept.to, "invite accept addressed to someone else, ignoring");
            return None;
        }

        match self.outgoing.get_mut(&accept.request_id) {
            Some(invite) if invite.state.is_terminal() => {
                tracing::debug!(
                    request_id = %accept.request_id,
                    state = %invite.state,
                    "duplicate invite answer, ignoring"
                );
                return None;
            }
            Some(invite) => {
                if invite.to != accept.from {
                    tracing::warn!(
                        expected = %invite.to,
                        from = %accept.from,
                        "invite accepted by a different peer than invited"
                    );
                }
                invite.state = InviteState::Accepted;
            }
            None => {
                tracing::warn!(
                    from = %accept.from,
                    request_id = %accept.request_id,
                    "accept for unknown invite, joining chat anyway"
                );
            }
        }

        let chat_topic = match self.join_chat(&accept.from) {
            Ok(topic) => topic,
            Err(e) => return Some(Event::error(e.kind(), e.to_string())),
        };
        if chat_topic != accept.chat_topic {
            tracing::debug!(
                advertised = %accept.chat_topic,
                %chat_topic,
                "peer advertised a different chat topic, using canonical one"
            );
        }

        tracing::info!(from = %accept.from, %chat_topic, "invite accepted by peer");
        Some(Event::InviteAccepted {
            accepted_by: accept.from,
            chat_topic,
            request_id: accept.request_id,
            timestamp: accept.timestamp,
        })
    }

    /// The peer declined one of our invites.
    pub fn on_invite_rejected(&mut self, reject: InviteReject) -> Option<Event> {
        if reject.to != self.me {
            tracing::warn!(to = %reject.to, "invite reject addressed to someone else, ignoring");
            return None;
        }

        let Some(invite) = self.outgoing.get_mut(&reject.request_id) else {
            tracing::warn!(
                from = %reject.from,
                request_id = %reject.request_id,
                "reject for unknown invite, ignoring"
            );
            return None;
        };
        if invite.state.is_terminal() {
            tracing::debug!(request_id = %reject.request_id, "duplicate invite answer, ignoring");
            return None;
        }
        invite.state = InviteState::Rejected;

        tracing::info!(from = %reject.from, request_id = %reject.request_id, "invite rejected by peer");
        Some(Event::InviteRejected {
            rejected_by: reject.from,
            request_id: reject.request_id,
            timestamp: reject.timestamp,
        })
    }

    /// A peer wrote on `topic`.
    ///
    /// `topic` is the delivery topic; it wins over the `chatTopic` field in
    /// the payload.
    pub fn on_chat_message(
        &mut self,
        topic: &str,
        message: ChatMessage,
    ) -> Option<Event> {
        if !self.chats.contains_key(topic) {
            tracing::warn!(topic, from = %message.from, "message on a chat we are not in, ignoring");
            return None;
        }
        Some(Event::MessageReceived {
            from: message.from,
            content: message.content,
            message_id: message.message_id,
            chat_topic: topic.to_string(),
            timestamp: message.timestamp,
        })
    }

    /// Our saved conversation list arrived.
    pub fn on_conversations(&mut self, list: ConversationList) -> Option<Event> {
        tracing::debug!(count = list.conversations.len(), "conversations loaded");
        Some(Event::ConversationsLoaded {
            conversations: list.conversations,
        })
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Incoming invites still waiting for an answer.
    pub fn pending_invites(&self) -> Vec<IncomingInvite> {
        let mut pending: Vec<IncomingInvite> = self
            .incoming
            .values()
            .filter(|i| i.state == InviteState::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
        pending
    }

    /// Looks up an invite we received, in any state.
    pub fn incoming_invite(&self, request_id: &RequestId) -> Option<&IncomingInvite> {
        self.incoming.get(request_id)
    }

    /// Looks up an invite we sent, in any state.
    pub fn outgoing_invite(&self, request_id: &RequestId) -> Option<&OutgoingInvite> {
        self.outgoing.get(request_id)
    }

    /// Active chats as `(topic, peer)` pairs, sorted by topic.
    pub fn active_chats(&self) -> Vec<(String, UserId)> {
        self.chats
            .iter()
            .map(|(topic, peer)| (topic.clone(), peer.clone()))
            .collect()
    }

    /// Returns `true` if `topic` is one of our active chats.
    pub fn is_in_chat(&self, topic: &str) -> bool {
        self.chats.contains_key(topic)
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    fn pending_incoming(
        &self,
        request_id: &RequestId,
    ) -> Result<&IncomingInvite, SessionError> {
        let invite = self
            .incoming
            .get(request_id)
            .ok_or_else(|| SessionError::NotFound(request_id.clone()))?;
        if invite.state.is_terminal() {
            return Err(SessionError::AlreadyResolved(
                request_id.clone(),
                invite.state,
            ));
        }
        Ok(invite)
    }

    fn resolve_incoming(&mut self, request_id: &RequestId, state: InviteState) {
        if let Some(invite) = self.incoming.get_mut(request_id) {
            invite.state = state;
        }
    }

    /// Subscribes to the canonical topic shared with `peer` and records it.
    fn join_chat(&mut self, peer: &UserId) -> Result<String, SessionError> {
        let topic = canonical_chat_topic(&self.me, peer);
        self.subscriptions.subscribe(self.bus.as_ref(), &topic, self.qos)?;
        self.chats.insert(topic.clone(), peer.clone());
        Ok(topic)
    }

    fn publish(
        &self,
        topic: &str,
        message: &WireMessage,
        retain: bool,
    ) -> Result<(), SessionError> {
        let payload = self.codec.encode(message)?;
        let options = if retain {
            PublishOptions::retained(self.qos)
        } else {
            PublishOptions::with_qos(self.qos)
        };
        self.bus.publish(topic, payload, options)?;
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionCoordinator`, driven against a `RecordingBus`
    //! so every publish and subscribe can be asserted exactly.

    use parley_bus::testing::RecordingBus;
    use parley_events::ErrorKind;
    use parley_protocol::Timestamp;

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn ts() -> Timestamp {
        "2026-01-02T03:04:05Z".parse().unwrap()
    }

    fn coordinator(me: &str) -> (SessionCoordinator<RecordingBus>, Arc<RecordingBus>) {
        let bus = Arc::new(RecordingBus::new(me));
        let coordinator =
            SessionCoordinator::new(uid(me), Arc::clone(&bus), JsonCodec, Qos::AtLeastOnce);
        (coordinator, bus)
    }

    fn decode(payload: &[u8]) -> WireMessage {
        serde_json::from_slice(payload).unwrap()
    }

    fn invite_from(from: &str, request_id: &str) -> InviteRequest {
        InviteRequest {
            from: uid(from),
            request_id: RequestId::new(request_id),
            timestamp: ts(),
        }
    }

    // =====================================================================
    // send_invite()
    // =====================================================================

    #[test]
    fn test_send_invite_publishes_to_target_control_topic() {
        let (mut alice, bus) = coordinator("alice");

        let request_id = alice.send_invite(&uid("bob")).unwrap();

        let sent = bus.published_to("control/bob");
        assert_eq!(sent.len(), 1);
        match decode(&sent[0]) {
            WireMessage::Invite(invite) => {
                assert_eq!(invite.from, uid("alice"));
                assert_eq!(invite.request_id, request_id);
            }
            other => panic!("unexpected {other:?}"),
        }
        let record = alice.outgoing_invite(&request_id).unwrap();
        assert_eq!(record.state, InviteState::Pending);
        assert_eq!(record.to, uid("bob"));
    }

    #[test]
    fn test_send_invite_twice_mints_distinct_ids() {
        let (mut alice, bus) = coordinator("alice");

        let first = alice.send_invite(&uid("bob")).unwrap();
        let second = alice.send_invite(&uid("bob")).unwrap();

        assert_ne!(first, second);
        assert_eq!(bus.published_to("control/bob").len(), 2);
    }

    #[test]
    fn test_send_invite_to_self_returns_error() {
        let (mut alice, bus) = coordinator("alice");

        let result = alice.send_invite(&uid("alice"));

        assert!(matches!(result, Err(SessionError::SelfInvite(_))));
        assert!(bus.published().is_empty());
    }

    #[test]
    fn test_send_invite_bus_failure_records_nothing() {
        let (mut alice, bus) = coordinator("alice");
        bus.fail_next("offline");

        let result = alice.send_invite(&uid("bob"));

        assert!(matches!(result, Err(SessionError::Bus(_))));
        assert!(alice.outgoing.is_empty());
    }

    // =====================================================================
    // accept_invite() / reject_invite()
    // =====================================================================

    #[test]
    fn test_accept_invite_subscribes_then_publishes_accept() {
        let (mut bob, bus) = coordinator("bob");
        bob.on_invite(invite_from("alice", "invite_1_a"));

        let topic = bob.accept_invite(&RequestId::new("invite_1_a")).unwrap();

        assert_eq!(topic, "chat/alice_bob");
        assert_eq!(bus.subscriptions(), vec!["chat/alice_bob".to_string()]);
        let sent = bus.published_to("control/alice");
        assert_eq!(sent.len(), 1);
        match decode(&sent[0]) {
            WireMessage::InviteAccepted(accept) => {
                assert_eq!(accept.from, uid("bob"));
                assert_eq!(accept.to, uid("alice"));
                assert_eq!(accept.chat_topic, "chat/alice_bob");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(bob.is_in_chat("chat/alice_bob"));
        assert!(bob.pending_invites().is_empty());
    }

    #[test]
    fn test_accept_invite_publish_failure_leaves_chat_and_keeps_pending() {
        let (mut bob, bus) = coordinator("bob");
        bob.on_invite(invite_from("alice", "invite_1_a"));
        bus.fail_next_publish("offline");

        let result = bob.accept_invite(&RequestId::new("invite_1_a"));

        assert!(matches!(result, Err(SessionError::Bus(_))));
        assert!(!bob.is_in_chat("chat/alice_bob"));
        assert_eq!(bus.subscriptions(), vec!["chat/alice_bob".to_string()]);
        assert_eq!(bus.unsubscriptions(), vec!["chat/alice_bob".to_string()]);
        assert_eq!(bob.pending_invites().len(), 1);

        // Declining afterwards leaves nothing subscribed.
        bus.clear();
        bob.reject_invite(&RequestId::new("invite_1_a")).unwrap();
        assert!(bus.subscriptions().is_empty());
        assert!(bob.active_chats().is_empty());
    }

    #[test]
    fn test_accept_invite_publish_failure_keeps_chat_opened_earlier() {
        let (mut bob, bus) = coordinator("bob");
        bob.open_chat(&uid("alice")).unwrap();
        bob.on_invite(invite_from("alice", "invite_1_a"));
        bus.fail_next_publish("offline");

        let result = bob.accept_invite(&RequestId::new("invite_1_a"));

        assert!(result.is_err());
        assert!(bob.is_in_chat("chat/alice_bob"));
        assert!(bus.unsubscriptions().is_empty());
    }

    #[test]
    fn test_accept_invite_unknown_id_returns_not_found() {
        let (mut bob, bus) = coordinator("bob");

        let result = bob.accept_invite(&RequestId::new("never_issued"));

        assert!(matches!(result, Err(SessionError::NotFound(_))));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
        assert!(bus.ops().is_empty());
    }

    #[test]
    fn test_reject_invite_unknown_id_returns_not_found() {
        let (mut bob, _bus) = coordinator("bob");

        let result = bob.reject_invite(&RequestId::new("never_issued"));

        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_accept_invite_twice_returns_already_resolved() {
        let (mut bob, _bus) = coordinator("bob");
        bob.on_invite(invite_from("alice", "invite_1_a"));
        bob.accept_invite(&RequestId::new("invite_1_a")).unwrap();

        let result = bob.accept_invite(&RequestId::new("invite_1_a"));

        assert!(matches!(
            result,
            Err(SessionError::AlreadyResolved(_, InviteState::Accepted))
        ));
    }

    #[test]
    fn test_reject_invite_publishes_reject_without_subscribing() {
        let (mut bob, bus) = coordinator("bob");
        bob.on_invite(invite_from("alice", "invite_1_a"));

        bob.reject_invite(&RequestId::new("invite_1_a")).unwrap();

        assert!(bus.subscriptions().is_empty());
        let sent = bus.published_to("control/alice");
        assert!(matches!(decode(&sent[0]), WireMessage::InviteRejected(_)));
        assert_eq!(
            bob.incoming_invite(&RequestId::new("invite_1_a")).unwrap().state,
            InviteState::Rejected
        );

        // Accepting after rejecting is refused.
        let result = bob.accept_invite(&RequestId::new("invite_1_a"));
        assert!(matches!(
            result,
            Err(SessionError::AlreadyResolved(_, InviteState::Rejected))
        ));
    }

    // =====================================================================
    // Inbound handlers
    // =====================================================================

    #[test]
    fn test_on_invite_emits_invite_received_once() {
        let (mut bob, _bus) = coordinator("bob");

        let first = bob.on_invite(invite_from("alice", "invite_1_a"));
        let again = bob.on_invite(invite_from("alice", "invite_1_a"));

        assert!(matches!(first, Some(Event::InviteReceived { .. })));
        assert!(again.is_none(), "redelivery must not duplicate the invite");
        assert_eq!(bob.pending_invites().len(), 1);
    }

    #[test]
    fn test_on_invite_accepted_recomputes_topic_and_subscribes() {
        let (mut alice, bus) = coordinator("alice");
        let request_id = alice.send_invite(&uid("bob")).unwrap();

        let event = alice.on_invite_accepted(InviteAccept {
            from: uid("bob"),
            to: uid("alice"),
            chat_topic: "chat/something_else".into(),
            request_id: request_id.clone(),
            timestamp: ts(),
        });

        match event {
            Some(Event::InviteAccepted { accepted_by, chat_topic, .. }) => {
                assert_eq!(accepted_by, uid("bob"));
                assert_eq!(chat_topic, "chat/alice_bob");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(bus.subscriptions(), vec!["chat/alice_bob".to_string()]);
        assert_eq!(
            alice.outgoing_invite(&request_id).unwrap().state,
            InviteState::Accepted
        );
    }

    #[test]
    fn test_on_invite_accepted_unsolicited_still_joins_chat() {
        let (mut alice, bus) = coordinator("alice");

        let event = alice.on_invite_accepted(InviteAccept {
            from: uid("bob"),
            to: uid("alice"),
            chat_topic: "chat/alice_bob".into(),
            request_id: RequestId::new("invite_unknown"),
            timestamp: ts(),
        });

        assert!(matches!(event, Some(Event::InviteAccepted { .. })));
        assert_eq!(bus.subscriptions(), vec!["chat/alice_bob".to_string()]);
    }

    #[test]
    fn test_on_invite_accepted_subscription_failure_becomes_error_event() {
        let (mut alice, bus) = coordinator("alice");
        let request_id = alice.send_invite(&uid("bob")).unwrap();
        bus.fail_next("offline");

        let event = alice.on_invite_accepted(InviteAccept {
            from: uid("bob"),
            to: uid("alice"),
            chat_topic: "chat/alice_bob".into(),
            request_id,
            timestamp: ts(),
        });

        assert_eq!(event.and_then(|e| e.error_kind()), Some(ErrorKind::Transport));
    }

    #[test]
    fn test_on_invite_rejected_marks_rejected_and_subscribes_nothing() {
        let (mut alice, bus) = coordinator("alice");
        let request_id = alice.send_invite(&uid("bob")).unwrap();

        let event = alice.on_invite_rejected(InviteReject {
            from: uid("bob"),
            to: uid("alice"),
            request_id: request_id.clone(),
            timestamp: ts(),
        });

        match event {
            Some(Event::InviteRejected { rejected_by, .. }) => {
                assert_eq!(rejected_by, uid("bob"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(bus.subscriptions().is_empty());
        assert!(alice.active_chats().is_empty());
    }

    #[test]
    fn test_on_invite_rejected_unknown_id_ignored() {
        let (mut alice, _bus) = coordinator("alice");

        let event = alice.on_invite_rejected(InviteReject {
            from: uid("bob"),
            to: uid("alice"),
            request_id: RequestId::new("invite_unknown"),
            timestamp: ts(),
        });

        assert!(event.is_none());
    }

    // =====================================================================
    // Chats
    // =====================================================================

    #[test]
    fn test_send_message_requires_active_chat() {
        let (mut alice, bus) = coordinator("alice");

        let result = alice.send_message("chat/alice_bob", "hi");

        assert!(matches!(result, Err(SessionError::NotInChat(_))));
        assert!(bus.published().is_empty());
    }

    #[test]
    fn test_send_message_publishes_on_chat_topic() {
        let (mut alice, bus) = coordinator("alice");
        let topic = alice.open_chat(&uid("bob")).unwrap();

        alice.send_message(&topic, "hello").unwrap();

        let sent = bus.published_to("chat/alice_bob");
        match decode(&sent[0]) {
            WireMessage::Chat(msg) => {
                assert_eq!(msg.content, "hello");
                assert_eq!(msg.from, uid("alice"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_open_chat_twice_subscribes_once() {
        let (mut alice, bus) = coordinator("alice");

        alice.open_chat(&uid("bob")).unwrap();
        alice.open_chat(&uid("bob")).unwrap();

        assert_eq!(bus.subscriptions().len(), 1);
    }

    #[test]
    fn test_leave_chat_unsubscribes_and_forgets_peer() {
        let (mut alice, bus) = coordinator("alice");
        let topic = alice.open_chat(&uid("bob")).unwrap();

        let peer = alice.leave_chat(&topic).unwrap();

        assert_eq!(peer, uid("bob"));
        assert!(!alice.is_in_chat(&topic));
        assert_eq!(bus.unsubscriptions(), vec![topic.clone()]);
        assert!(matches!(
            alice.send_message(&topic, "still there?"),
            Err(SessionError::NotInChat(_))
        ));

        // Re-opening subscribes again.
        alice.open_chat(&uid("bob")).unwrap();
        assert_eq!(bus.subscriptions().len(), 2);
    }

    #[test]
    fn test_leave_chat_unknown_topic_returns_not_in_chat() {
        let (mut alice, bus) = coordinator("alice");

        let result = alice.leave_chat("chat/alice_bob");

        assert!(matches!(result, Err(SessionError::NotInChat(_))));
        assert!(bus.ops().is_empty());
    }

    #[test]
    fn test_leave_chat_bus_failure_keeps_chat() {
        let (mut alice, bus) = coordinator("alice");
        let topic = alice.open_chat(&uid("bob")).unwrap();
        bus.fail_next("offline");

        let result = alice.leave_chat(&topic);

        assert!(matches!(result, Err(SessionError::Bus(_))));
        assert!(alice.is_in_chat(&topic));
    }

    #[test]
    fn test_leave_all_chats_empties_active_chats() {
        let (mut alice, bus) = coordinator("alice");
        alice.open_chat(&uid("bob")).unwrap();
        alice.open_chat(&uid("carol")).unwrap();

        let left = alice.leave_all_chats().unwrap();

        assert_eq!(left, vec!["chat/alice_bob".to_string(), "chat/alice_carol".to_string()]);
        assert!(alice.active_chats().is_empty());
        assert_eq!(bus.unsubscriptions().len(), 2);
    }

    #[test]
    fn test_on_chat_message_uses_delivery_topic() {
        let (mut alice, _bus) = coordinator("alice");
        alice.open_chat(&uid("bob")).unwrap();

        let event = alice.on_chat_message(
            "chat/alice_bob",
            ChatMessage {
                from: uid("bob"),
                content: "yo".into(),
                message_id: MessageId::new("msg_1"),
                chat_topic: "chat/wrong".into(),
                timestamp: ts(),
            },
        );

        match event {
            Some(Event::MessageReceived { chat_topic, content, .. }) => {
                assert_eq!(chat_topic, "chat/alice_bob");
                assert_eq!(content, "yo");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    // =====================================================================
    // Saved conversations
    // =====================================================================

    #[test]
    fn test_save_conversations_is_retained_on_own_topic() {
        let (mut alice, bus) = coordinator("alice");
        alice.open_chat(&uid("bob")).unwrap();

        alice.save_conversations(alice.conversation_entries()).unwrap();

        let (topic, payload, options) = bus.published().pop().unwrap();
        assert_eq!(topic, "conversations/alice");
        assert!(options.retain);
        match decode(&payload) {
            WireMessage::Conversations(list) => {
                assert_eq!(list.conversations.len(), 1);
                assert_eq!(list.conversations[0].user_id, "bob");
                assert!(list.conversations[0].chat_individual);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_clear_conversations_publishes_empty_retained() {
        let (alice, bus) = coordinator("alice");

        alice.clear_conversations().unwrap();

        let (topic, payload, options) = bus.published().pop().unwrap();
        assert_eq!(topic, "conversations/alice");
        assert!(payload.is_empty());
        assert!(options.retain);
    }

    #[test]
    fn test_load_conversations_subscribes_own_topic_once() {
        let (mut alice, bus) = coordinator("alice");

        alice.load_conversations().unwrap();
        alice.load_conversations().unwrap();

        assert_eq!(bus.subscriptions(), vec!["conversations/alice".to_string()]);
    }
}
