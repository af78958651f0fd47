//! The group coordinator.
//!
//! One instance holds both roles a peer can play: **admin** of the groups
//! it created (authoritative roster, pending join requests) and
//! **member/requester** of groups other peers run (outgoing requests,
//! joined groups, discovered directory).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parley_bus::{MessageBus, PublishOptions, Qos, SubscriptionSet};
use parley_events::{ErrorKind, Event, EventQueue};
use parley_protocol::topics::{
    GROUP_DISCOVERY_WILDCARD, control_topic, group_chat_topic,
    group_discovery_topic,
};
use parley_protocol::{
    Codec, ConversationEntry, GroupId, GroupInfo, GroupJoinApproved,
    GroupJoinRejected, GroupJoinRequest, GroupMessage, GroupRemoved,
    JsonCodec, MessageId, RequestId, UserId, WireMessage, now,
};

use crate::{GroupError, JoinRequest, JoinState, JoinedGroup, OutgoingJoin};

/// Runs the group lifecycle protocol for one peer.
///
/// Not thread-safe on its own; owned by the client actor like the other
/// coordinators.
pub struct GroupCoordinator<B: MessageBus, C: Codec = JsonCodec> {
    me: UserId,
    bus: Arc<B>,
    codec: C,
    qos: Qos,

    // -- Admin role --
    /// Groups we created. This is the authoritative roster; every
    /// advertisement we publish is rendered from it.
    owned: BTreeMap<GroupId, GroupInfo>,

    /// Join requests waiting for our decision, one per (group, requester).
    join_requests: BTreeMap<(GroupId, UserId), JoinRequest>,

    // -- Member role --
    /// Join requests we sent, keyed by request id.
    outgoing: HashMap<RequestId, OutgoingJoin>,

    /// Groups someone else admitted us to.
    joined: BTreeMap<GroupId, JoinedGroup>,

    /// Latest advertisement seen for each group while listing.
    discovered: BTreeMap<GroupId, GroupInfo>,

    listing: bool,
    subscriptions: SubscriptionSet,
}

impl<B: MessageBus, C: Codec> GroupCoordinator<B, C> {
    pub fn new(me: UserId, bus: Arc<B>, codec: C, qos: Qos) -> Self {
        Self {
            me,
            bus,
            codec,
            qos,
            owned: BTreeMap::new(),
            join_requests: BTreeMap::new(),
            outgoing: HashMap::new(),
            joined: BTreeMap::new(),
            discovered: BTreeMap::new(),
            listing: false,
            subscriptions: SubscriptionSet::new(),
        }
    }

    // =====================================================================
    // Admin commands
    // =====================================================================

    /// Creates a group administered by us.
    ///
    /// Subscribes to the group chat topic, publishes the retained
    /// advertisement (`member_count == 1`, no members) and pushes
    /// [`Event::GroupCreated`] onto `events`. The group only becomes
    /// discoverable once we are listening on its chat; if the
    /// advertisement fails the subscription is dropped again.
    pub fn create_group(
        &mut self,
        name: &str,
        events: &mut EventQueue,
    ) -> Result<GroupInfo, GroupError> {
        let group_id = GroupId::mint(name);
        let info = GroupInfo {
            group_id: group_id.clone(),
            group_name: name.to_string(),
            admin_id: self.me.clone(),
            control_admin_topic: control_topic(&self.me),
            members: Vec::new(),
            member_count: 1,
            created_at: now(),
        };

        let group_topic = group_chat_topic(&group_id);
        self.subscriptions
            .subscribe(self.bus.as_ref(), &group_topic, self.qos)?;

        if let Err(e) = self.advertise(&info) {
            if let Err(undo) = self
                .subscriptions
                .unsubscribe(self.bus.as_ref(), &group_topic)
            {
                tracing::warn!(%group_id, error = %undo, "could not unsubscribe after failed advertisement");
            }
            return Err(e);
        }
        self.owned.insert(group_id.clone(), info.clone());

        tracing::info!(%group_id, name, "group created");
        events.push(Event::GroupCreated {
            group: info.clone(),
            group_topic,
        });
        Ok(info)
    }

    /// Admits `requester` to one of our groups.
    ///
    /// Sends the approval to the requester's control topic, then
    /// republishes the advertisement with the requester added. Returns the
    /// updated group.
    ///
    /// # Errors
    /// - [`GroupError::Unauthorized`] — we do not administer `group_id`
    /// - [`GroupError::JoinRequestNotFound`] — no pending request from them
    pub fn approve_join_request(
        &mut self,
        group_id: &GroupId,
        requester: &UserId,
    ) -> Result<GroupInfo, GroupError> {
        let request = self.pending_request(group_id, requester)?.clone();
        let group = self.owned_group(group_id)?;

        let approval = WireMessage::JoinApproved(GroupJoinApproved {
            group_id: group_id.clone(),
            group_name: group.group_name.clone(),
            group_topic: group_chat_topic(group_id),
            user_request_id: requester.clone(),
            request_id: request.request_id.clone(),
            approved_by: self.me.clone(),
            admin_id: self.me.clone(),
            control_admin_topic: control_topic(&self.me),
            timestamp: now(),
        });
        self.publish(&control_topic(requester), &approval, false)?;
        self.join_requests
            .remove(&(group_id.clone(), requester.clone()));

        let updated = {
            let group = self
                .owned
                .get_mut(group_id)
                .ok_or_else(|| GroupError::Unauthorized(group_id.clone()))?;
            if !group.members.contains(requester) {
                group.members.push(requester.clone());
            }
            group.member_count = roster_size(group);
            group.clone()
        };
        // Second, independent publish. If it fails the requester is
        // already approved and the advertisement is stale.
        self.advertise(&updated)?;

        tracing::info!(
            %group_id,
            %requester,
            member_count = updated.member_count,
            "join request approved"
        );
        Ok(updated)
    }

    /// Turns down a pending join request. The group is left untouched.
    ///
    /// # Errors
    /// Same as [`approve_join_request`](Self::approve_join_request).
    pub fn reject_join_request(
        &mut self,
        group_id: &GroupId,
        requester: &UserId,
    ) -> Result<(), GroupError> {
        let request = self.pending_request(group_id, requester)?.clone();
        let group = self.owned_group(group_id)?;

        let rejection = WireMessage::JoinRejected(GroupJoinRejected {
            group_id: group_id.clone(),
            group_name: group.group_name.clone(),
            user_request_id: requester.clone(),
            request_id: request.request_id,
            rejected_by: self.me.clone(),
            admin_id: self.me.clone(),
            control_admin_topic: control_topic(&self.me),
            timestamp: now(),
        });
        self.publish(&control_topic(requester), &rejection, false)?;
        self.join_requests
            .remove(&(group_id.clone(), requester.clone()));

        tracing::info!(%group_id, %requester, "join request rejected");
        Ok(())
    }

    /// Tears down the listed groups we administer.
    ///
    /// For each one: replaces the retained advertisement with a
    /// `group_removed` marker, unsubscribes from its chat topic and forgets
    /// it along with its pending join requests. Ids we do not administer
    /// are skipped. Returns the ids actually removed.
    pub fn clean_list_groups(
        &mut self,
        group_ids: &[GroupId],
    ) -> Result<Vec<GroupId>, GroupError> {
        let mut removed = Vec::new();

        for group_id in group_ids {
            let Some(group) = self.owned.get(group_id) else {
                tracing::warn!(%group_id, "not administered here, skipping removal");
                continue;
            };

            let marker = WireMessage::GroupRemoved(GroupRemoved {
                group_id: group_id.clone(),
                group_name: group.group_name.clone(),
            });
            self.publish(&group_discovery_topic(group_id), &marker, true)?;
            self.subscriptions
                .unsubscribe(self.bus.as_ref(), &group_chat_topic(group_id))?;

            self.owned.remove(group_id);
            self.join_requests.retain(|(g, _), _| g != group_id);
            tracing::info!(%group_id, "group removed");
            removed.push(group_id.clone());
        }

        Ok(removed)
    }

    // =====================================================================
    // Discovery and membership commands
    // =====================================================================

    /// Subscribes to the whole discovery namespace. The bus replays every
    /// retained advertisement, each surfacing as [`Event::GroupDiscovered`].
    pub fn start_listing_groups(&mut self) -> Result<(), GroupError> {
        self.subscriptions.subscribe(
            self.bus.as_ref(),
            GROUP_DISCOVERY_WILDCARD,
            self.qos,
        )?;
        self.listing = true;
        Ok(())
    }

    /// Stops listening for advertisements and clears the directory cache.
    pub fn stop_listing_groups(&mut self) -> Result<(), GroupError> {
        self.subscriptions
            .unsubscribe(self.bus.as_ref(), GROUP_DISCOVERY_WILDCARD)?;
        self.listing = false;
        self.discovered.clear();
        Ok(())
    }

    /// Asks the admin of `group` to let us in.
    ///
    /// The request goes to the admin's control topic. We do not subscribe
    /// to the group chat until the approval arrives.
    ///
    /// # Errors
    /// [`GroupError::AlreadyMember`] if we administer or already belong to
    /// the group.
    pub fn request_join_group(
        &mut self,
        group: &GroupInfo,
    ) -> Result<RequestId, GroupError> {
        if group.admin_id == self.me
            || self.owned.contains_key(&group.group_id)
            || self.joined.contains_key(&group.group_id)
        {
            return Err(GroupError::AlreadyMember(group.group_id.clone()));
        }

        let request_id = RequestId::mint_join();
        let request = WireMessage::JoinRequest(GroupJoinRequest {
            group_id: group.group_id.clone(),
            user_request_id: self.me.clone(),
            request_id: request_id.clone(),
            admin_id: group.admin_id.clone(),
            control_admin_topic: control_topic(&group.admin_id),
            group_name: group.group_name.clone(),
            member_count: group.member_count,
            members: group.members.clone(),
            created_at: group.created_at,
        });
        self.publish(&control_topic(&group.admin_id), &request, false)?;

        self.outgoing.insert(
            request_id.clone(),
            OutgoingJoin {
                request_id: request_id.clone(),
                group: group.clone(),
                state: JoinState::Pending,
            },
        );
        tracing::info!(
            group_id = %group.group_id,
            admin = %group.admin_id,
            %request_id,
            "join requested"
        );
        Ok(request_id)
    }

    /// Same as [`request_join_group`](Self::request_join_group), looking
    /// the group up in the discovered directory.
    ///
    /// # Errors
    /// [`GroupError::GroupNotFound`] if the group was never discovered.
    pub fn request_join_discovered(
        &mut self,
        group_id: &GroupId,
    ) -> Result<RequestId, GroupError> {
        let group = self
            .discovered
            .get(group_id)
            .cloned()
            .ok_or_else(|| GroupError::GroupNotFound(group_id.clone()))?;
        self.request_join_group(&group)
    }

    /// Publishes a message in a group we belong to or administer.
    ///
    /// # Errors
    /// - [`GroupError::NotMember`] — not in the group
    /// - [`GroupError::TopicMismatch`] — `group_topic` is not the group's
    ///   chat topic
    pub fn send_group_message(
        &mut self,
        group_topic: &str,
        group_id: &GroupId,
        content: impl Into<String>,
    ) -> Result<MessageId, GroupError> {
        if !self.is_member(group_id) {
            return Err(GroupError::NotMember(group_id.clone()));
        }
        let expected = group_chat_topic(group_id);
        if group_topic != expected {
            return Err(GroupError::TopicMismatch {
                expected,
                actual: group_topic.to_string(),
            });
        }

        let message_id = MessageId::mint_group();
        let message = WireMessage::GroupMessage(GroupMessage {
            group_id: group_id.clone(),
            from: self.me.clone(),
            content: content.into(),
            message_id: message_id.clone(),
            group_topic: expected,
            timestamp: now(),
        });
        self.publish(group_topic, &message, false)?;

        tracing::debug!(%group_id, %message_id, "group message sent");
        Ok(message_id)
    }

    /// Stops following a group we joined.
    ///
    /// Local only: the admin is not told and the advertised roster keeps
    /// listing us.
    ///
    /// # Errors
    /// - [`GroupError::OwnedGroup`] — we administer it
    /// - [`GroupError::NotMember`] — we never joined it
    pub fn leave_group(&mut self, group_id: &GroupId) -> Result<(), GroupError> {
        if self.owned.contains_key(group_id) {
            return Err(GroupError::OwnedGroup(group_id.clone()));
        }
        let Some(group) = self.joined.remove(group_id) else {
            return Err(GroupError::NotMember(group_id.clone()));
        };
        self.subscriptions
            .unsubscribe(self.bus.as_ref(), &group.group_topic)?;

        tracing::info!(%group_id, "left group");
        Ok(())
    }

    // =====================================================================
    // Inbound handlers
    // =====================================================================

    /// (Admin) someone asked to join one of our groups.
    ///
    /// The event carries the roster from our own record, not whatever the
    /// requester copied from the advertisement.
    pub fn on_join_request(&mut self, request: GroupJoinRequest) -> Option<Event> {
        let Some(group) = self.owned.get(&request.group_id) else {
            tracing::warn!(
                group_id = %request.group_id,
                requester = %request.user_request_id,
                "join request for a group not administered here"
            );
            return Some(Event::error(
                ErrorKind::Authorization,
                format!(
                    "join request from {} for group {} which is not administered by {}",
                    request.user_request_id, request.group_id, self.me
                ),
            ));
        };

        if group.members.contains(&request.user_request_id) {
            tracing::debug!(
                group_id = %request.group_id,
                requester = %request.user_request_id,
                "join request from existing member, ignoring"
            );
            return None;
        }

        let event = Event::GroupJoinRequest {
            group_id: request.group_id.clone(),
            group_name: group.group_name.clone(),
            admin_id: group.admin_id.clone(),
            control_admin_topic: group.control_admin_topic.clone(),
            user_request_id: request.user_request_id.clone(),
            request_id: request.request_id.clone(),
            member_count: group.member_count,
            members: group.members.clone(),
            created_at: group.created_at,
        };

        tracing::info!(
            group_id = %request.group_id,
            requester = %request.user_request_id,
            "join request received"
        );
        // A newer request from the same user replaces the older one.
        self.join_requests.insert(
            (request.group_id.clone(), request.user_request_id.clone()),
            JoinRequest {
                request_id: request.request_id,
                group_id: request.group_id,
                requester: request.user_request_id,
                received_at: now(),
            },
        );
        Some(event)
    }

    /// (Requester) the admin let us in: subscribe to the group chat.
    pub fn on_join_approved(&mut self, approved: GroupJoinApproved) -> Option<Event> {
        if approved.user_request_id != self.me {
            tracing::warn!(
                user = %approved.user_request_id,
                "join approval addressed to someone else, ignoring"
            );
            return None;
        }
        if !self.settle_outgoing(&approved.request_id, &approved.group_id, JoinState::Approved) {
            return None;
        }

        let group_topic = group_chat_topic(&approved.group_id);
        if let Err(e) = self
            .subscriptions
            .subscribe(self.bus.as_ref(), &group_topic, self.qos)
        {
            let e = GroupError::from(e);
            return Some(Event::error(e.kind(), e.to_string()));
        }
        self.joined.insert(
            approved.group_id.clone(),
            JoinedGroup {
                group_id: approved.group_id.clone(),
                group_name: approved.group_name.clone(),
                group_topic: group_topic.clone(),
                admin_id: approved.admin_id,
            },
        );

        tracing::info!(group_id = %approved.group_id, %group_topic, "joined group");
        Some(Event::GroupJoinApproved {
            group_id: approved.group_id,
            group_name: approved.group_name,
            group_topic,
            approved_by: approved.approved_by,
            request_id: approved.request_id,
            timestamp: approved.timestamp,
        })
    }

    /// (Requester) the admin turned us down.
    pub fn on_join_rejected(&mut self, rejected: GroupJoinRejected) -> Option<Event> {
        if rejected.user_request_id != self.me {
            tracing::warn!(
                user = %rejected.user_request_id,
                "join rejection addressed to someone else, ignoring"
            );
            return None;
        }
        if !self.settle_outgoing(&rejected.request_id, &rejected.group_id, JoinState::Rejected) {
            return None;
        }

        tracing::info!(group_id = %rejected.group_id, "join request turned down");
        Some(Event::GroupJoinRejected {
            group_id: rejected.group_id,
            group_name: rejected.group_name,
            rejected_by: rejected.rejected_by,
            request_id: rejected.request_id,
            timestamp: rejected.timestamp,
        })
    }

    /// Another member wrote on `topic`.
    pub fn on_group_message(&mut self, topic: &str, message: GroupMessage) -> Option<Event> {
        if !self.is_member(&message.group_id) {
            tracing::warn!(
                topic,
                group_id = %message.group_id,
                "message for a group we are not in, ignoring"
            );
            return None;
        }
        Some(Event::GroupMessageReceived {
            group_id: message.group_id,
            from: message.from,
            content: message.content,
            message_id: message.message_id,
            group_topic: topic.to_string(),
            timestamp: message.timestamp,
        })
    }

    /// A group advertisement arrived on the discovery namespace.
    pub fn on_group_advertised(&mut self, group: GroupInfo) -> Option<Event> {
        if !self.listing {
            tracing::debug!(group_id = %group.group_id, "advertisement while not listing, ignoring");
            return None;
        }
        tracing::debug!(
            group_id = %group.group_id,
            member_count = group.member_count,
            "group discovered"
        );
        self.discovered.insert(group.group_id.clone(), group.clone());
        Some(Event::GroupDiscovered { group })
    }

    /// A group was torn down by its admin.
    ///
    /// Members drop their chat subscription too; the topic will stay silent.
    pub fn on_group_removed(&mut self, removed: GroupRemoved) -> Option<Event> {
        self.discovered.remove(&removed.group_id);

        if let Some(group) = self.joined.remove(&removed.group_id) {
            if let Err(e) = self
                .subscriptions
                .unsubscribe(self.bus.as_ref(), &group.group_topic)
            {
                tracing::warn!(group_id = %removed.group_id, error = %e, "unsubscribe after removal failed");
            }
            tracing::info!(group_id = %removed.group_id, "joined group was removed by its admin");
        }

        Some(Event::GroupRemoved {
            group_id: removed.group_id,
            group_name: removed.group_name,
        })
    }

    // =====================================================================
    // Queries
    // =====================================================================

    /// Groups we administer.
    pub fn admin_groups(&self) -> Vec<GroupInfo> {
        self.owned.values().cloned().collect()
    }

    /// The directory as last seen while listing.
    pub fn discovered_groups(&self) -> Vec<GroupInfo> {
        self.discovered.values().cloned().collect()
    }

    /// Groups someone else admitted us to.
    pub fn joined_groups(&self) -> Vec<JoinedGroup> {
        self.joined.values().cloned().collect()
    }

    /// (Admin) join requests waiting for a decision.
    pub fn pending_join_requests(&self) -> Vec<JoinRequest> {
        self.join_requests.values().cloned().collect()
    }

    /// Looks up one of our own join requests.
    pub fn outgoing_join(&self, request_id: &RequestId) -> Option<&OutgoingJoin> {
        self.outgoing.get(request_id)
    }

    pub fn is_listing(&self) -> bool {
        self.listing
    }

    /// Returns `true` if we administer or have joined `group_id`.
    pub fn is_member(&self, group_id: &GroupId) -> bool {
        self.owned.contains_key(group_id) || self.joined.contains_key(group_id)
    }

    /// Every group we are in, as conversation-list entries.
    pub fn conversation_entries(&self) -> Vec<ConversationEntry> {
        let timestamp = now();
        self.owned
            .keys()
            .chain(self.joined.keys())
            .map(|group_id| ConversationEntry {
                user_id: group_id.to_string(),
                topic: group_chat_topic(group_id),
                chat_individual: false,
                timestamp,
            })
            .collect()
    }

    // =====================================================================
    // Helpers
    // =====================================================================

    fn owned_group(&self, group_id: &GroupId) -> Result<&GroupInfo, GroupError> {
        self.owned
            .get(group_id)
            .ok_or_else(|| GroupError::Unauthorized(group_id.clone()))
    }

    fn pending_request(
        &self,
        group_id: &GroupId,
        requester: &UserId,
    ) -> Result<&JoinRequest, GroupError> {
        self.owned_group(group_id)?;
        self.join_requests
            .get(&(group_id.clone(), requester.clone()))
            .ok_or_else(|| GroupError::JoinRequestNotFound {
                group_id: group_id.clone(),
                requester: requester.clone(),
            })
    }

    /// Moves a pending outgoing request to `state`. Returns `false` (and
    /// logs) for answers we never asked for or already received.
    fn settle_outgoing(
        &mut self,
        request_id: &RequestId,
        group_id: &GroupId,
        state: JoinState,
    ) -> bool {
        match self.outgoing.get_mut(request_id) {
            Some(join) if join.group.group_id != *group_id => {
                tracing::warn!(%request_id, %group_id, "answer names a different group than requested, ignoring");
                false
            }
            Some(join) if join.state != JoinState::Pending => {
                tracing::debug!(%request_id, state = %join.state, "duplicate join answer, ignoring");
                false
            }
            Some(join) => {
                join.state = state;
                true
            }
            None => {
                tracing::warn!(%request_id, %group_id, "answer to a join request we never sent, ignoring");
                false
            }
        }
    }

    /// Publishes the retained advertisement for one of our groups.
    fn advertise(&self, group: &GroupInfo) -> Result<(), GroupError> {
        let advertisement = WireMessage::GroupAdvertised(group.clone());
        self.publish(&group_discovery_topic(&group.group_id), &advertisement, true)
    }

    fn publish(
        &self,
        topic: &str,
        message: &WireMessage,
        retain: bool,
    ) -> Result<(), GroupError> {
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

/// The admin counts as a member but is never listed in `members`.
fn roster_size(group: &GroupInfo) -> u32 {
    u32::try_from(group.members.len()).map_or(u32::MAX, |n| n.saturating_add(1))
}

// =========================================================================
// Tests
// =========================================================================
