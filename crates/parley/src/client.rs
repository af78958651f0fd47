//! `ParleyClient` builder and handle.
//!
//! This is the entry point for an application: connect a bus, get back a
//! cloneable handle, issue commands and poll events through it.

use std::sync::Arc;

use parley_bus::{MessageBus, Qos};
use parley_events::{Event, EventQueue};
use parley_group::GroupCoordinator;
use parley_protocol::topics::control_topic;
use parley_protocol::{
    Codec, GroupId, GroupInfo, JsonCodec, MessageId, RequestId, UserId,
};
use parley_session::SessionCoordinator;
use tokio::sync::{mpsc, oneshot};

use crate::actor::{ClientActor, ClientSnapshot, Command};
use crate::dispatcher::Dispatcher;
use crate::presence::PresenceTracker;
use crate::{ClientConfig, ParleyError};

/// Builder for configuring and connecting a [`ParleyClient`].
///
/// # Example
///
/// ```rust,no_run
/// use parley::prelude::*;
///
/// # async fn demo() -> Result<(), ParleyError> {
/// let broker = LocalBus::new();
/// let alice = ParleyClient::builder()
///     .qos(Qos::ExactlyOnce)
///     .list_groups_on_start(false)
///     .connect(broker.connect("alice")?)
///     .await?;
/// alice.send_invite(&UserId::parse("bob")?).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParleyClientBuilder {
    config: ClientConfig,
}

impl ParleyClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the QoS used for every publish and subscription.
    pub fn qos(mut self, qos: Qos) -> Self {
        self.config.qos = qos;
        self
    }

    /// Sets the capacity of the command channel.
    pub fn command_channel_size(mut self, size: usize) -> Self {
        self.config.command_channel_size = size;
        self
    }

    /// Sets the pending-event count that triggers a warning.
    pub fn queue_warn_threshold(mut self, threshold: usize) -> Self {
        self.config.queue_warn_threshold = threshold;
        self
    }

    pub fn announce_presence(mut self, enabled: bool) -> Self {
        self.config.announce_presence = enabled;
        self
    }

    pub fn list_groups_on_start(mut self, enabled: bool) -> Self {
        self.config.list_groups_on_start = enabled;
        self
    }

    pub fn load_conversations(mut self, enabled: bool) -> Self {
        self.config.load_conversations = enabled;
        self
    }

    pub fn offline_on_shutdown(mut self, enabled: bool) -> Self {
        self.config.offline_on_shutdown = enabled;
        self
    }

    /// Connects over `bus` with the JSON wire format.
    pub async fn connect<B: MessageBus>(
        self,
        bus: B,
    ) -> Result<ParleyClient, ParleyError> {
        self.connect_with_codec(bus, JsonCodec).await
    }

    /// Connects over `bus` with a custom codec.
    ///
    /// The bus's client id becomes our identity. Before returning, this
    /// registers the delivery handler, subscribes our control topic and
    /// runs the startup steps the configuration enables. Any of those
    /// failing aborts the connect.
    pub async fn connect_with_codec<B, C>(
        self,
        bus: B,
        codec: C,
    ) -> Result<ParleyClient, ParleyError>
    where
        B: MessageBus,
        C: Codec + Clone,
    {
        let config = self.config;
        let me = UserId::parse(bus.client_id())?;

        let (delivery_tx, deliveries) = mpsc::unbounded_channel();
        bus.set_global_handler(delivery_tx);
        let bus = Arc::new(bus);

        bus.subscribe(&control_topic(&me), config.qos)?;

        let mut session = SessionCoordinator::new(
            me.clone(),
            Arc::clone(&bus),
            codec.clone(),
            config.qos,
        );
        let mut groups = GroupCoordinator::new(
            me.clone(),
            Arc::clone(&bus),
            codec.clone(),
            config.qos,
        );
        let mut presence = PresenceTracker::new(
            me.clone(),
            Arc::clone(&bus),
            codec.clone(),
            config.qos,
        );

        if config.load_conversations {
            session.load_conversations()?;
        }
        if config.list_groups_on_start {
            groups.start_listing_groups()?;
        }
        if config.announce_presence {
            presence.go_online()?;
        }

        let (sender, commands) = mpsc::channel(config.command_channel_size.max(1));
        let actor = ClientActor {
            me: me.clone(),
            dispatcher: Dispatcher::new(me.clone(), codec),
            session,
            groups,
            presence,
            events: EventQueue::with_warn_threshold(config.queue_warn_threshold),
            commands,
            deliveries,
            config,
        };

        tokio::spawn(actor.run());
        tracing::info!(user_id = %me, "client connected");

        Ok(ParleyClient { me, sender })
    }
}

/// Handle to a running client.
///
/// Cheap to clone; every clone talks to the same client task. The task
/// stops on [`shutdown()`](Self::shutdown) or when the last handle is
/// dropped. After that every method returns [`ParleyError::Closed`].
#[derive(Debug, Clone)]
pub struct ParleyClient {
    me: UserId,
    sender: mpsc::Sender<Command>,
}

impl ParleyClient {
    /// Creates a new builder.
    pub fn builder() -> ParleyClientBuilder {
        ParleyClientBuilder::new()
    }

    /// Connects with the default configuration.
    pub async fn connect<B: MessageBus>(bus: B) -> Result<Self, ParleyError> {
        Self::builder().connect(bus).await
    }

    /// Our identity on the bus.
    pub fn user_id(&self) -> &UserId {
        &self.me
    }

    /// Returns `true` once the client task has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ParleyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| ParleyError::Closed)?;
        reply_rx.await.map_err(|_| ParleyError::Closed)
    }

    // -----------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------

    /// Invites `to` to a one-to-one chat. Returns the invite's request id.
    pub async fn send_invite(&self, to: &UserId) -> Result<RequestId, ParleyError> {
        let to = to.clone();
        self.request(|reply| Command::SendInvite { to, reply }).await?
    }

    /// Accepts a pending invite. Returns the chat topic, already
    /// subscribed.
    pub async fn accept_invite(
        &self,
        request_id: &RequestId,
    ) -> Result<String, ParleyError> {
        let request_id = request_id.clone();
        self.request(|reply| Command::AcceptInvite { request_id, reply })
            .await?
    }

    pub async fn reject_invite(&self, request_id: &RequestId) -> Result<(), ParleyError> {
        let request_id = request_id.clone();
        self.request(|reply| Command::RejectInvite { request_id, reply })
            .await?
    }

    /// Resumes a chat with `peer` without a handshake, e.g. one restored
    /// from the saved conversation list.
    pub async fn open_chat(&self, peer: &UserId) -> Result<String, ParleyError> {
        let peer = peer.clone();
        self.request(|reply| Command::OpenChat { peer, reply }).await?
    }

    pub async fn send_message(
        &self,
        chat_topic: &str,
        content: impl Into<String>,
    ) -> Result<MessageId, ParleyError> {
        let chat_topic = chat_topic.to_string();
        let content = content.into();
        self.request(|reply| Command::SendMessage {
            chat_topic,
            content,
            reply,
        })
        .await?
    }

    /// Unsubscribes from a one-to-one chat. The peer is not told. Returns
    /// the peer.
    pub async fn leave_chat(&self, chat_topic: &str) -> Result<UserId, ParleyError> {
        let chat_topic = chat_topic.to_string();
        self.request(|reply| Command::LeaveChat { chat_topic, reply })
            .await?
    }

    /// Leaves every one-to-one chat. Returns the topics left.
    pub async fn leave_all_chats(&self) -> Result<Vec<String>, ParleyError> {
        self.request(|reply| Command::LeaveAllChats { reply })
            .await?
    }

    /// Saves every active chat and group as our retained conversation list.
    pub async fn save_conversations(&self) -> Result<(), ParleyError> {
        self.request(|reply| Command::SaveConversations { reply })
            .await?
    }

    pub async fn clear_conversations(&self) -> Result<(), ParleyError> {
        self.request(|reply| Command::ClearConversations { reply })
            .await?
    }

    // -----------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------

    /// Creates and advertises a group we administer.
    pub async fn create_group(&self, name: &str) -> Result<GroupInfo, ParleyError> {
        let name = name.to_string();
        self.request(|reply| Command::CreateGroup { name, reply }).await?
    }

    pub async fn start_listing_groups(&self) -> Result<(), ParleyError> {
        self.request(|reply| Command::StartListingGroups { reply })
            .await?
    }

    pub async fn stop_listing_groups(&self) -> Result<(), ParleyError> {
        self.request(|reply| Command::StopListingGroups { reply })
            .await?
    }

    /// Asks `group`'s admin for membership.
    pub async fn request_join_group(
        &self,
        group: &GroupInfo,
    ) -> Result<RequestId, ParleyError> {
        let group = group.clone();
        self.request(|reply| Command::RequestJoinGroup { group, reply })
            .await?
    }

    /// Like [`request_join_group()`](Self::request_join_group), looking the
    /// group up in the discovered directory.
    pub async fn request_join_discovered(
        &self,
        group_id: &GroupId,
    ) -> Result<RequestId, ParleyError> {
        let group_id = group_id.clone();
        self.request(|reply| Command::RequestJoinDiscovered { group_id, reply })
            .await?
    }

    /// Admits `requester` to a group we administer. Returns the updated
    /// group record.
    pub async fn approve_join_request(
        &self,
        group_id: &GroupId,
        requester: &UserId,
    ) -> Result<GroupInfo, ParleyError> {
        let group_id = group_id.clone();
        let requester = requester.clone();
        self.request(|reply| Command::ApproveJoinRequest {
            group_id,
            requester,
            reply,
        })
        .await?
    }

    pub async fn reject_join_request(
        &self,
        group_id: &GroupId,
        requester: &UserId,
    ) -> Result<(), ParleyError> {
        let group_id = group_id.clone();
        let requester = requester.clone();
        self.request(|reply| Command::RejectJoinRequest {
            group_id,
            requester,
            reply,
        })
        .await?
    }

    pub async fn send_group_message(
        &self,
        group_topic: &str,
        group_id: &GroupId,
        content: impl Into<String>,
    ) -> Result<MessageId, ParleyError> {
        let group_topic = group_topic.to_string();
        let group_id = group_id.clone();
        let content = content.into();
        self.request(|reply| Command::SendGroupMessage {
            group_topic,
            group_id,
            content,
            reply,
        })
        .await?
    }

    pub async fn leave_group(&self, group_id: &GroupId) -> Result<(), ParleyError> {
        let group_id = group_id.clone();
        self.request(|reply| Command::LeaveGroup { group_id, reply })
            .await?
    }

    /// Tears down the given groups we administer. Returns the ids actually
    /// removed.
    pub async fn clean_list_groups(
        &self,
        group_ids: &[GroupId],
    ) -> Result<Vec<GroupId>, ParleyError> {
        let group_ids = Some(group_ids.to_vec());
        self.request(|reply| Command::CleanListGroups { group_ids, reply })
            .await?
    }

    /// Tears down every group we administer.
    pub async fn clean_all_groups(&self) -> Result<Vec<GroupId>, ParleyError> {
        self.request(|reply| Command::CleanListGroups {
            group_ids: None,
            reply,
        })
        .await?
    }

    // -----------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------

    pub async fn go_online(&self) -> Result<(), ParleyError> {
        self.request(|reply| Command::GoOnline { reply }).await?
    }

    pub async fn go_offline(&self) -> Result<(), ParleyError> {
        self.request(|reply| Command::GoOffline { reply }).await?
    }

    /// Asks the bus to replay every peer's retained presence record.
    pub async fn refresh_presence(&self) -> Result<(), ParleyError> {
        self.request(|reply| Command::RefreshPresence { reply })
            .await?
    }

    // -----------------------------------------------------------------
    // Events and state
    // -----------------------------------------------------------------

    /// Removes and returns the oldest pending event.
    pub async fn poll_event(&self) -> Result<Option<Event>, ParleyError> {
        self.request(|reply| Command::PollOne { reply }).await
    }

    /// Removes and returns every pending event, oldest first.
    pub async fn poll_events(&self) -> Result<Vec<Event>, ParleyError> {
        self.request(|reply| Command::PollAll { reply }).await
    }

    pub async fn event_count(&self) -> Result<usize, ParleyError> {
        self.request(|reply| Command::EventCount { reply }).await
    }

    pub async fn has_events(&self) -> Result<bool, ParleyError> {
        Ok(self.event_count().await? > 0)
    }

    /// Copies out the current coordinator state.
    pub async fn snapshot(&self) -> Result<ClientSnapshot, ParleyError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stops the client task, publishing "offline" first if configured.
    ///
    /// Unpolled events are dropped. Calling this on a closed client is a
    /// no-op.
    pub async fn shutdown(&self) {
        if self
            .request(|reply| Command::Shutdown { reply })
            .await
            .is_err()
        {
            tracing::debug!(user_id = %self.me, "client already closed");
        }
    }
}
