//! The client task: one Tokio task that owns every coordinator.
//!
//! Commands from [`ParleyClient`](crate::ParleyClient) handles and
//! deliveries from the bus both arrive here, over two channels, and are
//! handled one at a time. No coordinator state is shared between tasks,
//! so nothing needs a lock.

use parley_bus::{Delivery, MessageBus};
use parley_events::{Event, EventQueue};
use parley_group::{GroupCoordinator, JoinRequest, JoinedGroup};
use parley_protocol::{
    Codec, GroupId, GroupInfo, MessageId, PresenceRecord, RequestId, UserId,
};
use parley_session::{IncomingInvite, SessionCoordinator};
use tokio::sync::{mpsc, oneshot};

use crate::dispatcher::{Classified, Dispatcher, Inbound};
use crate::presence::PresenceTracker;
use crate::{ClientConfig, ParleyError};

type Reply<T> = oneshot::Sender<Result<T, ParleyError>>;

/// Commands sent to the client task through its channel.
///
/// Every fallible command carries a reply channel; the caller waits on it
/// for the outcome.
pub(crate) enum Command {
    // -- Session --
    SendInvite { to: UserId, reply: Reply<RequestId> },
    AcceptInvite { request_id: RequestId, reply: Reply<String> },
    RejectInvite { request_id: RequestId, reply: Reply<()> },
    OpenChat { peer: UserId, reply: Reply<String> },
    SendMessage { chat_topic: String, content: String, reply: Reply<MessageId> },
    LeaveChat { chat_topic: String, reply: Reply<UserId> },
    LeaveAllChats { reply: Reply<Vec<String>> },
    SaveConversations { reply: Reply<()> },
    ClearConversations { reply: Reply<()> },

    // -- Groups --
    CreateGroup { name: String, reply: Reply<GroupInfo> },
    StartListingGroups { reply: Reply<()> },
    StopListingGroups { reply: Reply<()> },
    RequestJoinGroup { group: GroupInfo, reply: Reply<RequestId> },
    RequestJoinDiscovered { group_id: GroupId, reply: Reply<RequestId> },
    ApproveJoinRequest { group_id: GroupId, requester: UserId, reply: Reply<GroupInfo> },
    RejectJoinRequest { group_id: GroupId, requester: UserId, reply: Reply<()> },
    SendGroupMessage {
        group_topic: String,
        group_id: GroupId,
        content: String,
        reply: Reply<MessageId>,
    },
    LeaveGroup { group_id: GroupId, reply: Reply<()> },
    /// `None` tears down every group we administer.
    CleanListGroups { group_ids: Option<Vec<GroupId>>, reply: Reply<Vec<GroupId>> },

    // -- Presence --
    GoOnline { reply: Reply<()> },
    GoOffline { reply: Reply<()> },
    RefreshPresence { reply: Reply<()> },

    // -- Event queue and state --
    PollOne { reply: oneshot::Sender<Option<Event>> },
    PollAll { reply: oneshot::Sender<Vec<Event>> },
    EventCount { reply: oneshot::Sender<usize> },
    Snapshot { reply: oneshot::Sender<ClientSnapshot> },

    Shutdown { reply: oneshot::Sender<()> },
}

/// Point-in-time copy of the client's coordinator state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSnapshot {
    /// Incoming invites still waiting for an answer.
    pub pending_invites: Vec<IncomingInvite>,
    /// Active one-to-one chats as `(topic, peer)`.
    pub active_chats: Vec<(String, UserId)>,
    /// Groups we administer, with their authoritative rosters.
    pub admin_groups: Vec<GroupInfo>,
    /// Groups other peers admitted us to.
    pub joined_groups: Vec<JoinedGroup>,
    /// The directory as last seen while listing.
    pub discovered_groups: Vec<GroupInfo>,
    /// Join requests waiting for our decision.
    pub pending_join_requests: Vec<JoinRequest>,
    /// Last known presence of every peer.
    pub peers: Vec<PresenceRecord>,
}

pub(crate) struct ClientActor<B: MessageBus, C: Codec> {
    pub(crate) me: UserId,
    pub(crate) config: ClientConfig,
    pub(crate) dispatcher: Dispatcher<C>,
    pub(crate) session: SessionCoordinator<B, C>,
    pub(crate) groups: GroupCoordinator<B, C>,
    pub(crate) presence: PresenceTracker<B, C>,
    pub(crate) events: EventQueue,
    pub(crate) commands: mpsc::Receiver<Command>,
    pub(crate) deliveries: mpsc::UnboundedReceiver<Delivery>,
}

impl<B: MessageBus, C: Codec> ClientActor<B, C> {
    /// Runs until a `Shutdown` command arrives or every handle is dropped.
    ///
    /// Deliveries already waiting are always handled before the next
    /// command, so a command observes every delivery the bus had handed
    /// over by the time the command was sent.
    pub(crate) async fn run(mut self) {
        tracing::info!(user_id = %self.me, "client started");

        loop {
            tokio::select! {
                biased;

                Some(delivery) = self.deliveries.recv() => {
                    self.handle_delivery(delivery);
                }
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.stop();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::debug!(user_id = %self.me, "all client handles dropped");
                        self.stop();
                        break;
                    }
                },
            }
        }

        tracing::info!(user_id = %self.me, "client stopped");
    }

    // -----------------------------------------------------------------
    // Deliveries
    // -----------------------------------------------------------------

    fn handle_delivery(&mut self, delivery: Delivery) {
        match self.dispatcher.classify(&delivery) {
            Classified::Inbound(inbound) => {
                if let Some(event) = self.route(inbound) {
                    self.events.push(event);
                }
            }
            Classified::Error(event) => self.events.push(event),
            Classified::Ignored => {}
        }
    }

    /// Hands a classified payload to the coordinator that owns it.
    fn route(&mut self, inbound: Inbound) -> Option<Event> {
        match inbound {
            Inbound::Invite(m) => self.session.on_invite(m),
            Inbound::InviteAccepted(m) => self.session.on_invite_accepted(m),
            Inbound::InviteRejected(m) => self.session.on_invite_rejected(m),
            Inbound::Chat { topic, message } => {
                self.session.on_chat_message(&topic, message)
            }
            Inbound::Conversations(m) => self.session.on_conversations(m),
            Inbound::JoinRequest(m) => self.groups.on_join_request(m),
            Inbound::JoinApproved(m) => self.groups.on_join_approved(m),
            Inbound::JoinRejected(m) => self.groups.on_join_rejected(m),
            Inbound::GroupMessage { topic, message } => {
                self.groups.on_group_message(&topic, message)
            }
            Inbound::GroupAdvertised(m) => self.groups.on_group_advertised(m),
            Inbound::GroupRemoved(m) => self.groups.on_group_removed(m),
            Inbound::Presence(m) => self.presence.on_presence(m),
        }
    }

    // -----------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SendInvite { to, reply } => {
                let result = self.session.send_invite(&to);
                self.respond(reply, result);
            }
            Command::AcceptInvite { request_id, reply } => {
                let result = self.session.accept_invite(&request_id);
                self.respond(reply, result);
            }
            Command::RejectInvite { request_id, reply } => {
                let result = self.session.reject_invite(&request_id);
                self.respond(reply, result);
            }
            Command::OpenChat { peer, reply } => {
                let result = self.session.open_chat(&peer);
                self.respond(reply, result);
            }
            Command::SendMessage { chat_topic, content, reply } => {
                let result = self.session.send_message(&chat_topic, content);
                self.respond(reply, result);
            }
            Command::LeaveChat { chat_topic, reply } => {
                let result = self.session.leave_chat(&chat_topic);
                self.respond(reply, result);
            }
            Command::LeaveAllChats { reply } => {
                let result = self.session.leave_all_chats();
                self.respond(reply, result);
            }
            Command::SaveConversations { reply } => {
                let mut entries = self.session.conversation_entries();
                entries.extend(self.groups.conversation_entries());
                let result = self.session.save_conversations(entries);
                self.respond(reply, result);
            }
            Command::ClearConversations { reply } => {
                let result = self.session.clear_conversations();
                self.respond(reply, result);
            }
            Command::CreateGroup { name, reply } => {
                let result = self.groups.create_group(&name, &mut self.events);
                self.respond(reply, result);
            }
            Command::StartListingGroups { reply } => {
                let result = self.groups.start_listing_groups();
                self.respond(reply, result);
            }
            Command::StopListingGroups { reply } => {
                let result = self.groups.stop_listing_groups();
                self.respond(reply, result);
            }
            Command::RequestJoinGroup { group, reply } => {
                let result = self.groups.request_join_group(&group);
                self.respond(reply, result);
            }
            Command::RequestJoinDiscovered { group_id, reply } => {
                let result = self.groups.request_join_discovered(&group_id);
                self.respond(reply, result);
            }
            Command::ApproveJoinRequest { group_id, requester, reply } => {
                let result = self.groups.approve_join_request(&group_id, &requester);
                self.respond(reply, result);
            }
            Command::RejectJoinRequest { group_id, requester, reply } => {
                let result = self.groups.reject_join_request(&group_id, &requester);
                self.respond(reply, result);
            }
            Command::SendGroupMessage { group_topic, group_id, content, reply } => {
                let result =
                    self.groups.send_group_message(&group_topic, &group_id, content);
                self.respond(reply, result);
            }
            Command::LeaveGroup { group_id, reply } => {
                let result = self.groups.leave_group(&group_id);
                self.respond(reply, result);
            }
            Command::CleanListGroups { group_ids, reply } => {
                let group_ids = group_ids.unwrap_or_else(|| {
                    self.groups
                        .admin_groups()
                        .into_iter()
                        .map(|g| g.group_id)
                        .collect()
                });
                let result = self.groups.clean_list_groups(&group_ids);
                self.respond(reply, result);
            }
            Command::GoOnline { reply } => {
                let result = self.presence.go_online();
                self.respond(reply, result);
            }
            Command::GoOffline { reply } => {
                let result = self.presence.go_offline();
                self.respond(reply, result);
            }
            Command::RefreshPresence { reply } => {
                let result = self.presence.refresh();
                self.respond(reply, result);
            }
            Command::PollOne { reply } => {
                let _ = reply.send(self.events.poll_one());
            }
            Command::PollAll { reply } => {
                let _ = reply.send(self.events.poll_all());
            }
            Command::EventCount { reply } => {
                let _ = reply.send(self.events.count());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown { reply } => {
                // Handled in `run`; kept exhaustive.
                let _ = reply.send(());
            }
        }
    }

    /// Replies to the caller. A failure is also queued as an error event,
    /// so consumers that only read events see it too.
    fn respond<T, E: Into<ParleyError>>(
        &mut self,
        reply: Reply<T>,
        result: Result<T, E>,
    ) {
        let result = result.map_err(|e| {
            let e = e.into();
            tracing::warn!(user_id = %self.me, error = %e, "command failed");
            self.events.push(Event::error(e.kind(), e.to_string()));
            e
        });
        let _ = reply.send(result);
    }

    fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            pending_invites: self.session.pending_invites(),
            active_chats: self.session.active_chats(),
            admin_groups: self.groups.admin_groups(),
            joined_groups: self.groups.joined_groups(),
            discovered_groups: self.groups.discovered_groups(),
            pending_join_requests: self.groups.pending_join_requests(),
            peers: self.presence.peers(),
        }
    }

    fn stop(&mut self) {
        if self.config.offline_on_shutdown && self.presence.status().is_some() {
            if let Err(e) = self.presence.go_offline() {
                tracing::warn!(user_id = %self.me, error = %e, "could not publish offline status");
            }
        }
        let pending = self.events.count();
        if pending > 0 {
            tracing::debug!(user_id = %self.me, pending, "dropping unpolled events");
        }
    }
}
