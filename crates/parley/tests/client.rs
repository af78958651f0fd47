//! Integration tests for the client task over an in-process bus.

use std::time::Duration;

use parley::prelude::*;
use parley::bus::PublishOptions;
use parley::protocol::topics::{canonical_chat_topic, group_chat_topic};
use parley::session::SessionError;

const TIMEOUT: Duration = Duration::from_secs(5);

// -- Helpers --

fn uid(s: &str) -> UserId {
    UserId::parse(s).unwrap()
}

/// A client that does nothing on connect beyond subscribing its control
/// topic.
async fn quiet(broker: &LocalBus, id: &str) -> ParleyClient {
    ParleyClient::builder()
        .announce_presence(false)
        .list_groups_on_start(false)
        .load_conversations(false)
        .connect(broker.connect(id).unwrap())
        .await
        .unwrap()
}

async fn drain(client: &ParleyClient) -> Vec<Event> {
    tokio::time::timeout(TIMEOUT, client.poll_events())
        .await
        .expect("poll timed out")
        .unwrap()
}

// =========================================================================
// Invite handshake
// =========================================================================

#[tokio::test]
async fn test_invite_accept_converges_on_one_chat_topic() {
    let broker = LocalBus::new();
    let alice = quiet(&broker, "alice").await;
    let bob = quiet(&broker, "bob").await;

    let request_id = alice.send_invite(&uid("bob")).await.unwrap();

    let events = drain(&bob).await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        Event::InviteReceived { from, request_id: id, .. } => {
            assert_eq!(from, &uid("alice"));
            assert_eq!(id, &request_id);
        }
        other => panic!("expected InviteReceived, got {other:?}"),
    }
    assert_eq!(bob.snapshot().await.unwrap().pending_invites.len(), 1);

    let bob_topic = bob.accept_invite(&request_id).await.unwrap();
    assert_eq!(bob_topic, canonical_chat_topic(&uid("alice"), &uid("bob")));

    let events = drain(&alice).await;
    match &events[..] {
        [Event::InviteAccepted { accepted_by, chat_topic, request_id: id, .. }] => {
            assert_eq!(accepted_by, &uid("bob"));
            assert_eq!(chat_topic, &bob_topic);
            assert_eq!(id, &request_id);
        }
        other => panic!("expected one InviteAccepted, got {other:?}"),
    }

    let alice_state = alice.snapshot().await.unwrap();
    let bob_state = bob.snapshot().await.unwrap();
    assert_eq!(alice_state.active_chats, vec![(bob_topic.clone(), uid("bob"))]);
    assert_eq!(bob_state.active_chats, vec![(bob_topic.clone(), uid("alice"))]);
    assert!(bob_state.pending_invites.is_empty());
}

#[tokio::test]
async fn test_chat_message_reaches_peer_but_not_sender() {
    let broker = LocalBus::new();
    let alice = quiet(&broker, "alice").await;
    let bob = quiet(&broker, "bob").await;

    let request_id = alice.send_invite(&uid("bob")).await.unwrap();
    drain(&bob).await;
    let topic = bob.accept_invite(&request_id).await.unwrap();
    drain(&alice).await;

    let message_id = bob.send_message(&topic, "hi alice").await.unwrap();

    let events = drain(&alice).await;
    match &events[..] {
        [Event::MessageReceived { from, content, message_id: id, chat_topic, .. }] => {
            assert_eq!(from, &uid("bob"));
            assert_eq!(content, "hi alice");
            assert_eq!(id, &message_id);
            assert_eq!(chat_topic, &topic);
        }
        other => panic!("expected one MessageReceived, got {other:?}"),
    }
    assert!(drain(&bob).await.is_empty());
}

#[tokio::test]
async fn test_leave_chat_stops_receiving_peer_messages() {
    let broker = LocalBus::new();
    let alice = quiet(&broker, "alice").await;
    let bob = quiet(&broker, "bob").await;

    let request_id = alice.send_invite(&uid("bob")).await.unwrap();
    drain(&bob).await;
    let topic = bob.accept_invite(&request_id).await.unwrap();
    drain(&alice).await;

    assert_eq!(alice.leave_chat(&topic).await.unwrap(), uid("bob"));
    assert!(alice.snapshot().await.unwrap().active_chats.is_empty());

    bob.send_message(&topic, "anyone?").await.unwrap();
    assert!(drain(&alice).await.is_empty());

    let err = alice.leave_chat(&topic).await.unwrap_err();
    assert!(matches!(err, ParleyError::Session(SessionError::NotInChat(_))));
    assert!(matches!(
        &drain(&alice).await[..],
        [Event::Error { kind: ErrorKind::InvalidState, .. }]
    ));
}

#[tokio::test]
async fn test_invite_reject_leaves_no_chat() {
    let broker = LocalBus::new();
    let alice = quiet(&broker, "alice").await;
    let bob = quiet(&broker, "bob").await;

    let request_id = alice.send_invite(&uid("bob")).await.unwrap();
    drain(&bob).await;

    bob.reject_invite(&request_id).await.unwrap();

    let events = drain(&alice).await;
    assert!(matches!(
        &events[..],
        [Event::InviteRejected { rejected_by, .. }] if *rejected_by == uid("bob")
    ));
    assert!(alice.snapshot().await.unwrap().active_chats.is_empty());
    assert!(bob.snapshot().await.unwrap().active_chats.is_empty());

    // The invite is settled; answering it again is refused.
    let err = bob.accept_invite(&request_id).await.unwrap_err();
    assert!(matches!(err, ParleyError::Session(SessionError::AlreadyResolved(..))));
}

#[tokio::test]
async fn test_accept_unknown_invite_returns_and_reports_not_found() {
    let broker = LocalBus::new();
    let bob = quiet(&broker, "bob").await;

    let err = bob
        .accept_invite(&RequestId::new("invite_missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, ParleyError::Session(SessionError::NotFound(_))));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let events = drain(&bob).await;
    assert!(matches!(
        &events[..],
        [Event::Error { kind: ErrorKind::NotFound, .. }]
    ));
}

// =========================================================================
// Event queue
// =========================================================================

#[tokio::test]
async fn test_poll_event_returns_oldest_first_then_none() {
    let broker = LocalBus::new();
    let alice = quiet(&broker, "alice").await;
    let bob = quiet(&broker, "bob").await;
    let carol = quiet(&broker, "carol").await;

    alice.send_invite(&uid("carol")).await.unwrap();
    bob.send_invite(&uid("carol")).await.unwrap();

    assert_eq!(carol.event_count().await.unwrap(), 2);
    assert!(carol.has_events().await.unwrap());

    let first = carol.poll_event().await.unwrap().unwrap();
    let second = carol.poll_event().await.unwrap().unwrap();
    assert!(matches!(first, Event::InviteReceived { from, .. } if from == uid("alice")));
    assert!(matches!(second, Event::InviteReceived { from, .. } if from == uid("bob")));
    assert!(carol.poll_event().await.unwrap().is_none());
    assert!(!carol.has_events().await.unwrap());
}

#[tokio::test]
async fn test_malformed_delivery_becomes_parse_error_event() {
    let broker = LocalBus::new();
    let alice = quiet(&broker, "alice").await;
    let mallory = broker.connect("mallory").unwrap();

    mallory
        .publish(
            "control/alice",
            b"not json".to_vec(),
            PublishOptions::with_qos(Qos::AtLeastOnce),
        )
        .unwrap();

    let events = drain(&alice).await;
    match &events[..] {
        [Event::Error { kind, topic, payload, .. }] => {
            assert_eq!(*kind, ErrorKind::Parse);
            assert_eq!(topic.as_deref(), Some("control/alice"));
            assert_eq!(payload.as_deref(), Some("not json"));
        }
        other => panic!("expected one parse error, got {other:?}"),
    }
}

// =========================================================================
// Groups
// =========================================================================

#[tokio::test]
async fn test_group_join_flow_from_discovery_to_chat() {
    let broker = LocalBus::new();
    let admin = quiet(&broker, "admin1").await;
    let bob = ParleyClient::builder()
        .announce_presence(false)
        .load_conversations(false)
        .connect(broker.connect("bob").unwrap())
        .await
        .unwrap();

    let created = admin.create_group("Friends").await.unwrap();
    let group_id = created.group_id.clone();
    assert_eq!(created.member_count, 1);
    assert!(created.members.is_empty());
    assert!(matches!(
        &drain(&admin).await[..],
        [Event::GroupCreated { group, .. }] if *group == created
    ));

    let events = drain(&bob).await;
    assert!(matches!(
        &events[..],
        [Event::GroupDiscovered { group }] if *group == created
    ));

    bob.request_join_discovered(&group_id).await.unwrap();

    match &drain(&admin).await[..] {
        [Event::GroupJoinRequest { user_request_id, member_count, members, group_name, .. }] => {
            assert_eq!(user_request_id, &uid("bob"));
            assert_eq!(*member_count, 1);
            assert!(members.is_empty());
            assert_eq!(group_name, "Friends");
        }
        other => panic!("expected one GroupJoinRequest, got {other:?}"),
    }

    let updated = admin.approve_join_request(&group_id, &uid("bob")).await.unwrap();
    assert_eq!(updated.member_count, 2);
    assert_eq!(updated.members, vec![uid("bob")]);

    // The approval is published before the refreshed advertisement.
    let events = drain(&bob).await;
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Event::GroupJoinApproved { approved_by, .. } if *approved_by == uid("admin1")));
    assert!(matches!(&events[1], Event::GroupDiscovered { group } if group.member_count == 2));

    let topic = group_chat_topic(&group_id);
    bob.send_group_message(&topic, &group_id, "hello friends")
        .await
        .unwrap();

    assert!(matches!(
        &drain(&admin).await[..],
        [Event::GroupMessageReceived { from, content, .. }]
            if *from == uid("bob") && content == "hello friends"
    ));
    assert!(drain(&bob).await.is_empty());

    let removed = admin.clean_all_groups().await.unwrap();
    assert_eq!(removed, vec![group_id.clone()]);
    assert!(matches!(
        &drain(&bob).await[..],
        [Event::GroupRemoved { group_id: id, .. }] if *id == group_id
    ));
    let state = bob.snapshot().await.unwrap();
    assert!(state.joined_groups.is_empty());
    assert!(state.discovered_groups.is_empty());
}

#[tokio::test]
async fn test_join_request_for_unowned_group_reports_authorization_error() {
    let broker = LocalBus::new();
    let admin = quiet(&broker, "admin1").await;
    let bob = quiet(&broker, "bob").await;

    let forged = GroupInfo {
        group_id: GroupId::parse("group_ghost_1_abc").unwrap(),
        group_name: "Ghost".into(),
        admin_id: uid("admin1"),
        control_admin_topic: "control/admin1".into(),
        member_count: 1,
        members: Vec::new(),
        created_at: "2026-01-02T03:04:05Z".parse().unwrap(),
    };
    bob.request_join_group(&forged).await.unwrap();

    assert!(matches!(
        &drain(&admin).await[..],
        [Event::Error { kind: ErrorKind::Authorization, .. }]
    ));
    assert!(admin.snapshot().await.unwrap().pending_join_requests.is_empty());
}

// =========================================================================
// Presence and lifecycle
// =========================================================================

#[tokio::test]
async fn test_presence_online_then_offline_on_shutdown() {
    let broker = LocalBus::new();
    let alice = ParleyClient::builder()
        .list_groups_on_start(false)
        .load_conversations(false)
        .connect(broker.connect("alice").unwrap())
        .await
        .unwrap();
    let bob = ParleyClient::builder()
        .list_groups_on_start(false)
        .load_conversations(false)
        .connect(broker.connect("bob").unwrap())
        .await
        .unwrap();

    assert!(matches!(
        &drain(&alice).await[..],
        [Event::PresenceUpdate { user_id, status: PresenceStatus::Online, .. }] if *user_id == uid("bob")
    ));
    assert!(matches!(
        &drain(&bob).await[..],
        [Event::PresenceUpdate { user_id, status: PresenceStatus::Online, .. }] if *user_id == uid("alice")
    ));

    bob.shutdown().await;

    assert!(matches!(
        &drain(&alice).await[..],
        [Event::PresenceUpdate { status: PresenceStatus::Offline, .. }]
    ));
    assert!(matches!(bob.poll_events().await, Err(ParleyError::Closed)));
}

#[tokio::test]
async fn test_saved_conversations_are_replayed_to_owner() {
    let broker = LocalBus::new();
    let alice = ParleyClient::builder()
        .announce_presence(false)
        .list_groups_on_start(false)
        .connect(broker.connect("alice").unwrap())
        .await
        .unwrap();

    let topic = alice.open_chat(&uid("bob")).await.unwrap();
    alice.save_conversations().await.unwrap();

    match &drain(&alice).await[..] {
        [Event::ConversationsLoaded { conversations }] => {
            assert_eq!(conversations.len(), 1);
            assert_eq!(conversations[0].topic, topic);
            assert_eq!(conversations[0].user_id, "bob");
            assert!(conversations[0].chat_individual);
        }
        other => panic!("expected ConversationsLoaded, got {other:?}"),
    }
    assert!(broker.retained("conversations/alice").is_some());

    alice.clear_conversations().await.unwrap();
    assert!(broker.retained("conversations/alice").is_none());
    assert!(drain(&alice).await.is_empty());
}
