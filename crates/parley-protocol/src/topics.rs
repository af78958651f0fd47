//! Topic addressing: pure functions from identities to topic names.
//!
//! The bus has no addresses, only topics, so every rendezvous in Parley is
//! a naming convention both sides can compute on their own:
//!
//! | Namespace | Pattern | Used for |
//! |---|---|---|
//! | personal control | `control/{identity}` | point-to-point signalling |
//! | presence | `presence/{identity}` | retained online/offline status |
//! | saved conversations | `conversations/{identity}` | retained conversation list |
//! | canonical chat | `chat/{lower}_{higher}` | two-party chat |
//! | group chat | `group/chat/{group_id}` | group broadcast |
//! | group discovery | `group/list/{group_id}` | retained group advertisement |

use crate::{GroupId, UserId};

/// Subscribes to every presence record.
pub const PRESENCE_WILDCARD: &str = "presence/#";

/// Subscribes to every group advertisement.
pub const GROUP_DISCOVERY_WILDCARD: &str = "group/list/#";

const CONTROL_PREFIX: &str = "control/";
const PRESENCE_PREFIX: &str = "presence/";
const CONVERSATIONS_PREFIX: &str = "conversations/";
const CHAT_PREFIX: &str = "chat/";
const GROUP_CHAT_PREFIX: &str = "group/chat/";
const GROUP_DISCOVERY_PREFIX: &str = "group/list/";

/// The one topic two parties chat on, whoever invited whom.
///
/// The identities are ordered lexicographically before joining, so
/// `canonical_chat_topic(a, b) == canonical_chat_topic(b, a)`.
///
/// Identities may themselves contain `_`, in which case two different pairs
/// can map to the same topic (`a_b`+`c` and `a`+`b_c`). Deployments that
/// allow `_` in identities should be aware of this.
pub fn canonical_chat_topic(a: &UserId, b: &UserId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{CHAT_PREFIX}{lo}_{hi}")
}

/// Personal control topic: invites, join requests and their answers.
pub fn control_topic(user: &UserId) -> String {
    format!("{CONTROL_PREFIX}{user}")
}

/// Personal retained presence record.
pub fn presence_topic(user: &UserId) -> String {
    format!("{PRESENCE_PREFIX}{user}")
}

/// Personal retained list of saved conversations.
pub fn conversations_topic(user: &UserId) -> String {
    format!("{CONVERSATIONS_PREFIX}{user}")
}

/// Broadcast topic for a group's messages.
pub fn group_chat_topic(group: &GroupId) -> String {
    format!("{GROUP_CHAT_PREFIX}{group}")
}

/// Retained advertisement topic for a group.
pub fn group_discovery_topic(group: &GroupId) -> String {
    format!("{GROUP_DISCOVERY_PREFIX}{group}")
}

/// Which namespace a concrete topic belongs to.
///
/// Each variant borrows the trailing segment of the topic (the identity,
/// pair or group id). Use [`TopicKind::parse`] to classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind<'a> {
    Presence { user: &'a str },
    Control { user: &'a str },
    Conversations { user: &'a str },
    Chat { pair: &'a str },
    GroupChat { group: &'a str },
    GroupDiscovery { group: &'a str },
}

impl<'a> TopicKind<'a> {
    /// Classifies `topic`, checking namespaces in a fixed priority order:
    /// presence, control, conversations, chat, group chat, group discovery.
    ///
    /// Returns `None` for topics outside every namespace, including ones
    /// with extra levels (`control/alice/extra`) or an empty tail.
    pub fn parse(topic: &'a str) -> Option<Self> {
        let tail = |prefix: &str| -> Option<&'a str> {
            topic
                .strip_prefix(prefix)
                .filter(|rest| !rest.is_empty() && !rest.contains('/'))
        };

        if let Some(user) = tail(PRESENCE_PREFIX) {
            Some(Self::Presence { user })
        } else if let Some(user) = tail(CONTROL_PREFIX) {
            Some(Self::Control { user })
        } else if let Some(user) = tail(CONVERSATIONS_PREFIX) {
            Some(Self::Conversations { user })
        } else if let Some(pair) = tail(CHAT_PREFIX) {
            Some(Self::Chat { pair })
        } else if let Some(group) = tail(GROUP_CHAT_PREFIX) {
            Some(Self::GroupChat { group })
        } else {
            tail(GROUP_DISCOVERY_PREFIX).map(|group| Self::GroupDiscovery { group })
        }
    }

    /// Short namespace name for logs and error events.
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Presence { .. } => "presence",
            Self::Control { .. } => "control",
            Self::Conversations { .. } => "conversations",
            Self::Chat { .. } => "chat",
            Self::GroupChat { .. } => "group-chat",
            Self::GroupDiscovery { .. } => "group-discovery",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[test]
    fn test_canonical_chat_topic_is_symmetric() {
        let pairs = [("alice", "bob"), ("zed", "amy"), ("u1", "u10"), ("same", "same")];
        for (a, b) in pairs {
            assert_eq!(
                canonical_chat_topic(&uid(a), &uid(b)),
                canonical_chat_topic(&uid(b), &uid(a)),
            );
        }
    }

    #[test]
    fn test_canonical_chat_topic_sorts_lexicographically() {
        assert_eq!(canonical_chat_topic(&uid("bob"), &uid("alice")), "chat/alice_bob");
        // Byte order, not numeric order.
        assert_eq!(canonical_chat_topic(&uid("u2"), &uid("u10")), "chat/u10_u2");
    }

    #[test]
    fn test_personal_topics() {
        let bob = uid("bob");
        assert_eq!(control_topic(&bob), "control/bob");
        assert_eq!(presence_topic(&bob), "presence/bob");
        assert_eq!(conversations_topic(&bob), "conversations/bob");
    }

    #[test]
    fn test_group_topics() {
        let g = GroupId::parse("group_Friends_1_abc").unwrap();
        assert_eq!(group_chat_topic(&g), "group/chat/group_Friends_1_abc");
        assert_eq!(group_discovery_topic(&g), "group/list/group_Friends_1_abc");
    }

    #[test]
    fn test_topic_kind_parse_each_namespace() {
        assert_eq!(
            TopicKind::parse("presence/alice"),
            Some(TopicKind::Presence { user: "alice" })
        );
        assert_eq!(
            TopicKind::parse("control/bob"),
            Some(TopicKind::Control { user: "bob" })
        );
        assert_eq!(
            TopicKind::parse("conversations/bob"),
            Some(TopicKind::Conversations { user: "bob" })
        );
        assert_eq!(
            TopicKind::parse("chat/alice_bob"),
            Some(TopicKind::Chat { pair: "alice_bob" })
        );
        assert_eq!(
            TopicKind::parse("group/chat/g1"),
            Some(TopicKind::GroupChat { group: "g1" })
        );
        assert_eq!(
            TopicKind::parse("group/list/g1"),
            Some(TopicKind::GroupDiscovery { group: "g1" })
        );
    }

    #[test]
    fn test_topic_kind_parse_rejects_foreign_and_malformed() {
        assert_eq!(TopicKind::parse("weather/today"), None);
        assert_eq!(TopicKind::parse("control/"), None);
        assert_eq!(TopicKind::parse("control/alice/extra"), None);
        assert_eq!(TopicKind::parse("group/list"), None);
        assert_eq!(TopicKind::parse("group/other/g1"), None);
    }

    #[test]
    fn test_topic_kind_round_trips_builders() {
        let alice = uid("alice");
        let g = GroupId::parse("g9").unwrap();
        assert_eq!(
            TopicKind::parse(&control_topic(&alice)).map(|k| k.namespace()),
            Some("control")
        );
        assert_eq!(
            TopicKind::parse(&group_discovery_topic(&g)).map(|k| k.namespace()),
            Some("group-discovery")
        );
    }
}
