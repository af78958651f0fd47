//! Topic names and topic filters.
//!
//! Topics are `/`-separated levels. Filters may use two wildcards:
//! `+` matches exactly one level, and `#` (only as the final level) matches
//! its parent level and everything below it, so `presence/#` matches both
//! `presence` and `presence/alice/phone`.

use crate::BusError;

/// Checks that `topic` can be published to.
///
/// # Errors
/// [`BusError::InvalidTopic`] if the topic is empty or contains a wildcard.
pub fn validate_topic(topic: &str) -> Result<(), BusError> {
    if topic.is_empty() || topic.contains(['+', '#']) {
        return Err(BusError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

/// Checks that `filter` is a well-formed subscription filter.
///
/// # Errors
/// [`BusError::InvalidFilter`] if the filter is empty, if a wildcard shares
/// a level with other characters, or if `#` is not the last level.
pub fn validate_filter(filter: &str) -> Result<(), BusError> {
    let invalid = || BusError::InvalidFilter(filter.to_string());
    if filter.is_empty() {
        return Err(invalid());
    }

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || i != last) {
            return Err(invalid());
        }
        if level.contains('+') && *level != "+" {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Returns `true` if the concrete `topic` is matched by `filter`.
///
/// Both arguments are assumed valid; see [`validate_topic`] and
/// [`validate_filter`].
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_topic_rejects_wildcards_and_empty() {
        assert!(validate_topic("control/alice").is_ok());
        assert!(validate_topic("").is_err());
        assert!(validate_topic("presence/#").is_err());
        assert!(validate_topic("group/+/x").is_err());
    }

    #[test]
    fn test_validate_filter_accepts_well_formed() {
        assert!(validate_filter("group/list/#").is_ok());
        assert!(validate_filter("#").is_ok());
        assert!(validate_filter("group/+/abc").is_ok());
        assert!(validate_filter("chat/alice_bob").is_ok());
    }

    #[test]
    fn test_validate_filter_rejects_misplaced_wildcards() {
        assert!(validate_filter("").is_err());
        assert!(validate_filter("group/#/list").is_err());
        assert!(validate_filter("group/li#").is_err());
        assert!(validate_filter("group/l+").is_err());
    }

    #[test]
    fn test_topic_matches_exact() {
        assert!(topic_matches("chat/alice_bob", "chat/alice_bob"));
        assert!(!topic_matches("chat/alice_bob", "chat/alice_bo"));
        assert!(!topic_matches("chat/alice_bob", "chat/alice_bob/x"));
    }

    #[test]
    fn test_topic_matches_multi_level_wildcard() {
        assert!(topic_matches("group/list/#", "group/list/g1"));
        assert!(topic_matches("group/list/#", "group/list/g1/extra"));
        // `#` also matches the parent level itself.
        assert!(topic_matches("group/list/#", "group/list"));
        assert!(!topic_matches("group/list/#", "group/chat/g1"));
        assert!(topic_matches("#", "anything/at/all"));
    }

    #[test]
    fn test_topic_matches_single_level_wildcard() {
        assert!(topic_matches("presence/+", "presence/alice"));
        assert!(!topic_matches("presence/+", "presence/alice/phone"));
        assert!(!topic_matches("presence/+", "presence"));
    }
}
