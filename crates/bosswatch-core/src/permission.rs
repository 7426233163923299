//! Permission and visibility gate.
//!
//! Two-tier isolation: whitelists decide whether a scope may register timers
//! at all, and group Sets decide which timers a group viewer can see. Sets are
//! hard boundaries; a core group extends visibility only within its own set.
//! All checks are pure functions over a config snapshot.

use std::collections::HashSet;

use tracing::error;

use crate::config::BotConfig;
use crate::types::{Scope, Timer};

/// Cross-tenant partition a group scope may belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSet {
    One,
    Two,
}

/// Set membership: whitelist OR core list of either set. Set 1 takes
/// precedence when a group is (mis)configured into both.
pub fn group_set(group_id: &str, config: &BotConfig) -> Option<GroupSet> {
    let in_list = |list: &[String]| list.iter().any(|g| g == group_id);
    if in_list(&config.whitelist_groups) || in_list(&config.core_groups) {
        Some(GroupSet::One)
    } else if in_list(&config.whitelist_groups_2) || in_list(&config.core_groups_2) {
        Some(GroupSet::Two)
    } else {
        None
    }
}

/// Whether a group appears in either set's core list.
pub fn is_core(group_id: &str, config: &BotConfig) -> bool {
    config.core_groups.iter().any(|g| g == group_id)
        || config.core_groups_2.iter().any(|g| g == group_id)
}

/// Whether this group may register timers: whitelisting off, or the group
/// belongs to one of the sets.
pub fn group_enabled(group_id: &str, config: &BotConfig) -> bool {
    !config.whitelist_enabled || group_set(group_id, config).is_some()
}

/// Whether this user may use the bot in private chat.
///
/// An empty user whitelist means private chat is fully disabled, not open.
pub fn user_enabled(user_id: &str, config: &BotConfig) -> bool {
    !config.whitelist_users.is_empty() && config.whitelist_users.iter().any(|u| u == user_id)
}

/// Canonical entity ids this group may track; None means unrestricted.
pub fn allowed_entities(group_id: &str, config: &BotConfig) -> Option<HashSet<String>> {
    if !config.group_boss_filter_enabled {
        return None;
    }

    let filters: serde_json::Map<String, serde_json::Value> =
        match serde_json::from_str(&config.group_boss_filters) {
            Ok(filters) => filters,
            Err(e) => {
                error!(error = %e, "failed to parse group_boss_filters");
                return None;
            }
        };

    let entities: HashSet<String> = filters
        .get(group_id)?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();

    if entities.is_empty() { None } else { Some(entities) }
}

/// Whether `timer` is visible to `viewer`.
///
/// - A private viewer sees exactly their own private timers.
/// - Group viewers never see private timers.
/// - Group timers from a different set (including no set at all vs. a set)
///   are never visible.
/// - Within the same set, core viewers see everything; others see only their
///   own group's timers.
pub fn visible(timer: &Timer, viewer: &Scope, config: &BotConfig) -> bool {
    match viewer {
        Scope::Private { user_id } => {
            matches!(&timer.scope, Scope::Private { user_id: owner } if owner == user_id)
        }
        Scope::Group { group_id: viewer_group } => {
            let Scope::Group { group_id: timer_group } = &timer.scope else {
                return false;
            };
            if group_set(timer_group, config) != group_set(viewer_group, config) {
                return false;
            }
            if is_core(viewer_group, config) {
                return true;
            }
            timer_group == viewer_group
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config_with_sets() -> BotConfig {
        BotConfig {
            whitelist_enabled: true,
            whitelist_groups: vec!["g1".to_string(), "g1b".to_string()],
            core_groups: vec!["core1".to_string()],
            whitelist_groups_2: vec!["g2".to_string()],
            core_groups_2: vec!["core2".to_string()],
            whitelist_users: vec!["u1".to_string()],
            ..Default::default()
        }
    }

    fn group_timer(group_id: &str) -> Timer {
        let scope = Scope::Group {
            group_id: group_id.to_string(),
        };
        Timer {
            id: scope.timer_id("wdk"),
            entity_id: "wdk".to_string(),
            death_time: None,
            spawn_time: Utc::now(),
            destination: scope.destination(),
            scope,
            created_at: Utc::now(),
        }
    }

    fn private_timer(user_id: &str) -> Timer {
        let scope = Scope::Private {
            user_id: user_id.to_string(),
        };
        Timer {
            id: scope.timer_id("wdk"),
            entity_id: "wdk".to_string(),
            death_time: None,
            spawn_time: Utc::now(),
            destination: scope.destination(),
            scope,
            created_at: Utc::now(),
        }
    }

    fn group(id: &str) -> Scope {
        Scope::Group {
            group_id: id.to_string(),
        }
    }

    fn private(id: &str) -> Scope {
        Scope::Private {
            user_id: id.to_string(),
        }
    }

    #[test]
    fn set_membership_comes_from_whitelist_or_core_lists() {
        let config = config_with_sets();
        assert_eq!(group_set("g1", &config), Some(GroupSet::One));
        assert_eq!(group_set("core1", &config), Some(GroupSet::One));
        assert_eq!(group_set("g2", &config), Some(GroupSet::Two));
        assert_eq!(group_set("core2", &config), Some(GroupSet::Two));
        assert_eq!(group_set("stranger", &config), None);
    }

    #[test]
    fn group_enabled_requires_membership_only_when_whitelisting() {
        let config = config_with_sets();
        assert!(group_enabled("g1", &config));
        assert!(group_enabled("g2", &config));
        assert!(!group_enabled("stranger", &config));

        let open = BotConfig::default();
        assert!(group_enabled("stranger", &open));
    }

    #[test]
    fn empty_user_whitelist_disables_private_chat() {
        let config = config_with_sets();
        assert!(user_enabled("u1", &config));
        assert!(!user_enabled("u2", &config));

        let open = BotConfig::default();
        assert!(!user_enabled("u1", &open));
    }

    #[test]
    fn private_timers_visible_only_to_their_owner_in_private() {
        let config = config_with_sets();
        let timer = private_timer("u1");
        assert!(visible(&timer, &private("u1"), &config));
        assert!(!visible(&timer, &private("u2"), &config));
        // Never in groups, not even core ones.
        assert!(!visible(&timer, &group("core1"), &config));
        assert!(!visible(&timer, &group("g1"), &config));
    }

    #[test]
    fn group_timers_invisible_to_private_viewers() {
        let config = config_with_sets();
        assert!(!visible(&group_timer("g1"), &private("u1"), &config));
    }

    #[test]
    fn sets_are_hard_isolation_boundaries() {
        let config = config_with_sets();
        // Cross-set, even core to core.
        assert!(!visible(&group_timer("g1"), &group("g2"), &config));
        assert!(!visible(&group_timer("g2"), &group("g1"), &config));
        assert!(!visible(&group_timer("g1"), &group("core2"), &config));
        assert!(!visible(&group_timer("g2"), &group("core1"), &config));
        // Ungrouped vs. set, both directions.
        assert!(!visible(&group_timer("stranger"), &group("core1"), &config));
        assert!(!visible(&group_timer("g1"), &group("stranger"), &config));
    }

    #[test]
    fn core_groups_see_their_whole_set() {
        let config = config_with_sets();
        assert!(visible(&group_timer("g1"), &group("core1"), &config));
        assert!(visible(&group_timer("g1b"), &group("core1"), &config));
        assert!(visible(&group_timer("g2"), &group("core2"), &config));
    }

    #[test]
    fn non_core_groups_see_only_themselves() {
        let config = config_with_sets();
        assert!(visible(&group_timer("g1"), &group("g1"), &config));
        assert!(!visible(&group_timer("g1b"), &group("g1"), &config));
        // Same-group visibility also holds for two ungrouped scopes.
        let open = BotConfig::default();
        assert!(visible(&group_timer("x"), &group("x"), &open));
        assert!(!visible(&group_timer("x"), &group("y"), &open));
    }

    #[test]
    fn allowed_entities_unrestricted_unless_configured() {
        let mut config = config_with_sets();
        assert_eq!(allowed_entities("g1", &config), None);

        config.group_boss_filter_enabled = true;
        config.group_boss_filters = r#"{"g1": ["wdk", "bmm"]}"#.to_string();
        let allowed = allowed_entities("g1", &config).unwrap();
        assert!(allowed.contains("wdk"));
        assert!(allowed.contains("bmm"));
        assert_eq!(allowed.len(), 2);
        // Groups without a filter entry stay unrestricted.
        assert_eq!(allowed_entities("g2", &config), None);
        // Malformed filter JSON degrades to unrestricted.
        config.group_boss_filters = "not json".to_string();
        assert_eq!(allowed_entities("g1", &config), None);
    }
}
