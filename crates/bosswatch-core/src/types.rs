//! Scope and timer types.

use chrono::{DateTime, Utc};

/// The isolation boundary a timer belongs to: a chat group or a private user.
///
/// All gate logic pattern-matches on the variant; there is no subtyping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// A group chat, identified by its platform group id.
    Group { group_id: String },
    /// A private chat with a single user.
    Private { user_id: String },
}

impl Scope {
    /// Group id, if this is a group scope.
    pub fn group_id(&self) -> Option<&str> {
        match self {
            Scope::Group { group_id } => Some(group_id),
            Scope::Private { .. } => None,
        }
    }

    /// User id, if this is a private scope.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Scope::Group { .. } => None,
            Scope::Private { user_id } => Some(user_id),
        }
    }

    /// Derive the timer id for an entity tracked in this scope.
    ///
    /// Deterministic: the same (scope, entity) pair always yields the same id,
    /// so at most one timer exists per pair and reminder job keys survive
    /// restarts. The kind prefix and `:` separator keep ids from distinct
    /// scopes disjoint even when one scope's id embeds another's (catalog
    /// canonical ids contain no `:`).
    pub fn timer_id(&self, canonical_id: &str) -> String {
        match self {
            Scope::Group { group_id } => format!("g:{}:{}", group_id, canonical_id),
            Scope::Private { user_id } => format!("p:{}:{}", user_id, canonical_id),
        }
    }

    /// Opaque transport address reminders for this scope are delivered to.
    pub fn destination(&self) -> String {
        match self {
            Scope::Group { group_id } => format!("group:{}", group_id),
            Scope::Private { user_id } => format!("private:{}", user_id),
        }
    }
}

/// One entity's next predicted occurrence for one scope.
///
/// Owned exclusively by the [`crate::TimerStore`]; the scheduler only holds
/// derived jobs referencing `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Timer {
    /// Deterministic id from [`Scope::timer_id`].
    pub id: String,
    /// Canonical entity id from the catalog.
    pub entity_id: String,
    /// When the entity was reported dead. Absent for manually added timers.
    pub death_time: Option<DateTime<Utc>>,
    /// When the entity will spawn. Always `death_time + respawn_duration`
    /// when a death time is present.
    pub spawn_time: DateTime<Utc>,
    /// Owning scope; decides visibility.
    pub scope: Scope,
    /// Transport address the reminders go to.
    pub destination: String,
    /// When this timer was created.
    pub created_at: DateTime<Utc>,
}

impl Timer {
    /// Whether this timer's spawn time has already passed.
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.spawn_time <= now
    }
}
