//! Timer lifecycle controller.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use bosswatch_core::{
    BotConfig, EntityCatalog, Scope, Timer, TimerStore, allowed_entities, group_enabled,
    resolve_absolute, resolve_relative, user_enabled, visible,
};
use bosswatch_scheduler::{Reminder, ReminderScheduler, RestoreOutcome};

use crate::AgentError;
use crate::format;

/// Result of a global reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOutcome {
    pub timers_cleared: usize,
    pub jobs_cancelled: usize,
}

/// Owns the timer state and orchestrates every lifecycle operation.
///
/// The store and scheduler are always mutated together, serialized by the
/// store mutex; the snapshot save happens inside an operation but its failure
/// never rolls the in-memory mutation back.
pub struct TimerController {
    catalog: EntityCatalog,
    config: BotConfig,
    tz: Tz,
    intervals: Vec<i64>,
    store: Mutex<TimerStore>,
    scheduler: ReminderScheduler,
}

impl TimerController {
    pub fn new(
        catalog: EntityCatalog,
        config: BotConfig,
        store: TimerStore,
        scheduler: ReminderScheduler,
    ) -> Self {
        let tz = config.tz();
        let intervals = config.intervals();
        Self {
            catalog,
            config,
            tz,
            intervals,
            store: Mutex::new(store),
            scheduler,
        }
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Scheduler handle (clones share the job set).
    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    /// Record an entity death and arm its respawn timer.
    ///
    /// Replaces any existing timer for the same (scope, entity) pair rather
    /// than accumulating a second one.
    pub async fn record_death(
        &self,
        scope: &Scope,
        entity_alias: &str,
        time_fragment: &str,
        now: DateTime<Utc>,
    ) -> Result<Timer, AgentError> {
        let entity_id = self.resolve_entity(entity_alias)?;
        self.check_scope(scope)?;
        self.check_entity_filter(scope, &entity_id)?;

        let death_time = resolve_relative(time_fragment, now, self.tz)?;
        let spawn_time = death_time + self.catalog.respawn_duration(&entity_id);

        let timer = Timer {
            id: scope.timer_id(&entity_id),
            entity_id,
            death_time: Some(death_time),
            spawn_time,
            scope: scope.clone(),
            destination: scope.destination(),
            created_at: now,
        };
        info!(
            timer_id = %timer.id,
            entity_id = %timer.entity_id,
            spawn_time = %timer.spawn_time,
            "recorded death"
        );
        Ok(self.install(timer, now).await)
    }

    /// Manually add a timer with an explicit future spawn time.
    pub async fn add_manual(
        &self,
        scope: &Scope,
        entity_alias: &str,
        time_fragment: &str,
        now: DateTime<Utc>,
    ) -> Result<Timer, AgentError> {
        let entity_id = self.resolve_entity(entity_alias)?;
        self.check_scope(scope)?;
        self.check_entity_filter(scope, &entity_id)?;

        let spawn_time = resolve_absolute(time_fragment, now, self.tz)?;
        if spawn_time <= now {
            return Err(AgentError::NotFuture);
        }

        let timer = Timer {
            id: scope.timer_id(&entity_id),
            entity_id,
            death_time: None,
            spawn_time,
            scope: scope.clone(),
            destination: scope.destination(),
            created_at: now,
        };
        info!(
            timer_id = %timer.id,
            entity_id = %timer.entity_id,
            spawn_time = %timer.spawn_time,
            "manually added timer"
        );
        Ok(self.install(timer, now).await)
    }

    /// Replace-in-place: cancel and delete any previous timer under the same
    /// id, then persist and schedule the new one.
    async fn install(&self, timer: Timer, now: DateTime<Utc>) -> Timer {
        let mut store = self.store.lock().await;
        if store.get(&timer.id).is_some() {
            self.scheduler.cancel_all(&timer.id).await;
            store.delete(&timer.id);
        }
        store.upsert(timer.clone());
        self.persist(&store).await;
        self.scheduler.schedule(&timer, &self.intervals, now).await;
        timer
    }

    /// Cancel every timer for (scope, entity). Returns how many were removed.
    pub async fn cancel(&self, scope: &Scope, entity_alias: &str) -> Result<usize, AgentError> {
        let entity_id = self.resolve_entity(entity_alias)?;

        let mut store = self.store.lock().await;
        // The replace invariant makes this normally at most one, but sweep by
        // (scope, entity) rather than trusting the derived id alone.
        let matching: Vec<String> = store
            .all()
            .filter(|t| t.entity_id == entity_id && &t.scope == scope)
            .map(|t| t.id.clone())
            .collect();

        for id in &matching {
            self.scheduler.cancel_all(id).await;
            store.delete(id);
            info!(timer_id = %id, "cancelled timer");
        }
        if !matching.is_empty() {
            self.persist(&store).await;
        }
        Ok(matching.len())
    }

    /// Non-expired timers visible to the viewer, sorted by spawn time.
    ///
    /// Expired timers observed here are removed from the store, the same way
    /// restore prunes them.
    pub async fn list_visible(&self, viewer: &Scope, now: DateTime<Utc>) -> Vec<Timer> {
        let mut store = self.store.lock().await;

        let expired: Vec<String> = store
            .all()
            .filter(|t| t.expired(now))
            .map(|t| t.id.clone())
            .collect();
        for id in &expired {
            self.scheduler.cancel_all(id).await;
            store.delete(id);
        }
        if !expired.is_empty() {
            self.persist(&store).await;
        }

        let filter = viewer
            .group_id()
            .and_then(|group_id| allowed_entities(group_id, &self.config));

        let mut timers: Vec<Timer> = store
            .all()
            .filter(|t| visible(t, viewer, &self.config))
            .filter(|t| {
                filter
                    .as_ref()
                    .is_none_or(|allowed| allowed.contains(&t.entity_id))
            })
            .cloned()
            .collect();
        timers.sort_by_key(|t| t.spawn_time);
        timers
    }

    /// Clear the entire store and every pending job, process-wide.
    ///
    /// Group scopes must present the caller-supplied privilege signal (group
    /// admin); private scopes only need to be enabled.
    pub async fn reset(&self, scope: &Scope, is_privileged: bool) -> Result<ResetOutcome, AgentError> {
        self.check_scope(scope)?;
        if matches!(scope, Scope::Group { .. }) && !is_privileged {
            return Err(AgentError::NotPrivileged);
        }

        let mut store = self.store.lock().await;
        let jobs_cancelled = self.scheduler.cancel_everything().await;
        let timers_cleared = store.clear();
        self.persist(&store).await;

        info!(timers_cleared, jobs_cancelled, "reset all timers");
        Ok(ResetOutcome {
            timers_cleared,
            jobs_cancelled,
        })
    }

    /// Restore schedules from the snapshot at process start.
    pub async fn restore(&self, now: DateTime<Utc>) -> RestoreOutcome {
        let mut store = self.store.lock().await;
        let outcome = self
            .scheduler
            .restore_all(&mut store, &self.intervals, now)
            .await;
        if outcome.pruned > 0 {
            self.persist(&store).await;
        }
        outcome
    }

    /// Persist the snapshot on demand (shutdown path).
    pub async fn save(&self) {
        let store = self.store.lock().await;
        self.persist(&store).await;
    }

    /// Render the text for a fired reminder.
    pub fn reminder_text(&self, reminder: &Reminder) -> String {
        format::reminder(
            &self.catalog.display(&reminder.entity_id),
            reminder.spawn_time,
            reminder.lead_minutes,
            self.tz,
            self.config.secondary_tz(),
        )
    }

    fn resolve_entity(&self, alias: &str) -> Result<String, AgentError> {
        self.catalog
            .resolve_alias(alias)
            .map(String::from)
            .ok_or_else(|| AgentError::UnknownEntity(alias.to_string()))
    }

    fn check_scope(&self, scope: &Scope) -> Result<(), AgentError> {
        let enabled = match scope {
            Scope::Group { group_id } => group_enabled(group_id, &self.config),
            Scope::Private { user_id } => user_enabled(user_id, &self.config),
        };
        if enabled {
            Ok(())
        } else {
            Err(AgentError::ScopeDisabled)
        }
    }

    fn check_entity_filter(&self, scope: &Scope, entity_id: &str) -> Result<(), AgentError> {
        if let Some(group_id) = scope.group_id()
            && let Some(allowed) = allowed_entities(group_id, &self.config)
            && !allowed.contains(entity_id)
        {
            warn!(group_id, entity_id, "entity excluded by group filter");
            return Err(AgentError::EntityFiltered);
        }
        Ok(())
    }

    /// Snapshot write, degraded-mode on failure: losing durability is better
    /// than losing the user's action. Serialization happens here; the file
    /// write runs on the blocking pool so it never ties up a worker thread.
    async fn persist(&self, store: &TimerStore) {
        let json = match store.snapshot_json() {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize timer snapshot, in-memory state remains authoritative");
                return;
            }
        };
        let path = store.path().to_path_buf();
        let written =
            tokio::task::spawn_blocking(move || TimerStore::write_snapshot(&path, &json)).await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "failed to save timer snapshot, in-memory state remains authoritative");
            }
            Err(e) => error!(error = %e, "timer snapshot writer task failed"),
        }
    }
}
