//! Scheduler types.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use bosswatch_core::Timer;

/// One pending reminder, keyed by `(timer_id, lead_minutes)`.
///
/// Ephemeral: never persisted, regenerated from the timer store on restart.
#[derive(Debug, Clone)]
pub struct ReminderJob {
    pub timer_id: String,
    pub entity_id: String,
    /// Minutes before spawn this reminder fires.
    pub lead_minutes: i64,
    /// Absolute fire time: `spawn_time - lead_minutes`.
    pub fire_at: DateTime<Utc>,
    pub spawn_time: DateTime<Utc>,
    /// Transport address the reminder goes to.
    pub destination: String,
}

impl ReminderJob {
    /// Derive a job for one lead interval of a timer.
    pub fn for_timer(timer: &Timer, lead_minutes: i64) -> Self {
        Self {
            timer_id: timer.id.clone(),
            entity_id: timer.entity_id.clone(),
            lead_minutes,
            fire_at: timer.spawn_time - chrono::Duration::minutes(lead_minutes),
            spawn_time: timer.spawn_time,
            destination: timer.destination.clone(),
        }
    }

    /// Whether this job's fire time has arrived.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.fire_at <= now
    }
}

/// Payload handed to the delivery sink when a job fires.
#[derive(Debug, Clone)]
pub struct Reminder {
    pub entity_id: String,
    pub spawn_time: DateTime<Utc>,
    pub destination: String,
    pub lead_minutes: i64,
}

impl From<&ReminderJob> for Reminder {
    fn from(job: &ReminderJob) -> Self {
        Self {
            entity_id: job.entity_id.clone(),
            spawn_time: job.spawn_time,
            destination: job.destination.clone(),
            lead_minutes: job.lead_minutes,
        }
    }
}

/// Type alias for the reminder delivery function.
pub type ReminderSink =
    Box<dyn Fn(Reminder) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use bosswatch_core::Scope;
    use chrono::Duration;

    fn timer(spawn_time: DateTime<Utc>) -> Timer {
        let scope = Scope::Group {
            group_id: "g1".to_string(),
        };
        Timer {
            id: scope.timer_id("wdk"),
            entity_id: "wdk".to_string(),
            death_time: None,
            spawn_time,
            destination: scope.destination(),
            scope,
            created_at: spawn_time,
        }
    }

    #[test]
    fn job_fires_lead_minutes_before_spawn() {
        let spawn = Utc::now() + Duration::hours(1);
        let job = ReminderJob::for_timer(&timer(spawn), 3);
        assert_eq!(job.fire_at, spawn - Duration::minutes(3));
        assert_eq!(job.timer_id, "g:g1:wdk");
    }

    #[test]
    fn dueness_is_inclusive_at_fire_time() {
        let now = Utc::now();
        let job = ReminderJob::for_timer(&timer(now + Duration::minutes(3)), 3);
        assert!(job.is_due(now));
        assert!(!job.is_due(now - Duration::seconds(1)));
    }
}
