//! Reminder scheduler implementation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};
use tokio::time::sleep;
use tracing::{debug, error, info};

use bosswatch_core::{Timer, TimerStore};

use crate::{Reminder, ReminderJob, ReminderSink};

/// Minimum sleep duration between scheduler checks.
const MIN_SLEEP_SECS: u64 = 1;

/// Maximum sleep duration between scheduler checks.
const MAX_SLEEP_SECS: u64 = 60;

/// Result of restoring schedules from the timer store at startup.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Expired (or unusable) timers removed from the store.
    pub pruned: usize,
    /// Timers that got at least one job scheduled.
    pub timers_restored: usize,
    /// Total jobs scheduled.
    pub jobs_scheduled: usize,
}

/// The reminder scheduler.
///
/// Cheap to clone; clones share the same pending job set.
#[derive(Clone, Default)]
pub struct ReminderScheduler {
    jobs: Arc<RwLock<Vec<ReminderJob>>>,
}

impl ReminderScheduler {
    /// Create a scheduler with no pending jobs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule reminders for a timer at each configured lead time.
    ///
    /// Lead times whose fire time has already passed are skipped silently.
    /// Re-scheduling the same `(timer_id, lead_minutes)` key replaces the
    /// existing job. Returns the number of jobs armed.
    pub async fn schedule(&self, timer: &Timer, intervals: &[i64], now: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write().await;
        let mut scheduled = 0;

        for &lead_minutes in intervals {
            let job = ReminderJob::for_timer(timer, lead_minutes);
            if job.fire_at <= now {
                debug!(
                    timer_id = %timer.id,
                    lead_minutes,
                    fire_at = %job.fire_at,
                    "skipping past reminder"
                );
                continue;
            }

            jobs.retain(|j| !(j.timer_id == timer.id && j.lead_minutes == lead_minutes));
            debug!(
                timer_id = %timer.id,
                lead_minutes,
                fire_at = %job.fire_at,
                "scheduled reminder"
            );
            jobs.push(job);
            scheduled += 1;
        }

        scheduled
    }

    /// Cancel every pending job belonging to a timer. Safe when none exist.
    pub async fn cancel_all(&self, timer_id: &str) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|j| j.timer_id != timer_id);
        let cancelled = before - jobs.len();
        if cancelled > 0 {
            debug!(timer_id, cancelled, "cancelled reminder jobs");
        }
        cancelled
    }

    /// Cancel every pending job process-wide (used by reset).
    pub async fn cancel_everything(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let cancelled = jobs.len();
        jobs.clear();
        cancelled
    }

    /// Number of pending jobs.
    pub async fn pending_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Pending jobs for one timer.
    pub async fn jobs_for(&self, timer_id: &str) -> Vec<ReminderJob> {
        self.jobs
            .read()
            .await
            .iter()
            .filter(|j| j.timer_id == timer_id)
            .cloned()
            .collect()
    }

    /// Rebuild schedules from the store at process start.
    ///
    /// Timers already expired are removed from the store instead of being
    /// scheduled; the caller persists the store when `pruned > 0`. This is
    /// the only path that runs before any job exists.
    pub async fn restore_all(
        &self,
        store: &mut TimerStore,
        intervals: &[i64],
        now: DateTime<Utc>,
    ) -> RestoreOutcome {
        let expired: Vec<String> = store
            .all()
            .filter(|t| t.expired(now))
            .map(|t| t.id.clone())
            .collect();
        for id in &expired {
            debug!(timer_id = %id, "pruning expired timer");
            store.delete(id);
        }

        let timers: Vec<Timer> = store.all().cloned().collect();
        let mut outcome = RestoreOutcome {
            pruned: expired.len(),
            ..Default::default()
        };
        for timer in &timers {
            let scheduled = self.schedule(timer, intervals, now).await;
            outcome.jobs_scheduled += scheduled;
            if scheduled > 0 {
                outcome.timers_restored += 1;
            }
        }

        if outcome.pruned > 0 || outcome.timers_restored > 0 {
            info!(
                pruned = outcome.pruned,
                restored = outcome.timers_restored,
                jobs = outcome.jobs_scheduled,
                "restored reminder schedules"
            );
        }
        outcome
    }

    /// Remove and return every job that is due at `now`.
    pub async fn take_due_jobs(&self, now: DateTime<Utc>) -> Vec<ReminderJob> {
        let mut jobs = self.jobs.write().await;
        let (due, pending): (Vec<_>, Vec<_>) = jobs.drain(..).partition(|j| j.is_due(now));
        *jobs = pending;
        due
    }

    /// How long to sleep until the next job is due, clamped to
    /// `[MIN_SLEEP_SECS, MAX_SLEEP_SECS]`.
    pub async fn calculate_sleep_duration(&self, now: DateTime<Utc>) -> std::time::Duration {
        let jobs = self.jobs.read().await;
        let next_due = jobs.iter().map(|j| j.fire_at).min();

        let secs = match next_due {
            Some(next) => {
                let diff = (next - now).num_seconds();
                (diff.max(MIN_SLEEP_SECS as i64) as u64).min(MAX_SLEEP_SECS)
            }
            None => MAX_SLEEP_SECS,
        };

        std::time::Duration::from_secs(secs)
    }

    /// Run the delivery loop until shutdown.
    ///
    /// Each due job is delivered on its own task so a slow or failing send
    /// never stalls the loop; delivery failures are logged and dropped.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>, sink: ReminderSink) {
        info!("reminder scheduler starting");

        loop {
            if *shutdown_rx.borrow() {
                info!("reminder scheduler shutting down");
                break;
            }

            let now = Utc::now();
            for job in self.take_due_jobs(now).await {
                info!(
                    timer_id = %job.timer_id,
                    entity_id = %job.entity_id,
                    lead_minutes = job.lead_minutes,
                    destination = %job.destination,
                    "reminder due"
                );
                let delivery = sink(Reminder::from(&job));
                tokio::spawn(async move {
                    if let Err(e) = delivery.await {
                        error!(
                            timer_id = %job.timer_id,
                            lead_minutes = job.lead_minutes,
                            error = %e,
                            "reminder delivery failed"
                        );
                    }
                });
            }

            let sleep_duration = self.calculate_sleep_duration(Utc::now()).await;
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("reminder scheduler received shutdown signal");
                    }
                }
                _ = sleep(sleep_duration) => {}
            }
        }

        info!("reminder scheduler shut down gracefully");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosswatch_core::Scope;
    use chrono::Duration;
    use chrono_tz::Asia::Shanghai;

    fn timer(group_id: &str, entity: &str, spawn_time: DateTime<Utc>) -> Timer {
        let scope = Scope::Group {
            group_id: group_id.to_string(),
        };
        Timer {
            id: scope.timer_id(entity),
            entity_id: entity.to_string(),
            death_time: None,
            spawn_time,
            destination: scope.destination(),
            scope,
            created_at: spawn_time - Duration::hours(8),
        }
    }

    #[tokio::test]
    async fn schedule_arms_one_job_per_future_lead() {
        let scheduler = ReminderScheduler::new();
        let now = Utc::now();
        let t = timer("g1", "wdk", now + Duration::hours(1));

        let scheduled = scheduler.schedule(&t, &[10, 5, 1], now).await;
        assert_eq!(scheduled, 3);

        let jobs = scheduler.jobs_for("g:g1:wdk").await;
        assert_eq!(jobs.len(), 3);
        let mut leads: Vec<i64> = jobs.iter().map(|j| j.lead_minutes).collect();
        leads.sort_unstable();
        assert_eq!(leads, vec![1, 5, 10]);
        for job in &jobs {
            assert_eq!(job.fire_at, t.spawn_time - Duration::minutes(job.lead_minutes));
        }
    }

    #[tokio::test]
    async fn schedule_skips_past_due_leads() {
        // Scenario C: spawn in 2 minutes, 3-minute lead already past.
        let scheduler = ReminderScheduler::new();
        let now = Utc::now();
        let t = timer("g1", "wdk", now + Duration::minutes(2));

        assert_eq!(scheduler.schedule(&t, &[3], now).await, 0);
        assert_eq!(scheduler.pending_count().await, 0);

        // Mixed: only the 1-minute lead survives.
        assert_eq!(scheduler.schedule(&t, &[3, 1], now).await, 1);
        assert_eq!(scheduler.jobs_for("g:g1:wdk").await[0].lead_minutes, 1);
    }

    #[tokio::test]
    async fn rescheduling_replaces_jobs_by_key() {
        let scheduler = ReminderScheduler::new();
        let now = Utc::now();
        let t = timer("g1", "wdk", now + Duration::hours(1));

        scheduler.schedule(&t, &[3], now).await;
        let moved = timer("g1", "wdk", now + Duration::hours(2));
        scheduler.schedule(&moved, &[3], now).await;

        let jobs = scheduler.jobs_for("g:g1:wdk").await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].fire_at, moved.spawn_time - Duration::minutes(3));
    }

    #[tokio::test]
    async fn cancel_all_removes_only_that_timer() {
        let scheduler = ReminderScheduler::new();
        let now = Utc::now();
        scheduler
            .schedule(&timer("g1", "wdk", now + Duration::hours(1)), &[3, 1], now)
            .await;
        scheduler
            .schedule(&timer("g2", "wdk", now + Duration::hours(1)), &[3], now)
            .await;

        assert_eq!(scheduler.cancel_all("g:g1:wdk").await, 2);
        assert_eq!(scheduler.cancel_all("g:g1:wdk").await, 0);
        assert_eq!(scheduler.pending_count().await, 1);
    }

    #[tokio::test]
    async fn take_due_jobs_drains_only_due_ones() {
        let scheduler = ReminderScheduler::new();
        let now = Utc::now();
        scheduler
            .schedule(&timer("g1", "wdk", now + Duration::minutes(5)), &[3], now)
            .await;
        scheduler
            .schedule(&timer("g2", "bmm", now + Duration::hours(1)), &[3], now)
            .await;

        let due = scheduler.take_due_jobs(now + Duration::minutes(2)).await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].timer_id, "g:g1:wdk");
        // Taken jobs are gone: firing is at-most-once.
        assert_eq!(scheduler.pending_count().await, 1);
        assert!(scheduler.take_due_jobs(now + Duration::minutes(2)).await.is_empty());
    }

    #[tokio::test]
    async fn sleep_duration_is_clamped() {
        let scheduler = ReminderScheduler::new();
        let now = Utc::now();

        // No jobs: maximum sleep.
        assert_eq!(
            scheduler.calculate_sleep_duration(now).await,
            std::time::Duration::from_secs(MAX_SLEEP_SECS)
        );

        // Imminent job: minimum sleep.
        scheduler
            .schedule(&timer("g1", "wdk", now + Duration::minutes(3) + Duration::seconds(1)), &[3], now)
            .await;
        assert_eq!(
            scheduler.calculate_sleep_duration(now).await,
            std::time::Duration::from_secs(MIN_SLEEP_SECS)
        );

        // Distant job: capped at maximum.
        scheduler.cancel_everything().await;
        scheduler
            .schedule(&timer("g1", "wdk", now + Duration::hours(5)), &[3], now)
            .await;
        assert_eq!(
            scheduler.calculate_sleep_duration(now).await,
            std::time::Duration::from_secs(MAX_SLEEP_SECS)
        );
    }

    #[tokio::test]
    async fn restore_prunes_expired_and_schedules_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        let now = Utc::now();

        let mut store = TimerStore::load(&path, Shanghai);
        store.upsert(timer("g1", "wdk", now - Duration::minutes(1)));
        store.upsert(timer("g1", "bmm", now + Duration::hours(1)));
        store.upsert(timer("g2", "uk", now + Duration::minutes(2)));

        let scheduler = ReminderScheduler::new();
        let outcome = scheduler.restore_all(&mut store, &[3], now).await;

        // Expired wdk pruned; bmm scheduled; uk valid but its only lead has
        // passed, so it stays in the store with zero jobs.
        assert_eq!(outcome.pruned, 1);
        assert_eq!(outcome.timers_restored, 1);
        assert_eq!(outcome.jobs_scheduled, 1);
        assert!(store.get("g:g1:wdk").is_none());
        assert!(store.get("g:g2:uk").is_some());
        assert_eq!(scheduler.jobs_for("g:g1:bmm").await.len(), 1);
        assert!(scheduler.jobs_for("g:g2:uk").await.is_empty());
    }

    #[tokio::test]
    async fn restore_after_cancel_produces_no_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        let now = Utc::now();

        let mut store = TimerStore::load(&path, Shanghai);
        store.upsert(timer("g1", "wdk", now + Duration::hours(1)));

        let scheduler = ReminderScheduler::new();
        scheduler.restore_all(&mut store, &[3], now).await;
        scheduler.cancel_all("g:g1:wdk").await;
        store.delete("g:g1:wdk");

        let outcome = scheduler.restore_all(&mut store, &[3], now).await;
        assert_eq!(outcome.jobs_scheduled, 0);
        assert!(scheduler.jobs_for("g:g1:wdk").await.is_empty());
    }

    #[tokio::test]
    async fn run_loop_delivers_due_jobs_and_stops_on_shutdown() {
        let scheduler = ReminderScheduler::new();
        let now = Utc::now();
        scheduler
            .schedule(
                &timer("g1", "wdk", now + Duration::minutes(3) + Duration::seconds(1)),
                &[3],
                now,
            )
            .await;
        // Backdate the job so it is due on the loop's first pass.
        {
            let mut jobs = scheduler.jobs.write().await;
            jobs[0].fire_at = now - Duration::seconds(1);
        }

        let (delivered_tx, mut delivered_rx) = tokio::sync::mpsc::unbounded_channel();
        let sink: ReminderSink = Box::new(move |reminder| {
            let tx = delivered_tx.clone();
            Box::pin(async move {
                tx.send(reminder).map_err(|e| e.to_string())?;
                Ok(())
            })
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = scheduler.clone();
        let handle = tokio::spawn(async move { runner.run(shutdown_rx, sink).await });

        let delivered = tokio::time::timeout(std::time::Duration::from_secs(5), delivered_rx.recv())
            .await
            .expect("reminder was not delivered in time")
            .expect("sink channel closed");
        assert_eq!(delivered.entity_id, "wdk");
        assert_eq!(delivered.lead_minutes, 3);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not shut down")
            .unwrap();
        assert_eq!(scheduler.pending_count().await, 0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Exactly the future leads get scheduled, no matter the mix.
            #[test]
            fn scheduled_count_matches_future_leads(
                spawn_offset_mins in 0i64..240,
                leads in proptest::collection::vec(0i64..240, 1..8)
            ) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                rt.block_on(async {
                    let scheduler = ReminderScheduler::new();
                    let now = Utc::now();
                    let t = timer("g1", "wdk", now + Duration::minutes(spawn_offset_mins));

                    // Deduplicate: same-key leads replace each other.
                    let mut unique = leads.clone();
                    unique.sort_unstable();
                    unique.dedup();

                    let expected = unique
                        .iter()
                        .filter(|&&lead| spawn_offset_mins - lead > 0)
                        .count();
                    scheduler.schedule(&t, &unique, now).await;
                    prop_assert_eq!(scheduler.pending_count().await, expected);
                    Ok(())
                })?;
            }

            // Cancel after schedule always leaves zero jobs for that timer.
            #[test]
            fn cancel_is_total_per_timer(
                leads in proptest::collection::vec(1i64..60, 1..6)
            ) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                rt.block_on(async {
                    let scheduler = ReminderScheduler::new();
                    let now = Utc::now();
                    let t = timer("g1", "wdk", now + Duration::hours(2));
                    scheduler.schedule(&t, &leads, now).await;
                    scheduler.cancel_all(&t.id).await;
                    prop_assert!(scheduler.jobs_for(&t.id).await.is_empty());
                    Ok(())
                })?;
            }
        }
    }
}
