//! Reminder scheduler for bosswatch.
//!
//! Owns the set of pending one-shot reminder jobs derived from active timers:
//! - Schedules N reminders per timer at configured lead times
//! - Cancels every job belonging to a timer in one call
//! - Restores schedules from the timer store after a restart, pruning
//!   already-expired timers
//! - Runs a single delivery loop; jobs fire at most once and are never
//!   re-armed

mod scheduler;
mod types;

pub use scheduler::{ReminderScheduler, RestoreOutcome};
pub use types::{Reminder, ReminderJob, ReminderSink};
