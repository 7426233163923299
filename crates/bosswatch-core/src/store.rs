//! Snapshot-backed timer store.
//!
//! Single source of truth for active timers. The whole map round-trips to one
//! JSON file; every mutation path rewrites the full snapshot. Times are
//! persisted zone-naive in the configured zone (the format the deployed
//! snapshots already use) and re-attached on load.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::types::{Scope, Timer};

const SNAPSHOT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// On-disk shape of one timer, keyed externally by timer id.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTimer {
    boss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    death_time: Option<String>,
    spawn_time: String,
    umo: String,
    group_id: Option<String>,
    user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

/// Durable mapping from timer id to timer record.
#[derive(Debug)]
pub struct TimerStore {
    path: PathBuf,
    tz: Tz,
    timers: HashMap<String, Timer>,
}

impl TimerStore {
    /// Open a store backed by `path`, loading any existing snapshot.
    ///
    /// A missing file starts empty; an unreadable or malformed one is logged
    /// and also starts empty, since in-memory state is authoritative anyway.
    pub fn load(path: &Path, tz: Tz) -> Self {
        let mut store = Self {
            path: path.to_path_buf(),
            tz,
            timers: HashMap::new(),
        };

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return store,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read timer snapshot, starting empty");
                return store;
            }
        };

        let parsed: HashMap<String, StoredTimer> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(path = %path.display(), error = %e, "timer snapshot is not valid JSON, starting empty");
                return store;
            }
        };

        for (id, stored) in parsed {
            match store.revive(&id, stored) {
                Some(timer) => {
                    store.timers.insert(id, timer);
                }
                None => warn!(timer_id = %id, "dropping malformed snapshot entry"),
            }
        }

        info!(path = %path.display(), timers = store.timers.len(), "loaded timer snapshot");
        store
    }

    /// Rebuild a [`Timer`] from its stored form. None when essential fields
    /// do not parse.
    fn revive(&self, id: &str, stored: StoredTimer) -> Option<Timer> {
        let spawn_time = self.parse_naive(&stored.spawn_time)?;
        let scope = match (stored.group_id, stored.user_id) {
            (Some(group_id), _) => Scope::Group { group_id },
            (None, Some(user_id)) => Scope::Private { user_id },
            (None, None) => return None,
        };
        let death_time = stored.death_time.as_deref().and_then(|s| self.parse_naive(s));
        let created_at = stored
            .created_at
            .as_deref()
            .and_then(|s| self.parse_naive(s))
            .unwrap_or(spawn_time);

        Some(Timer {
            id: id.to_string(),
            entity_id: stored.boss,
            death_time,
            spawn_time,
            scope,
            destination: stored.umo,
            created_at,
        })
    }

    pub fn get(&self, timer_id: &str) -> Option<&Timer> {
        self.timers.get(timer_id)
    }

    /// Insert or replace a timer under its own id.
    pub fn upsert(&mut self, timer: Timer) {
        self.timers.insert(timer.id.clone(), timer);
    }

    /// Remove a timer, returning it if present.
    pub fn delete(&mut self, timer_id: &str) -> Option<Timer> {
        self.timers.remove(timer_id)
    }

    /// All timers, in no meaningful order; consumers sort by spawn time.
    pub fn all(&self) -> impl Iterator<Item = &Timer> {
        self.timers.values()
    }

    /// Remove every timer, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.timers.len();
        self.timers.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the full snapshot. Pure in-memory work, so callers may hand
    /// the result to a blocking writer without holding any lock.
    pub fn snapshot_json(&self) -> Result<String, StoreError> {
        let snapshot: HashMap<&str, StoredTimer> = self
            .timers
            .values()
            .map(|timer| (timer.id.as_str(), self.freeze(timer)))
            .collect();
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Write a serialized snapshot atomically (temp file + rename).
    pub fn write_snapshot(path: &Path, json: &str) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Serialize and write the full snapshot in one call.
    pub fn save(&self) -> Result<(), StoreError> {
        Self::write_snapshot(&self.path, &self.snapshot_json()?)
    }

    fn freeze(&self, timer: &Timer) -> StoredTimer {
        StoredTimer {
            boss: timer.entity_id.clone(),
            death_time: timer.death_time.map(|dt| self.format_naive(dt)),
            spawn_time: self.format_naive(timer.spawn_time),
            umo: timer.destination.clone(),
            group_id: timer.scope.group_id().map(String::from),
            user_id: timer.scope.user_id().map(String::from),
            created_at: Some(self.format_naive(timer.created_at)),
        }
    }

    fn format_naive(&self, dt: DateTime<Utc>) -> String {
        dt.with_timezone(&self.tz)
            .naive_local()
            .format(SNAPSHOT_TIME_FORMAT)
            .to_string()
    }

    fn parse_naive(&self, s: &str) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(s, SNAPSHOT_TIME_FORMAT).ok()?;
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
