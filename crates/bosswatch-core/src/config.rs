//! Bot configuration surface.
//!
//! The config is owned externally (platform plugin settings); this crate only
//! deserializes a snapshot of it. Every field has a default so a partial or
//! missing file still yields a working bot.

use std::path::Path;

use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{info, warn};

/// Default reminder lead time in minutes.
const DEFAULT_REMINDER_INTERVALS: [i64; 1] = [3];

/// Fallback zone when the configured one does not parse.
const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Shanghai;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// When false, every group may register timers.
    pub whitelist_enabled: bool,
    /// Set 1 membership.
    pub whitelist_groups: Vec<String>,
    /// Set 1 core groups (cross-group visibility within the set).
    pub core_groups: Vec<String>,
    /// Set 2 membership.
    pub whitelist_groups_2: Vec<String>,
    /// Set 2 core groups.
    pub core_groups_2: Vec<String>,
    /// Users allowed in private chat. Empty means private chat is disabled.
    pub whitelist_users: Vec<String>,
    pub group_boss_filter_enabled: bool,
    /// JSON-string-encoded map of group id -> allowed canonical entity ids.
    pub group_boss_filters: String,
    /// Comma-separated reminder lead times in minutes.
    pub reminder_intervals: String,
    /// Primary IANA zone user times are interpreted and rendered in.
    pub timezone: String,
    /// Optional second zone appended to rendered times.
    pub secondary_timezone: String,
    pub show_secondary_timezone: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            whitelist_enabled: false,
            whitelist_groups: Vec::new(),
            core_groups: Vec::new(),
            whitelist_groups_2: Vec::new(),
            core_groups_2: Vec::new(),
            whitelist_users: Vec::new(),
            group_boss_filter_enabled: false,
            group_boss_filters: "{}".to_string(),
            reminder_intervals: "3".to_string(),
            timezone: "Asia/Shanghai".to_string(),
            secondary_timezone: "America/Toronto".to_string(),
            show_secondary_timezone: true,
        }
    }
}

impl BotConfig {
    /// Load config from a JSON file, falling back to defaults on any failure.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config not readable, using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(config) => {
                info!(path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config is not valid JSON, using defaults");
                Self::default()
            }
        }
    }

    /// Reminder lead times in minutes.
    ///
    /// Any unparseable entry invalidates the whole list and falls back to the
    /// default, matching the behavior users already rely on.
    pub fn intervals(&self) -> Vec<i64> {
        let parsed: Result<Vec<i64>, _> = self
            .reminder_intervals
            .split(',')
            .map(|part| part.trim().parse::<i64>())
            .collect();
        match parsed {
            Ok(intervals) if !intervals.is_empty() => intervals,
            _ => {
                warn!(
                    reminder_intervals = %self.reminder_intervals,
                    "invalid reminder_intervals, using default"
                );
                DEFAULT_REMINDER_INTERVALS.to_vec()
            }
        }
    }

    /// Primary zone, falling back to the default regional zone.
    pub fn tz(&self) -> Tz {
        match self.timezone.parse() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(timezone = %self.timezone, "invalid timezone, using default");
                DEFAULT_TIMEZONE
            }
        }
    }

    /// Secondary display zone, if configured, valid, and enabled.
    pub fn secondary_tz(&self) -> Option<Tz> {
        if !self.show_secondary_timezone || self.secondary_timezone.is_empty() {
            return None;
        }
        match self.secondary_timezone.parse() {
            Ok(tz) => Some(tz),
            Err(_) => {
                warn!(timezone = %self.secondary_timezone, "invalid secondary timezone, disabling");
                None
            }
        }
    }
}
