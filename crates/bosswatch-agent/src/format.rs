//! User-facing message formatting.
//!
//! Times render in the primary zone, optionally followed by a second zone for
//! players living elsewhere. Display names come from the catalog (emoji
//! prefix included).

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use bosswatch_core::{EntityCatalog, Timer};

const DATE_TIME_FORMAT: &str = "%m-%d %H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Format an instant in the primary zone, with the secondary zone appended
/// when configured.
pub fn format_time(dt: DateTime<Utc>, tz: Tz, secondary: Option<Tz>, show_date: bool) -> String {
    let pattern = if show_date { DATE_TIME_FORMAT } else { TIME_FORMAT };
    let primary = dt.with_timezone(&tz).format(pattern).to_string();
    match secondary {
        Some(secondary_tz) => {
            let secondary = dt.with_timezone(&secondary_tz).format(pattern).to_string();
            format!("{} | {}", primary, secondary)
        }
        None => primary,
    }
}

/// Confirmation after a death report.
pub fn spawn_recorded(display_name: &str, spawn_time: DateTime<Utc>, tz: Tz, secondary: Option<Tz>) -> String {
    format!(
        "Next {}: {}",
        display_name,
        format_time(spawn_time, tz, secondary, true)
    )
}

/// Confirmation after a manual timer add.
pub fn timer_added(display_name: &str, spawn_time: DateTime<Utc>, tz: Tz, secondary: Option<Tz>) -> String {
    format!(
        "Timer added for {}\nSpawns at: {}",
        display_name,
        format_time(spawn_time, tz, secondary, true)
    )
}

/// The reminder sent before a spawn.
pub fn reminder(
    display_name: &str,
    spawn_time: DateTime<Utc>,
    lead_minutes: i64,
    tz: Tz,
    secondary: Option<Tz>,
) -> String {
    format!(
        "{} spawns in about {} min, at [{}]",
        display_name,
        lead_minutes,
        format_time(spawn_time, tz, secondary, false)
    )
}

/// A listing of active timers, assumed already sorted by spawn time.
pub fn timer_list(timers: &[Timer], catalog: &EntityCatalog, tz: Tz, secondary: Option<Tz>) -> String {
    if timers.is_empty() {
        return "No active boss timers".to_string();
    }

    let mut lines = vec!["Active boss timers:".to_string()];
    for timer in timers {
        lines.push(format!(
            "{}: {}",
            catalog.display(&timer.entity_id),
            format_time(timer.spawn_time, tz, secondary, true)
        ));
    }
    lines.join("\n")
}
