//! Resolution of user-supplied time fragments into absolute instants.
//!
//! Fragments are interpreted in a configured IANA zone; everything the rest
//! of the system sees is UTC. Two resolution modes exist: relative (recording
//! a death that already happened, so "today" is taken literally even when the
//! result is in the past) and absolute (a future spawn time, rolling forward
//! to tomorrow or next year when the literal reading has passed).

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::TimeError;

/// Resolve a death-time fragment relative to `now`.
///
/// Accepted forms:
/// - empty: `now` itself
/// - bare `0..=59` integer: `now` with the minute replaced, seconds zeroed
/// - `HH:MM[:SS]`: today at that time, even if already past
pub fn resolve_relative(fragment: &str, now: DateTime<Utc>, tz: Tz) -> Result<DateTime<Utc>, TimeError> {
    let fragment = normalize(fragment);
    if fragment.is_empty() {
        return Ok(now);
    }

    let local = now.with_timezone(&tz).naive_local();

    if fragment.chars().all(|c| c.is_ascii_digit()) {
        let minute: u32 = fragment
            .parse()
            .map_err(|_| TimeError::FormatInvalid(fragment.clone()))?;
        if minute >= 60 {
            return Err(TimeError::FormatInvalid(fragment));
        }
        let naive = local
            .with_minute(minute)
            .and_then(|dt| dt.with_second(0))
            .and_then(|dt| dt.with_nanosecond(0))
            .ok_or_else(|| TimeError::FormatInvalid(fragment.clone()))?;
        return local_to_utc(tz, naive).ok_or(TimeError::FormatInvalid(fragment));
    }

    let (hour, minute, second) = parse_hms(&fragment)?;
    let naive = local
        .date()
        .and_hms_opt(hour, minute, second)
        .ok_or_else(|| TimeError::FormatInvalid(fragment.clone()))?;
    local_to_utc(tz, naive).ok_or(TimeError::FormatInvalid(fragment))
}

/// Resolve a manually specified spawn-time fragment.
///
/// Accepted forms:
/// - `HH:MM[:SS]`: today, or tomorrow if the instant has already passed
/// - `MM-DD HH:MM[:SS]`: this year, or next year if the instant has passed
///
/// Callers additionally reject results that are still not in the future.
pub fn resolve_absolute(fragment: &str, now: DateTime<Utc>, tz: Tz) -> Result<DateTime<Utc>, TimeError> {
    let fragment = normalize(fragment);
    if fragment.is_empty() {
        return Err(TimeError::FormatInvalid(fragment));
    }

    let local_now = now.with_timezone(&tz).naive_local();

    if let Some((date_part, time_part)) = split_once_whitespace(&fragment) {
        let (month, day) = parse_month_day(date_part).ok_or_else(|| TimeError::FormatInvalid(fragment.clone()))?;
        let (hour, minute, second) = parse_hms(time_part)?;

        // The date must exist in the current year; only an instant that has
        // already passed rolls to next year.
        let this_year = naive_at(local_now.year(), month, day, hour, minute, second)
            .and_then(|n| local_to_utc(tz, n))
            .ok_or_else(|| TimeError::FormatInvalid(fragment.clone()))?;
        if this_year > now {
            Ok(this_year)
        } else {
            naive_at(local_now.year() + 1, month, day, hour, minute, second)
                .and_then(|n| local_to_utc(tz, n))
                .ok_or(TimeError::FormatInvalid(fragment))
        }
    } else {
        let (hour, minute, second) = parse_hms(&fragment)?;
        let today = local_now
            .date()
            .and_hms_opt(hour, minute, second)
            .ok_or_else(|| TimeError::FormatInvalid(fragment.clone()))?;
        let instant = local_to_utc(tz, today).ok_or_else(|| TimeError::FormatInvalid(fragment.clone()))?;
        if instant > now {
            Ok(instant)
        } else {
            local_to_utc(tz, today + chrono::Duration::days(1)).ok_or(TimeError::FormatInvalid(fragment))
        }
    }
}

/// Trim and replace the full-width colon variant users paste from IMEs.
fn normalize(fragment: &str) -> String {
    fragment.trim().replace('：', ":")
}

fn split_once_whitespace(s: &str) -> Option<(&str, &str)> {
    let idx = s.find(char::is_whitespace)?;
    Some((&s[..idx], s[idx..].trim_start()))
}

/// Parse `HH:MM` or `HH:MM:SS` with field range validation.
fn parse_hms(s: &str) -> Result<(u32, u32, u32), TimeError> {
    let invalid = || TimeError::FormatInvalid(s.to_string());
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return Err(invalid());
    }

    let mut fields = [0u32; 3];
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        fields[i] = part.parse().map_err(|_| invalid())?;
    }

    let (hour, minute, second) = (fields[0], fields[1], fields[2]);
    if hour >= 24 || minute >= 60 || second >= 60 {
        return Err(invalid());
    }
    Ok((hour, minute, second))
}

/// Parse `MM-DD` without calendar validation (done against the year later).
fn parse_month_day(s: &str) -> Option<(u32, u32)> {
    let (month, day) = s.split_once('-')?;
    if month.is_empty() || month.len() > 2 || day.is_empty() || day.len() > 2 {
        return None;
    }
    Some((month.parse().ok()?, day.parse().ok()?))
}

fn naive_at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Interpret a zone-local naive time as a UTC instant.
///
/// Ambiguous local times (DST fold) take the earlier reading; nonexistent
/// ones (DST gap) resolve to None and surface as a format error.
fn local_to_utc(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
