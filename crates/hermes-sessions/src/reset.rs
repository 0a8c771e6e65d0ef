//! Reset policy engine.
//!
//! Decides whether a session has gone stale and must be replaced before
//! the next turn. Pure functions over timestamps; the store applies the
//! decision. Explicit reset commands (`/new`, `/reset`) bypass this module
//! entirely.

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};

use hermes_core::{ResetMode, ResetPolicy};

/// Should the session be reset before handling an event at `now`?
///
/// - `idle`: at least `idle_minutes` have passed since the last activity.
/// - `daily`: `last_activity` and `now` fall on different "cron days",
///   where a cron day starts at `reset_hour` local time.
/// - `both`: either condition.
pub fn should_reset(policy: &ResetPolicy, last_activity: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    should_reset_in_tz(
        policy,
        last_activity.with_timezone(&Local),
        now.with_timezone(&Local),
    )
}

/// Timezone-explicit variant of [`should_reset`]; the daily boundary is
/// evaluated in the timezone of the arguments.
pub fn should_reset_in_tz<Tz: TimeZone>(
    policy: &ResetPolicy,
    last_activity: DateTime<Tz>,
    now: DateTime<Tz>,
) -> bool {
    if now <= last_activity {
        return false;
    }
    let idle = now.clone() - last_activity.clone()
        >= Duration::minutes(i64::from(policy.idle_minutes));
    let daily = crosses_daily_boundary(&last_activity, &now, policy.reset_hour);
    match policy.mode {
        ResetMode::Idle => idle,
        ResetMode::Daily => daily,
        ResetMode::Both => idle || daily,
    }
}

/// True when the wall-clock interval `[last, now]` crosses an occurrence of
/// `reset_hour`.
///
/// A "cron day" runs from `reset_hour` to the next `reset_hour`; shifting
/// both timestamps back by `reset_hour` hours and comparing calendar dates
/// implements exactly that. An event at `reset_hour` sharp belongs to the
/// new day, so it resets against any activity before the boundary.
fn crosses_daily_boundary<Tz: TimeZone>(
    last: &DateTime<Tz>,
    now: &DateTime<Tz>,
    reset_hour: u8,
) -> bool {
    cron_day(last, reset_hour) != cron_day(now, reset_hour)
}

fn cron_day<Tz: TimeZone>(ts: &DateTime<Tz>, reset_hour: u8) -> NaiveDate {
    (ts.clone() - Duration::hours(i64::from(reset_hour))).date_naive()
}
