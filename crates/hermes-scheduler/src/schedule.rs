//! Schedule evaluation.
//!
//! Cron expressions are evaluated in local time via the `cron` crate.
//! DST convention: occurrences that fall into a spring-forward gap are
//! skipped (no make-up run); after a fall-back overlap the first local
//! occurrence wins. Combined with [`next_occurrence`] being strict
//! (`> after`), the same instant can never fire twice.

use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use tracing::warn;

use crate::error::{Result, SchedulerError};
use crate::types::Schedule;

/// Compute the next execution time strictly after `after`.
///
/// Returns `None` when the schedule is exhausted (a `Once` whose instant
/// has passed) or the expression is malformed.
pub fn next_occurrence(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => {
            if *at > after {
                Some(*at)
            } else {
                None
            }
        }
        Schedule::Cron { expression } => {
            let parsed = match parse_cron(expression) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(expression = %expression, error = %e, "bad cron expression");
                    return None;
                }
            };
            let local_after = after.with_timezone(&Local);
            parsed
                .after(&local_after)
                .next()
                .map(|dt| dt.with_timezone(&Utc))
        }
    }
}

/// Validate a schedule without evaluating it.
pub fn validate(schedule: &Schedule) -> Result<()> {
    if let Schedule::Cron { expression } = schedule {
        parse_cron(expression)?;
    }
    Ok(())
}

/// Parse a cron expression, accepting the standard 5-field form.
///
/// The `cron` crate wants a seconds column; a 5-field expression gets
/// `0 ` prefixed so it fires at second zero. Six- and seven-field inputs
/// pass through unchanged.
fn parse_cron(expression: &str) -> Result<cron::Schedule> {
    let fields = expression.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    };
    cron::Schedule::from_str(&normalized)
        .map_err(|e| SchedulerError::InvalidSchedule(format!("{expression}: {e}")))
}
