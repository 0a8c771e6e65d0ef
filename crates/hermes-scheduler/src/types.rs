use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schedule::next_occurrence;

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Standard 5-field cron expression (`minute hour dom month dow`),
    /// evaluated in local time.
    Cron { expression: String },

    /// Fire exactly once at the given instant.
    Once { at: DateTime<Utc> },
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Cron { expression } => write!(f, "cron {expression}"),
            Schedule::Once { at } => write!(f, "once {}", at.to_rfc3339()),
        }
    }
}

/// A persisted cron job.
///
/// Stored as one element of the `cron/jobs.json` array. `next_run_at` is
/// `None` only when the schedule is exhausted (a fired one-shot, or
/// `remaining` hitting zero); [`crate::store::JobStore::mark_run`] never
/// advances it into the past.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    /// Prompt handed to the agent engine in a fresh isolated session.
    pub prompt: String,
    pub schedule: Schedule,
    /// Delivery target specs (`origin`, `local`, `telegram:123`, …).
    #[serde(default = "default_deliver")]
    pub deliver: Vec<String>,
    /// Total runs requested, when bounded.
    pub repeat_count: Option<u32>,
    /// Runs left, when bounded. The job is disabled once this reaches 0.
    pub remaining: Option<u32>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Error message of the most recent failed run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub run_count: u32,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// New enabled job with `next_run_at` computed from the schedule.
    pub fn new(
        name: impl Into<String>,
        prompt: impl Into<String>,
        schedule: Schedule,
        deliver: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        let next = next_occurrence(&schedule, now);
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            prompt: prompt.into(),
            schedule,
            deliver: if deliver.is_empty() {
                default_deliver()
            } else {
                deliver
            },
            repeat_count: None,
            remaining: None,
            next_run_at: next,
            last_run_at: None,
            last_error: None,
            run_count: 0,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bound the job to `count` total runs.
    pub fn with_repeat_count(mut self, count: u32) -> Self {
        self.repeat_count = Some(count);
        self.remaining = Some(count);
        self
    }

    /// Due = enabled with a `next_run_at` at or before `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self
                .next_run_at
                .map(|next| next <= now)
                .unwrap_or(false)
    }
}

fn default_deliver() -> Vec<String> {
    vec!["origin".to_string()]
}

fn bool_true() -> bool {
    true
}
