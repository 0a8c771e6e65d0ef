//! `hermes-scheduler` — cron jobs for the gateway.
//!
//! # Overview
//!
//! Jobs persist in the `cron/jobs.json` array. [`CronEngine::tick`]
//! executes everything due (each job as a fresh isolated agent session)
//! and pipes the markdown-enveloped output through the delivery router.
//! [`CronEngine::run_daemon`] loops tick/sleep until shutdown.
//!
//! # Schedule variants
//!
//! | Variant | Behaviour                                           |
//! |---------|-----------------------------------------------------|
//! | `Cron`  | 5-field cron expression, evaluated in local time    |
//! | `Once`  | Single fire at an absolute instant                  |

pub mod engine;
pub mod error;
pub mod schedule;
pub mod store;
pub mod types;

pub use engine::CronEngine;
pub use error::{Result, SchedulerError};
pub use schedule::{next_occurrence, validate};
pub use store::JobStore;
pub use types::{Job, Schedule};
