use thiserror::Error;

/// Errors that can occur within the cron subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The schedule expression could not be parsed.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// No job with the given ID exists in the store.
    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    /// Reading or writing `cron/jobs.json` failed.
    #[error("Job store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
