use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{Result, SchedulerError};
use crate::schedule::next_occurrence;
use crate::types::Job;

/// Durable job store backed by the `cron/jobs.json` array.
///
/// The whole array is rewritten on every mutation (temp file + rename);
/// job counts are small and the simplicity buys crash safety.
pub struct JobStore {
    path: PathBuf,
    jobs: Mutex<Vec<Job>>,
}

impl JobStore {
    /// Open the store, loading existing jobs when the file is present.
    pub fn open(path: PathBuf) -> Result<Self> {
        let jobs = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            jobs: Mutex::new(jobs),
        })
    }

    /// Add a job and persist. Returns the stored record.
    pub fn add(&self, job: Job) -> Result<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.push(job.clone());
        self.persist(&jobs)?;
        info!(job_id = %job.id, name = %job.name, "job added");
        Ok(job)
    }

    /// Remove a job by ID.
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|j| j.id != id);
        if jobs.len() == before {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        self.persist(&jobs)?;
        info!(job_id = %id, "job removed");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned()
    }

    /// All jobs, or only enabled ones, ordered by creation time.
    pub fn list(&self, include_disabled: bool) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| include_disabled || j.enabled)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Jobs whose `next_run_at` has arrived.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<Job> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.is_due(now))
            .cloned()
            .collect()
    }

    /// Record one execution of a job.
    ///
    /// Sets `last_run_at`, advances `next_run_at` strictly past `now`
    /// (never into the past), decrements `remaining` when bounded and
    /// disables the job at zero, then persists.
    pub fn mark_run(
        &self,
        id: &str,
        success: bool,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })?;

        job.last_run_at = Some(now);
        job.last_error = if success { None } else { error.map(String::from) };
        job.run_count += 1;
        job.updated_at = now;

        if let Some(remaining) = job.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                job.enabled = false;
            }
        }

        job.next_run_at = if job.enabled {
            next_occurrence(&job.schedule, now)
        } else {
            None
        };
        if job.next_run_at.is_none() {
            job.enabled = false;
        }

        let updated = job.clone();
        debug!(job_id = %id, next_run = ?updated.next_run_at, enabled = updated.enabled,
               "job run recorded");
        self.persist(&jobs)?;
        Ok(updated)
    }

    fn persist(&self, jobs: &[Job]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(jobs)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Schedule;
    use chrono::Duration;

    fn store() -> (tempfile::TempDir, JobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::open(dir.path().join("jobs.json")).unwrap();
        (dir, store)
    }

    fn cron_job(name: &str) -> Job {
        Job::new(
            name,
            "prompt",
            Schedule::Cron {
                expression: "*/5 * * * *".to_string(),
            },
            vec!["local".to_string()],
        )
    }

    #[test]
    fn add_list_remove_roundtrip() {
        let (dir, store) = store();
        let job = store.add(cron_job("a")).unwrap();
        store.add(cron_job("b")).unwrap();
        assert_eq!(store.list(true).len(), 2);

        store.remove(&job.id).unwrap();
        assert_eq!(store.list(true).len(), 1);
        assert!(matches!(
            store.remove("missing"),
            Err(SchedulerError::JobNotFound { .. })
        ));

        // A fresh store sees the persisted state.
        let reopened = JobStore::open(dir.path().join("jobs.json")).unwrap();
        assert_eq!(reopened.list(true).len(), 1);
    }

    #[test]
    fn mark_run_advances_next_run_strictly() {
        let (_dir, store) = store();
        let job = store.add(cron_job("recurring")).unwrap();
        let first_next = job.next_run_at.unwrap();

        let updated = store.mark_run(&job.id, true, None, first_next).unwrap();
        let second_next = updated.next_run_at.unwrap();
        assert!(second_next > first_next, "next_run_at must move forward");
        assert_eq!(updated.run_count, 1);
        assert!(updated.enabled);
    }

    #[test]
    fn bounded_job_disables_at_zero_remaining() {
        let (_dir, store) = store();
        let job = store
            .add(cron_job("bounded").with_repeat_count(1))
            .unwrap();

        let updated = store.mark_run(&job.id, true, None, Utc::now()).unwrap();
        assert_eq!(updated.remaining, Some(0));
        assert!(!updated.enabled);
        assert_eq!(updated.next_run_at, None);
        assert!(!updated.is_due(Utc::now() + Duration::hours(1)));
    }

    #[test]
    fn failed_run_records_error() {
        let (_dir, store) = store();
        let job = store.add(cron_job("failing")).unwrap();
        let updated = store
            .mark_run(&job.id, false, Some("agent exploded"), Utc::now())
            .unwrap();
        assert_eq!(updated.last_error.as_deref(), Some("agent exploded"));
        assert!(updated.last_run_at.is_some());
    }

    #[test]
    fn due_jobs_excludes_disabled_and_future() {
        let (_dir, store) = store();
        let mut due = cron_job("due");
        due.next_run_at = Some(Utc::now() - Duration::seconds(1));
        let due = store.add(due).unwrap();

        let mut future = cron_job("future");
        future.next_run_at = Some(Utc::now() + Duration::hours(1));
        store.add(future).unwrap();

        let mut disabled = cron_job("disabled");
        disabled.next_run_at = Some(Utc::now() - Duration::seconds(1));
        disabled.enabled = false;
        store.add(disabled).unwrap();

        let found = store.due_jobs(Utc::now());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
    }

    #[test]
    fn list_hides_disabled_by_default() {
        let (_dir, store) = store();
        store.add(cron_job("on")).unwrap();
        let mut off = cron_job("off");
        off.enabled = false;
        store.add(off).unwrap();

        assert_eq!(store.list(false).len(), 1);
        assert_eq!(store.list(true).len(), 2);
    }
}
