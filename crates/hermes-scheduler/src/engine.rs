use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info};

use hermes_channels::{DeliveryMeta, DeliveryRouter, OutboundPayload};
use hermes_core::AgentEngine;

use crate::error::Result;
use crate::store::JobStore;
use crate::types::Job;

/// Executes due jobs and routes their output.
///
/// Each job runs as an isolated agent conversation (fresh session, no
/// prior history); the result is wrapped in a markdown envelope and fanned
/// out through the delivery router. An error in one job never affects the
/// others; the tick loop logs and continues.
pub struct CronEngine {
    store: Arc<JobStore>,
    agent: Arc<dyn AgentEngine>,
    router: Arc<DeliveryRouter>,
}

impl CronEngine {
    pub fn new(store: Arc<JobStore>, agent: Arc<dyn AgentEngine>, router: Arc<DeliveryRouter>) -> Self {
        Self {
            store,
            agent,
            router,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Run every due job once. Returns the number of jobs executed.
    pub async fn tick(&self) -> Result<usize> {
        let now = Utc::now();
        let due = self.store.due_jobs(now);
        if due.is_empty() {
            debug!("no jobs due");
            return Ok(0);
        }
        info!(count = due.len(), "jobs due");

        let mut executed = 0;
        for job in due {
            let (success, output, error) = self.run_job(&job).await;

            let targets = self.router.resolve_targets(&job.deliver, None);
            let payload = OutboundPayload::from_response(&output);
            let meta = DeliveryMeta {
                job_id: Some(job.id.clone()),
                job_name: Some(job.name.clone()),
                metadata: vec![("Schedule".to_string(), job.schedule.to_string())],
            };
            let results = self.router.deliver(&payload, &targets, &meta).await;
            for (target, result) in &results {
                if !result.success {
                    error!(job_id = %job.id, target = %target,
                           error = result.error.as_deref().unwrap_or("unknown"),
                           "job delivery failed");
                }
            }

            if let Err(e) = self
                .store
                .mark_run(&job.id, success, error.as_deref(), Utc::now())
            {
                error!(job_id = %job.id, error = %e, "failed to record job run");
            }
            executed += 1;
        }
        Ok(executed)
    }

    /// Tick on a fixed cadence until `shutdown` flips to `true`.
    ///
    /// The first tick fires immediately, so jobs overdue at startup run
    /// without waiting a full interval.
    pub async fn run_daemon(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "cron daemon started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "cron tick error");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("cron daemon shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run one job in a fresh session and build the markdown envelope.
    ///
    /// Returns `(success, envelope, error_message)`.
    async fn run_job(&self, job: &Job) -> (bool, String, Option<String>) {
        let session_id = format!(
            "cron_{}_{}",
            job.id,
            Local::now().format("%Y%m%d_%H%M%S")
        );
        info!(job_id = %job.id, name = %job.name, session = %session_id, "running job");

        match self
            .agent
            .run_conversation(&job.prompt, &session_id, &[], None)
            .await
        {
            Ok(response) => {
                let text = if response.final_response.is_empty() {
                    "(No response generated)".to_string()
                } else {
                    response.final_response
                };
                let envelope = format!(
                    "# Cron Job: {name}\n\n\
                     **Job ID:** {id}\n\
                     **Run Time:** {time}\n\
                     **Schedule:** {schedule}\n\n\
                     ## Prompt\n\n{prompt}\n\n\
                     ## Response\n\n{text}\n",
                    name = job.name,
                    id = job.id,
                    time = Local::now().format("%Y-%m-%d %H:%M:%S"),
                    schedule = job.schedule,
                    prompt = job.prompt,
                );
                info!(job_id = %job.id, "job completed");
                (true, envelope, None)
            }
            Err(e) => {
                let message = e.to_string();
                error!(job_id = %job.id, error = %message, "job failed");
                let envelope = format!(
                    "# Cron Job: {name} (FAILED)\n\n\
                     **Job ID:** {id}\n\
                     **Run Time:** {time}\n\
                     **Schedule:** {schedule}\n\n\
                     ## Prompt\n\n{prompt}\n\n\
                     ## Error\n\n```\n{message}\n```\n",
                    name = job.name,
                    id = job.id,
                    time = Local::now().format("%Y-%m-%d %H:%M:%S"),
                    schedule = job.schedule,
                    prompt = job.prompt,
                );
                (false, envelope, Some(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Schedule;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use dashmap::DashMap;
    use hermes_channels::{ChannelDirectory, PlatformAdapter};
    use hermes_core::{
        AgentResponse, GatewayConfig, HistoryEntry, InterruptHandle, Platform,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedAgent {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AgentEngine for ScriptedAgent {
        async fn run_conversation(
            &self,
            prompt: &str,
            _session_id: &str,
            _history: &[HistoryEntry],
            _interrupt: Option<InterruptHandle>,
        ) -> hermes_core::Result<AgentResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(hermes_core::GatewayError::Agent("boom".to_string()));
            }
            Ok(AgentResponse {
                final_response: format!("ran: {prompt}"),
                messages: Vec::new(),
                completed: true,
            })
        }
    }

    fn engine(fail: bool) -> (tempfile::TempDir, CronEngine, Arc<ScriptedAgent>) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GatewayConfig::default();
        config.state_dir = dir.path().to_path_buf();

        let store = Arc::new(JobStore::open(config.jobs_file()).unwrap());
        let agent = Arc::new(ScriptedAgent {
            calls: AtomicUsize::new(0),
            fail,
        });
        let adapters: Arc<DashMap<Platform, Arc<dyn PlatformAdapter>>> =
            Arc::new(DashMap::new());
        let router = Arc::new(DeliveryRouter::new(
            Arc::new(config),
            adapters,
            Arc::new(ChannelDirectory::default()),
        ));
        let engine = CronEngine::new(store, agent.clone(), router);
        (dir, engine, agent)
    }

    fn overdue_one_shot() -> Job {
        let at = Utc::now() - ChronoDuration::seconds(1);
        let mut job = Job::new(
            "one shot",
            "say hello",
            Schedule::Once { at },
            vec!["local".to_string()],
        )
        .with_repeat_count(1);
        job.next_run_at = Some(at);
        job
    }

    #[tokio::test]
    async fn one_shot_job_runs_exactly_once() {
        let (dir, engine, agent) = engine(false);
        let job = engine.store().add(overdue_one_shot()).unwrap();

        assert_eq!(engine.tick().await.unwrap(), 1);
        assert_eq!(agent.calls.load(Ordering::SeqCst), 1);

        let stored = engine.store().get(&job.id).unwrap();
        assert_eq!(stored.remaining, Some(0));
        assert!(!stored.enabled);
        assert_eq!(stored.next_run_at, None, "next_run_at must not move into the past");
        assert!(stored.last_run_at.is_some());

        // Output landed in the local sink under the job id.
        let out_dir = dir.path().join("cron").join("output").join(&job.id);
        let entries: Vec<_> = std::fs::read_dir(&out_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let content =
            std::fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        assert!(content.contains("# Cron Job: one shot"));
        assert!(content.contains("ran: say hello"));

        // A second tick finds nothing due.
        assert_eq!(engine.tick().await.unwrap(), 0);
        assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_job_still_marks_run_and_writes_output() {
        let (dir, engine, _agent) = engine(true);
        let job = engine.store().add(overdue_one_shot()).unwrap();

        assert_eq!(engine.tick().await.unwrap(), 1);
        let stored = engine.store().get(&job.id).unwrap();
        assert!(stored.last_error.as_deref().unwrap().contains("boom"));

        let out_dir = dir.path().join("cron").join("output").join(&job.id);
        let entries: Vec<_> = std::fs::read_dir(&out_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let content =
            std::fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        assert!(content.contains("(FAILED)"));
    }

    #[tokio::test]
    async fn one_bad_job_does_not_block_others() {
        let (_dir, engine, agent) = engine(false);
        let mut bad = overdue_one_shot();
        bad.schedule = Schedule::Cron {
            expression: "completely bogus".to_string(),
        };
        engine.store().add(bad).unwrap();
        let good = engine.store().add(overdue_one_shot()).unwrap();

        // Both run; the bad schedule only affects its own next_run.
        assert_eq!(engine.tick().await.unwrap(), 2);
        assert_eq!(agent.calls.load(Ordering::SeqCst), 2);
        assert!(engine.store().get(&good.id).unwrap().last_run_at.is_some());
    }
}
