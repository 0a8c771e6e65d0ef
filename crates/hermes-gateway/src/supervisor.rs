//! Gateway supervisor: owns every long-lived component and wires them
//! together: adapters feed the turn scheduler, the cron engine feeds the
//! delivery router, and shutdown tears things down in order (cron first,
//! then adapter receive loops, then a bounded worker drain).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use hermes_channels::{
    AdapterManager, ChannelDirectory, DeliveryRouter, EventHandler,
};
use hermes_core::config::DEFAULT_CRON_INTERVAL_SECS;
use hermes_core::{AgentEngine, GatewayConfig, Platform, Result};
use hermes_scheduler::{CronEngine, JobStore};
use hermes_sessions::SessionStore;
use hermes_telegram::TelegramAdapter;

use crate::engine::ProcessAgentEngine;
use crate::invoker::AgentInvoker;
use crate::turns::TurnScheduler;

/// Bounded waits during shutdown.
const CRON_SHUTDOWN_SECS: u64 = 5;
const WORKER_DRAIN_SECS: u64 = 10;

pub struct Supervisor {
    config: Arc<GatewayConfig>,
    manager: AdapterManager,
    directory: Arc<ChannelDirectory>,
    scheduler: Arc<TurnScheduler>,
    cron: Arc<CronEngine>,
}

impl Supervisor {
    /// Build the full component graph from a validated config.
    ///
    /// Adapters are registered for every enabled platform this build
    /// ships a connector for; enabled platforms without one still take
    /// part in config and delivery resolution.
    pub fn build(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let store = Arc::new(SessionStore::new(config.sessions_dir()));
        let directory = Arc::new(ChannelDirectory::default());
        let manager = AdapterManager::new();
        let adapters = manager.adapters();
        let router = Arc::new(DeliveryRouter::new(
            Arc::clone(&config),
            Arc::clone(&adapters),
            Arc::clone(&directory),
        ));

        let engine: Arc<dyn AgentEngine> = Arc::new(ProcessAgentEngine::new(config.agent.clone()));
        let invoker = Arc::new(AgentInvoker::new(
            Arc::clone(&config),
            store,
            Arc::clone(&engine),
            Arc::clone(&router),
            Arc::clone(&adapters),
        ));
        let scheduler = Arc::new(TurnScheduler::new(invoker));

        let job_store = Arc::new(
            JobStore::open(config.jobs_file())
                .map_err(|e| hermes_core::GatewayError::Config(e.to_string()))?,
        );
        let cron = Arc::new(CronEngine::new(job_store, engine, router));

        let supervisor = Self {
            config,
            manager,
            directory,
            scheduler,
            cron,
        };
        supervisor.register_adapters();
        Ok(supervisor)
    }

    pub fn cron(&self) -> &Arc<CronEngine> {
        &self.cron
    }

    fn register_adapters(&self) {
        let scheduler = Arc::clone(&self.scheduler);
        let handler: EventHandler = Arc::new(move |event| scheduler.submit(event));

        for platform in self.config.connected_platforms() {
            let Some(platform_config) = self.config.platform(platform) else {
                continue;
            };
            let Some(token) = platform_config.token.clone() else {
                continue;
            };
            match platform {
                Platform::Telegram => {
                    self.manager.register(Arc::new(TelegramAdapter::new(
                        &token,
                        platform_config.clone(),
                        self.config.trusted_document_dirs.clone(),
                        Arc::clone(&handler),
                    )));
                }
                other => {
                    warn!(platform = %other,
                          "platform enabled but this build has no connector for it");
                }
            }
        }
    }

    /// Run until SIGINT. Returns when shutdown has completed.
    pub async fn run(&self) -> Result<()> {
        self.manager.connect_all().await;
        self.refresh_directory().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let cron = Arc::clone(&self.cron);
        let cron_task = tokio::spawn(async move {
            cron.run_daemon(Duration::from_secs(DEFAULT_CRON_INTERVAL_SECS), shutdown_rx)
                .await;
        });

        info!("gateway running; press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
        info!("shutdown requested");

        // Cron first so no new jobs start, then the receive loops, then a
        // bounded drain of in-flight turns.
        let _ = shutdown_tx.send(true);
        if tokio::time::timeout(Duration::from_secs(CRON_SHUTDOWN_SECS), cron_task)
            .await
            .is_err()
        {
            error!("cron daemon did not stop in time");
        }
        self.manager.disconnect_all().await;
        self.scheduler
            .drain(Duration::from_secs(WORKER_DRAIN_SECS))
            .await;

        info!("gateway stopped");
        Ok(())
    }

    /// Populate the channel directory from adapter listings (best-effort).
    async fn refresh_directory(&self) {
        for platform in self.manager.platforms() {
            let Some(adapter) = self.manager.get(platform) else {
                continue;
            };
            match adapter.list_chats().await {
                Ok(entries) if !entries.is_empty() => {
                    info!(platform = %platform, count = entries.len(), "channel directory updated");
                    self.directory.update(platform, entries);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(platform = %platform, error = %e, "channel listing failed");
                }
            }
        }
    }
}
