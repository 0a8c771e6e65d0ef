use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use hermes_core::{GatewayConfig, GatewayError};

use hermes_gateway::cli::{
    Cli, Command, CronAction, GatewayAction, EXIT_CONFIG, EXIT_INTERRUPTED, EXIT_RUNTIME,
};
use hermes_gateway::supervisor::Supervisor;
use hermes_gateway::{logging, service};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match GatewayConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    // File logs only for the long-running modes.
    let file_logs = matches!(
        cli.command,
        Command::Gateway {
            action: GatewayAction::Run
        } | Command::Cron {
            action: CronAction::Daemon { .. }
        }
    );
    logging::init(file_logs.then(|| config.logs_dir()).as_deref());

    match run(cli.command, config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if let Some(GatewayError::Config(_)) = e.downcast_ref::<GatewayError>() {
                eprintln!("configuration error: {e}");
                ExitCode::from(EXIT_CONFIG)
            } else {
                eprintln!("error: {e}");
                ExitCode::from(EXIT_RUNTIME)
            }
        }
    }
}

async fn run(command: Command, config: GatewayConfig) -> anyhow::Result<u8> {
    match command {
        Command::Gateway { action } => match action {
            GatewayAction::Run => {
                let supervisor = Supervisor::build(config)?;
                supervisor.run().await?;
                Ok(EXIT_INTERRUPTED)
            }
            GatewayAction::Start => service::start(&config),
            GatewayAction::Stop => service::stop(&config),
            GatewayAction::Restart => service::restart(&config),
            GatewayAction::Status => service::status(&config),
        },
        Command::Cron { action } => match action {
            CronAction::Tick => {
                let supervisor = Supervisor::build(config)?;
                let executed = supervisor.cron().tick().await?;
                println!("{executed} job(s) executed");
                Ok(0)
            }
            CronAction::Daemon { interval } => {
                let supervisor = Supervisor::build(config)?;
                let (shutdown_tx, shutdown_rx) = watch::channel(false);
                let cron = supervisor.cron().clone();
                let daemon = tokio::spawn(async move {
                    cron.run_daemon(Duration::from_secs(interval), shutdown_rx)
                        .await;
                });

                tokio::signal::ctrl_c().await?;
                info!("stopping cron daemon");
                let _ = shutdown_tx.send(true);
                let _ = tokio::time::timeout(Duration::from_secs(5), daemon).await;
                Ok(EXIT_INTERRUPTED)
            }
            CronAction::List { all } => {
                let supervisor = Supervisor::build(config)?;
                let jobs = supervisor.cron().store().list(all);
                if jobs.is_empty() {
                    println!("no jobs");
                    return Ok(0);
                }
                for job in jobs {
                    let next = job
                        .next_run_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string());
                    let state = if job.enabled { "enabled" } else { "disabled" };
                    println!(
                        "{id}  {state:8}  next: {next}  runs: {count}  [{schedule}]  {name}",
                        id = &job.id[..8.min(job.id.len())],
                        count = job.run_count,
                        schedule = job.schedule,
                        name = job.name,
                    );
                }
                Ok(0)
            }
        },
    }
}
