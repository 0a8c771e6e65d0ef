use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Exit code for configuration errors.
pub const EXIT_CONFIG: u8 = 1;
/// Exit code for runtime errors.
pub const EXIT_RUNTIME: u8 = 2;
/// Exit code when interrupted by SIGINT.
pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(
    name = "hermes-gateway",
    version,
    about = "Agent gateway: platform adapters, session scheduling, cron delivery"
)]
pub struct Cli {
    /// Path to the gateway config file (default: ~/.hermes/gateway.json).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Gateway lifecycle.
    Gateway {
        #[command(subcommand)]
        action: GatewayAction,
    },
    /// Cron job operations.
    Cron {
        #[command(subcommand)]
        action: CronAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum GatewayAction {
    /// Start the supervisor in the foreground; Ctrl+C stops it.
    Run,
    /// Start the gateway as a detached background process.
    Start,
    /// Stop a background gateway.
    Stop,
    /// Restart the background gateway.
    Restart,
    /// Report whether a background gateway is running.
    Status,
}

#[derive(Debug, Subcommand)]
pub enum CronAction {
    /// Evaluate all jobs once and run those that are due.
    Tick,
    /// Run the cron loop until interrupted.
    Daemon {
        /// Seconds between ticks.
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
    /// Print jobs.
    List {
        /// Include disabled jobs.
        #[arg(long)]
        all: bool,
    },
}
