//! Background-service glue: pidfile-based start/stop/status for operators
//! without a service manager. `gateway run` stays the canonical way to run
//! under systemd or similar.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use hermes_core::GatewayConfig;

use crate::cli::EXIT_RUNTIME;

fn pid_file(config: &GatewayConfig) -> PathBuf {
    config.state_dir.join("gateway.pid")
}

fn read_pid(config: &GatewayConfig) -> Option<u32> {
    std::fs::read_to_string(pid_file(config))
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn is_alive(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

pub fn start(config: &GatewayConfig) -> anyhow::Result<u8> {
    if let Some(pid) = read_pid(config) {
        if is_alive(pid) {
            println!("gateway already running (pid {pid})");
            return Ok(0);
        }
    }

    let exe = std::env::current_exe()?;
    let child = Command::new(exe)
        .args(["gateway", "run"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    std::fs::create_dir_all(&config.state_dir)?;
    std::fs::write(pid_file(config), child.id().to_string())?;
    println!("gateway started (pid {})", child.id());
    Ok(0)
}

pub fn stop(config: &GatewayConfig) -> anyhow::Result<u8> {
    let Some(pid) = read_pid(config) else {
        println!("gateway is not running");
        return Ok(0);
    };
    if !is_alive(pid) {
        let _ = std::fs::remove_file(pid_file(config));
        println!("gateway is not running");
        return Ok(0);
    }

    let status = Command::new("kill").arg(pid.to_string()).status()?;
    if !status.success() {
        eprintln!("failed to stop pid {pid}");
        return Ok(EXIT_RUNTIME);
    }
    let _ = std::fs::remove_file(pid_file(config));
    println!("gateway stopped (pid {pid})");
    Ok(0)
}

pub fn restart(config: &GatewayConfig) -> anyhow::Result<u8> {
    let code = stop(config)?;
    if code != 0 {
        return Ok(code);
    }
    start(config)
}

pub fn status(config: &GatewayConfig) -> anyhow::Result<u8> {
    match read_pid(config) {
        Some(pid) if is_alive(pid) => {
            println!("gateway running (pid {pid})");
        }
        _ => {
            println!("gateway stopped");
        }
    }
    Ok(0)
}
