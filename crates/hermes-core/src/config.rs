use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Format, Json, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::types::{ChatKind, Platform};

/// How often the typing indicator is refreshed while a turn runs (platform
/// typing status expires after ~5 s).
pub const TYPING_REFRESH_SECS: u64 = 2;
/// Default cadence of the cron daemon loop.
pub const DEFAULT_CRON_INTERVAL_SECS: u64 = 60;

/// When sessions lose their context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResetMode {
    /// Reset at `reset_hour` each day.
    Daily,
    /// Reset after `idle_minutes` of inactivity.
    Idle,
    /// Whichever triggers first.
    #[default]
    Both,
}

/// Session reset policy, evaluated by the reset engine before every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPolicy {
    #[serde(default)]
    pub mode: ResetMode,
    /// Hour of the daily boundary, 0–23 local time.
    #[serde(default = "default_reset_hour")]
    pub reset_hour: u8,
    /// Minutes of inactivity before an idle reset.
    #[serde(default = "default_idle_minutes")]
    pub idle_minutes: u32,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            mode: ResetMode::Both,
            reset_hour: default_reset_hour(),
            idle_minutes: default_idle_minutes(),
        }
    }
}

/// Default destination for a platform.
///
/// A delivery target that names only the platform (`"telegram"`) resolves
/// to this chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeChannel {
    pub chat_id: String,
    /// Display name for operator output.
    #[serde(default = "default_home_name")]
    pub name: String,
}

/// Configuration of a single messaging platform.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Bot token. A platform without one is never considered connected.
    pub token: Option<String>,
    pub home_channel: Option<HomeChannel>,
    /// In non-DM chats, respond only when the bot is @-mentioned.
    #[serde(default = "bool_true")]
    pub require_mention: bool,
    /// Chat ids where the bot responds to every message regardless of
    /// `require_mention`. The allowlist wins over the global flag.
    #[serde(default)]
    pub free_response_chats: Vec<String>,
}

/// Settings for the subprocess agent-engine bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Command invoked per conversation; receives the prompt on stdin and
    /// a JSON request file path as its last argument.
    #[serde(default = "default_agent_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub model: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            args: Vec::new(),
            model: None,
        }
    }
}

/// Top-level gateway configuration (`~/.hermes/gateway.json` + env
/// overrides). Loaded once at startup and immutable afterwards; a reload
/// requires a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub platforms: HashMap<Platform, PlatformConfig>,

    #[serde(default)]
    pub default_reset_policy: ResetPolicy,
    /// Per-chat-kind overrides (dm, group, thread, …).
    #[serde(default)]
    pub reset_by_kind: HashMap<ChatKind, ResetPolicy>,
    /// Per-platform overrides; take precedence over chat-kind overrides.
    #[serde(default)]
    pub reset_by_platform: HashMap<Platform, ResetPolicy>,

    /// Commands that explicitly reset a session.
    #[serde(default = "default_reset_triggers")]
    pub reset_triggers: Vec<String>,

    /// Root of all persisted state (sessions, cron, logs).
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Always append `local` to resolved delivery targets so a durable
    /// copy of every cron output exists on disk.
    #[serde(default = "bool_true")]
    pub always_log_local: bool,

    /// Extra trusted roots for document sends, on top of the built-ins.
    #[serde(default)]
    pub trusted_document_dirs: Vec<PathBuf>,

    #[serde(default)]
    pub agent: AgentConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            platforms: HashMap::new(),
            default_reset_policy: ResetPolicy::default(),
            reset_by_kind: HashMap::new(),
            reset_by_platform: HashMap::new(),
            reset_triggers: default_reset_triggers(),
            state_dir: default_state_dir(),
            always_log_local: true,
            trusted_document_dirs: Vec::new(),
            agent: AgentConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load config from a JSON file with env-var overrides applied on top.
    ///
    /// Checks in order: explicit path argument, `HERMES_CONFIG`, then
    /// `~/.hermes/gateway.json`. A missing file is not an error: defaults
    /// plus env vars make a usable config.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("HERMES_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| default_state_dir().join("gateway.json"));

        let mut config: GatewayConfig = Figment::from(Serialized::defaults(GatewayConfig::default()))
            .merge(Json::file(&path))
            .extract()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Platforms that are enabled and carry credentials.
    pub fn connected_platforms(&self) -> Vec<Platform> {
        let mut connected: Vec<Platform> = self
            .platforms
            .iter()
            .filter(|(_, c)| c.enabled && c.token.is_some())
            .map(|(p, _)| *p)
            .collect();
        connected.sort_by_key(|p| p.as_str());
        connected
    }

    pub fn platform(&self, platform: Platform) -> Option<&PlatformConfig> {
        self.platforms.get(&platform)
    }

    pub fn home_channel(&self, platform: Platform) -> Option<&HomeChannel> {
        self.platforms
            .get(&platform)
            .and_then(|c| c.home_channel.as_ref())
    }

    /// Reset policy lookup. Priority: platform override > chat-kind
    /// override > default.
    pub fn reset_policy(&self, platform: Platform, chat_kind: ChatKind) -> ResetPolicy {
        if let Some(policy) = self.reset_by_platform.get(&platform) {
            return *policy;
        }
        if let Some(policy) = self.reset_by_kind.get(&chat_kind) {
            return *policy;
        }
        self.default_reset_policy
    }

    /// True when `text` is one of the configured explicit reset commands.
    pub fn is_reset_trigger(&self, text: &str) -> bool {
        let trimmed = text.trim();
        self.reset_triggers
            .iter()
            .any(|t| trimmed.eq_ignore_ascii_case(t))
    }

    // --- persisted-state layout -------------------------------------------

    pub fn sessions_dir(&self) -> PathBuf {
        self.state_dir.join("sessions")
    }

    pub fn jobs_file(&self) -> PathBuf {
        self.state_dir.join("cron").join("jobs.json")
    }

    pub fn cron_output_dir(&self) -> PathBuf {
        self.state_dir.join("cron").join("output")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    // --- env overrides ----------------------------------------------------

    /// Apply recognized environment variables on top of the file config.
    ///
    /// Env vars win over the file; the file wins over defaults.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            let entry = self.platforms.entry(Platform::Telegram).or_default();
            entry.enabled = true;
            entry.token = Some(token);
        }
        if let Ok(home) = std::env::var("TELEGRAM_HOME_CHANNEL") {
            if let Some(entry) = self.platforms.get_mut(&Platform::Telegram) {
                entry.home_channel = Some(HomeChannel {
                    chat_id: home,
                    name: std::env::var("TELEGRAM_HOME_CHANNEL_NAME")
                        .unwrap_or_else(|_| default_home_name()),
                });
            }
        }

        if let Ok(token) = std::env::var("DISCORD_BOT_TOKEN") {
            let entry = self.platforms.entry(Platform::Discord).or_default();
            entry.enabled = true;
            entry.token = Some(token);
        }
        if let Ok(home) = std::env::var("DISCORD_HOME_CHANNEL") {
            if let Some(entry) = self.platforms.get_mut(&Platform::Discord) {
                entry.home_channel = Some(HomeChannel {
                    chat_id: home,
                    name: std::env::var("DISCORD_HOME_CHANNEL_NAME")
                        .unwrap_or_else(|_| default_home_name()),
                });
            }
        }
        if let Ok(raw) = std::env::var("DISCORD_FREE_RESPONSE_CHANNELS") {
            let entry = self.platforms.entry(Platform::Discord).or_default();
            entry.free_response_chats = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(raw) = std::env::var("DISCORD_REQUIRE_MENTION") {
            let entry = self.platforms.entry(Platform::Discord).or_default();
            entry.require_mention = parse_bool(&raw);
        }

        if std::env::var("WHATSAPP_ENABLED").map(|v| parse_bool(&v)) == Ok(true) {
            self.platforms.entry(Platform::Whatsapp).or_default().enabled = true;
        }

        if let Ok(Ok(minutes)) = std::env::var("SESSION_IDLE_MINUTES").map(|v| v.parse::<u32>()) {
            self.default_reset_policy.idle_minutes = minutes;
        }
        if let Ok(Ok(hour)) = std::env::var("SESSION_RESET_HOUR").map(|v| v.parse::<u8>()) {
            if hour <= 23 {
                self.default_reset_policy.reset_hour = hour;
            }
        }

        if let Ok(raw) = std::env::var("HERMES_TRUSTED_DOCUMENT_DIRS") {
            for dir in raw.split(':').map(str::trim).filter(|s| !s.is_empty()) {
                self.trusted_document_dirs.push(PathBuf::from(dir));
            }
        }
    }

    /// Reject configurations that cannot run: enabled network platforms
    /// must have a token; reset policy bounds must hold.
    pub fn validate(&self) -> Result<()> {
        for (platform, cfg) in &self.platforms {
            if cfg.enabled && cfg.token.is_none() && *platform != Platform::Local {
                return Err(GatewayError::Config(format!(
                    "platform {} is enabled but has no token",
                    platform
                )));
            }
        }
        let policies = std::iter::once(&self.default_reset_policy)
            .chain(self.reset_by_kind.values())
            .chain(self.reset_by_platform.values());
        for policy in policies {
            if policy.reset_hour > 23 {
                return Err(GatewayError::Config(format!(
                    "reset_hour {} out of range 0-23",
                    policy.reset_hour
                )));
            }
            if policy.idle_minutes == 0 {
                return Err(GatewayError::Config(
                    "idle_minutes must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn bool_true() -> bool {
    true
}
fn default_reset_hour() -> u8 {
    4
}
fn default_idle_minutes() -> u32 {
    120
}
fn default_home_name() -> String {
    "Home".to_string()
}
fn default_reset_triggers() -> Vec<String> {
    vec!["/new".to_string(), "/reset".to_string()]
}
fn default_agent_command() -> String {
    "hermes-agent".to_string()
}
fn default_state_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".hermes")
}
