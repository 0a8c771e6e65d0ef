//! `hermes-core` — shared types and configuration for the Hermes gateway.
//!
//! Everything the other crates agree on lives here: the [`Platform`] set,
//! normalized [`MessageEvent`]s, the [`SessionKey`] identity, the
//! cooperative [`InterruptHandle`], the [`AgentEngine`] seam to the
//! external conversational engine, and the [`GatewayConfig`] loaded from
//! `~/.hermes/gateway.json` plus environment overrides.

pub mod agent;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod types;

pub use agent::{AgentEngine, AgentResponse};
pub use config::{
    AgentConfig, GatewayConfig, HomeChannel, PlatformConfig, ResetMode, ResetPolicy,
};
pub use error::{GatewayError, Result};
pub use interrupt::InterruptHandle;
pub use types::{
    ChatKind, HistoryEntry, MessageEvent, MessageKind, Platform, SessionKey, SessionSource,
};
