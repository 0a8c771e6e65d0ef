//! `hermes-gateway` — the gateway runtime.
//!
//! The binary wires the whole system: platform adapters feed normalized
//! events into the per-session [`turns::TurnScheduler`], which drives the
//! [`invoker::AgentInvoker`] (session load, reset policy, typing
//! indicator, agent call, origin delivery, history append). The cron
//! engine shares the same agent seam and delivery router. The
//! [`supervisor::Supervisor`] owns everything and handles ordered
//! shutdown.

pub mod cli;
pub mod engine;
pub mod invoker;
pub mod logging;
pub mod service;
pub mod supervisor;
pub mod turns;
