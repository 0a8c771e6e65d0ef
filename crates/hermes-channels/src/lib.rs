//! `hermes-channels` — platform adapter abstractions and delivery routing.
//!
//! # Overview
//!
//! Every platform connector implements [`PlatformAdapter`]; the
//! [`AdapterManager`] owns the registry and connects adapters with
//! backoff. The [`DeliveryRouter`] resolves symbolic targets (`origin`,
//! `local`, `<platform>`, `<platform>:<chat>`) through home channels and
//! the [`ChannelDirectory`], then fans content out concurrently to
//! adapters and the local file sink.
//!
//! Shared adapter helpers live here too: the length-limited message
//! splitter, image/document extraction from agent text, the non-DM
//! response gate, and trusted-path validation for document sends.

pub mod adapter;
pub mod backoff;
pub mod delivery;
pub mod directory;
pub mod error;
pub mod extract;
pub mod gate;
pub mod manager;
pub mod split;
pub mod trust;

pub use adapter::{ChatInfo, EventHandler, PlatformAdapter, SendResult};
pub use delivery::{
    DeliveryMeta, DeliveryResult, DeliveryRouter, DeliveryTarget, OutboundPayload,
};
pub use directory::{ChannelDirectory, ChannelEntry};
pub use error::{ChannelError, Result};
pub use manager::AdapterManager;
