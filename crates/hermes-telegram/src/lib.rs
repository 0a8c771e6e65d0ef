//! `hermes-telegram` — Telegram reference adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` behind the
//! [`PlatformAdapter`](hermes_channels::PlatformAdapter) capability set.
//! Long polling; no public URL required. Inbound messages are normalized
//! into [`MessageEvent`](hermes_core::MessageEvent)s, gated for mentions
//! in group chats, and handed to the callback injected at construction.

pub mod adapter;
pub mod normalize;
pub mod send;

pub use adapter::TelegramAdapter;
