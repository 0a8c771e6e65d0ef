//! `hermes-sessions` — durable per-conversation state.
//!
//! One JSON blob per `(platform, chat_id, thread_id?)` key, guarded by a
//! per-key async lock, replaced (never mutated in place) when the reset
//! policy fires or an explicit reset command arrives.

pub mod error;
pub mod reset;
pub mod store;
pub mod types;

pub use error::{Result, SessionError};
pub use reset::{should_reset, should_reset_in_tz};
pub use store::SessionStore;
pub use types::SessionContext;
