use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hermes_core::{ChatKind, MessageEvent, Platform};

use crate::directory::ChannelEntry;
use crate::error::Result;

/// Callback every adapter invokes for each normalized inbound event.
///
/// Injected at adapter construction; the only edge pointing from an
/// adapter back toward the rest of the gateway. Must return quickly; the
/// turn scheduler's `submit` is non-blocking by design.
pub type EventHandler = Arc<dyn Fn(MessageEvent) + Send + Sync>;

/// Outcome of one platform send.
///
/// Send failures are data, not panics: the delivery pipeline collects them
/// per target and keeps going.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl SendResult {
    pub fn ok(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Basic information about a chat, as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInfo {
    pub name: String,
    pub kind: ChatKind,
}

/// Capability set every platform connector implements.
///
/// Adapters normalize inbound platform events into
/// [`MessageEvent`](hermes_core::MessageEvent)s and hand them to a callback
/// injected at construction, so no adapter ever reaches back into the
/// supervisor. Send methods report failure inside [`SendResult`] so one bad
/// target never aborts a fan-out.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Establish the connection and start the receive loop.
    async fn connect(&self) -> Result<()>;

    /// Gracefully close the connection and stop the receive loop.
    async fn disconnect(&self) -> Result<()>;

    /// Send markdown text, auto-chunked at the platform character limit
    /// (preferred split points: newline > space > hard cut).
    async fn send_text(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> SendResult;

    /// Send an image natively where the platform supports it; adapters
    /// without native upload fall back to posting the URL as text.
    async fn send_image(
        &self,
        chat_id: &str,
        url: &str,
        caption: Option<&str>,
        reply_to: Option<&str>,
    ) -> SendResult;

    /// Send a file as a native attachment. `path` must already have passed
    /// the trusted-directory check (adapters re-validate).
    async fn send_document(&self, chat_id: &str, path: &Path, caption: Option<&str>) -> SendResult;

    /// Fire-and-forget typing indicator; may be a no-op.
    async fn send_typing(&self, chat_id: &str);

    async fn get_chat_info(&self, chat_id: &str) -> Result<ChatInfo>;

    /// Best-effort listing of chats the bot can see, used to populate the
    /// channel directory. The default is an empty listing.
    async fn list_chats(&self) -> Result<Vec<ChannelEntry>> {
        Ok(Vec::new())
    }
}
