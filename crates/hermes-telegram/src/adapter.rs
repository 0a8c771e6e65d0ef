//! Telegram adapter: long-polling dispatcher plus the send capability set.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageId};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use hermes_channels::adapter::{ChatInfo, EventHandler, PlatformAdapter, SendResult};
use hermes_channels::error::{ChannelError, Result};
use hermes_channels::gate::{contains_mention, should_respond, strip_mentions};
use hermes_channels::trust::ensure_trusted;
use hermes_core::{ChatKind, Platform, PlatformConfig};

use crate::normalize::normalize;
use crate::send::send_chunked;

/// Telegram platform adapter.
///
/// `connect` verifies the token, then drives a teloxide `Dispatcher` on a
/// background task for the lifetime of the connection. Inbound messages
/// are normalized, mention-gated for group chats, and pushed into the
/// injected [`EventHandler`].
pub struct TelegramAdapter {
    bot: Bot,
    config: PlatformConfig,
    handler: EventHandler,
    /// Extra trusted roots for document sends, from the gateway config.
    extra_trusted: Vec<PathBuf>,
    listener: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    username: OnceLock<String>,
}

struct ListenerState {
    config: PlatformConfig,
    handler: EventHandler,
    username: String,
}

impl TelegramAdapter {
    pub fn new(
        token: &str,
        config: PlatformConfig,
        extra_trusted: Vec<PathBuf>,
        handler: EventHandler,
    ) -> Self {
        Self {
            bot: Bot::new(token),
            config,
            handler,
            extra_trusted,
            listener: tokio::sync::Mutex::new(None),
            username: OnceLock::new(),
        }
    }

    fn parse_chat_id(chat_id: &str) -> Result<ChatId> {
        chat_id
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| ChannelError::Unresolved(format!("invalid Telegram chat id: {chat_id}")))
    }
}

#[async_trait]
impl PlatformAdapter for TelegramAdapter {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn connect(&self) -> Result<()> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        let username = me.user.username.clone().unwrap_or_default();
        let _ = self.username.set(username.clone());

        let state = Arc::new(ListenerState {
            config: self.config.clone(),
            handler: Arc::clone(&self.handler),
            username,
        });

        let handler_tree = Update::filter_message().endpoint(handle_update);
        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler_tree)
            .dependencies(dptree::deps![state])
            .default_handler(|_upd| async {})
            .build();

        let join = tokio::spawn(async move {
            dispatcher.dispatch().await;
        });
        *self.listener.lock().await = Some(join);

        info!("Telegram: long-polling dispatcher started");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(join) = self.listener.lock().await.take() {
            join.abort();
            info!("Telegram: dispatcher stopped");
        }
        Ok(())
    }

    async fn send_text(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
        _metadata: Option<&serde_json::Value>,
    ) -> SendResult {
        let chat = match Self::parse_chat_id(chat_id) {
            Ok(chat) => chat,
            Err(e) => return SendResult::failed(e.to_string()),
        };
        let reply = reply_to.and_then(|id| id.parse::<i32>().ok()).map(MessageId);
        send_chunked(&self.bot, chat, content, reply).await
    }

    async fn send_image(
        &self,
        chat_id: &str,
        url: &str,
        caption: Option<&str>,
        reply_to: Option<&str>,
    ) -> SendResult {
        let chat = match Self::parse_chat_id(chat_id) {
            Ok(chat) => chat,
            Err(e) => return SendResult::failed(e.to_string()),
        };
        let parsed = match url::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return SendResult::failed(format!("invalid image url {url}: {e}")),
        };

        let mut request = self.bot.send_photo(chat, InputFile::url(parsed));
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        match request.await {
            Ok(msg) => SendResult::ok(Some(msg.id.0.to_string())),
            Err(e) => {
                // Native upload failed; degrade to posting the URL as text.
                warn!(error = %e, "Telegram: photo send failed, falling back to URL");
                let text = match caption {
                    Some(c) => format!("{c}\n{url}"),
                    None => url.to_string(),
                };
                self.send_text(chat_id, &text, reply_to, None).await
            }
        }
    }

    async fn send_document(&self, chat_id: &str, path: &Path, caption: Option<&str>) -> SendResult {
        let chat = match Self::parse_chat_id(chat_id) {
            Ok(chat) => chat,
            Err(e) => return SendResult::failed(e.to_string()),
        };
        let real = match ensure_trusted(path, &self.extra_trusted) {
            Ok(real) => real,
            Err(e) => return SendResult::failed(e.to_string()),
        };

        let mut request = self.bot.send_document(chat, InputFile::file(real));
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        match request.await {
            Ok(msg) => SendResult::ok(Some(msg.id.0.to_string())),
            Err(e) => SendResult::failed(format!("Transport error: {e}")),
        }
    }

    async fn send_typing(&self, chat_id: &str) {
        if let Ok(chat) = Self::parse_chat_id(chat_id) {
            let _ = self.bot.send_chat_action(chat, ChatAction::Typing).await;
        }
    }

    async fn get_chat_info(&self, chat_id: &str) -> Result<ChatInfo> {
        let chat = Self::parse_chat_id(chat_id)?;
        let info = self
            .bot
            .get_chat(chat)
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let kind = if info.is_private() {
            ChatKind::Dm
        } else if info.is_channel() {
            ChatKind::Channel
        } else {
            ChatKind::Group
        };
        let name = info
            .title()
            .map(String::from)
            .or_else(|| info.username().map(String::from))
            .unwrap_or_else(|| chat_id.to_string());

        Ok(ChatInfo { name, kind })
    }
}

/// Dispatcher endpoint for every incoming message.
async fn handle_update(msg: Message, state: Arc<ListenerState>) -> ResponseResult<()> {
    // Ignore messages from other bots.
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }

    let Some(mut event) = normalize(&msg) else {
        return Ok(());
    };

    if !event.source.is_dm() {
        let mentioned = contains_mention(&event.text, &state.username);
        if !should_respond(&state.config, &event, mentioned) {
            return Ok(());
        }
        if mentioned {
            let mention = format!("@{}", state.username);
            event.text = strip_mentions(&event.text, &[mention]);
        }
    }

    (state.handler)(event);
    Ok(())
}
