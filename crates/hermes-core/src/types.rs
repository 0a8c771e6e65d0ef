use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Messaging platforms the gateway can connect to.
///
/// `Local` is the file-sink pseudo-platform: deliveries addressed to it are
/// written under the state directory instead of going over the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Local,
    Telegram,
    Discord,
    Slack,
    Whatsapp,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Local => "local",
            Platform::Telegram => "telegram",
            Platform::Discord => "discord",
            Platform::Slack => "slack",
            Platform::Whatsapp => "whatsapp",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Platform::Local),
            "telegram" => Ok(Platform::Telegram),
            "discord" => Ok(Platform::Discord),
            "slack" => Ok(Platform::Slack),
            "whatsapp" => Ok(Platform::Whatsapp),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// Shape of the chat a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    #[default]
    Dm,
    Group,
    Channel,
    Thread,
    Forum,
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChatKind::Dm => "dm",
            ChatKind::Group => "group",
            ChatKind::Channel => "channel",
            ChatKind::Thread => "thread",
            ChatKind::Forum => "forum",
        };
        f.write_str(s)
    }
}

/// Identity of a conversation: `(platform, chat_id, thread_id?)`.
///
/// The thread component keeps forum topics and threads separate from the
/// parent chat's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub platform: Platform,
    pub chat_id: String,
    pub thread_id: Option<String>,
}

impl SessionKey {
    pub fn new(platform: Platform, chat_id: impl Into<String>, thread_id: Option<String>) -> Self {
        Self {
            platform,
            chat_id: chat_id.into(),
            thread_id,
        }
    }

    /// Filename stem for the on-disk session blob: `{chat_id}` or
    /// `{chat_id}_{thread_id}`.
    pub fn file_stem(&self) -> String {
        match &self.thread_id {
            Some(thread) => format!("{}_{}", self.chat_id, thread),
            None => self.chat_id.clone(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.thread_id {
            Some(thread) => write!(f, "{}:{}:{}", self.platform, self.chat_id, thread),
            None => write!(f, "{}:{}", self.platform, self.chat_id),
        }
    }
}

/// Where a message came from: one conversation endpoint on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSource {
    pub platform: Platform,
    /// Opaque platform-native chat identifier.
    pub chat_id: String,
    pub chat_name: Option<String>,
    pub chat_kind: ChatKind,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    /// Forum topic / thread subchannel, if any.
    pub thread_id: Option<String>,
}

impl SessionSource {
    /// The session identity this source maps to.
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(self.platform, self.chat_id.clone(), self.thread_id.clone())
    }

    pub fn is_dm(&self) -> bool {
        self.chat_kind == ChatKind::Dm
    }
}

/// Kind of an incoming message after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Photo,
    Video,
    Audio,
    Voice,
    Document,
    Sticker,
    Command,
}

/// Normalized inbound message, the one shape every adapter produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub text: String,
    pub kind: MessageKind,
    pub source: SessionSource,
    pub message_id: Option<String>,
    pub reply_to: Option<String>,
    /// `(url, mime)` pairs for media attachments, in source order.
    #[serde(default)]
    pub media: Vec<(String, String)>,
    pub timestamp: DateTime<Utc>,
}

impl MessageEvent {
    /// Plain text event with no media, the common case.
    pub fn text(text: impl Into<String>, source: SessionSource) -> Self {
        let text = text.into();
        let kind = if text.starts_with('/') {
            MessageKind::Command
        } else {
            MessageKind::Text
        };
        Self {
            text,
            kind,
            source,
            message_id: None,
            reply_to: None,
            media: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// True when the message text is a `/command`.
    pub fn is_command(&self) -> bool {
        self.text.starts_with('/')
    }

    /// The lowercased command name (without the leading `/`), if this is a
    /// command message.
    pub fn command_name(&self) -> Option<String> {
        if !self.is_command() {
            return None;
        }
        self.text
            .split_whitespace()
            .next()
            .map(|w| w[1..].to_lowercase())
    }

    /// Everything after the command word, or the full text when this is not
    /// a command.
    pub fn command_args(&self) -> &str {
        if !self.is_command() {
            return &self.text;
        }
        match self.text.split_once(char::is_whitespace) {
            Some((_, rest)) => rest.trim_start(),
            None => "",
        }
    }
}

/// One entry in a session's conversation history.
///
/// The gateway treats `content` and `metadata` as opaque; only the agent
/// engine interprets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl HistoryEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SessionSource {
        SessionSource {
            platform: Platform::Telegram,
            chat_id: "42".to_string(),
            chat_name: None,
            chat_kind: ChatKind::Dm,
            user_id: Some("7".to_string()),
            user_name: Some("alice".to_string()),
            thread_id: None,
        }
    }

    #[test]
    fn platform_roundtrip() {
        for p in [
            Platform::Local,
            Platform::Telegram,
            Platform::Discord,
            Platform::Slack,
            Platform::Whatsapp,
        ] {
            let parsed: Platform = p.as_str().parse().unwrap();
            assert_eq!(parsed, p);
        }
        assert!("matrix".parse::<Platform>().is_err());
    }

    #[test]
    fn session_key_includes_thread() {
        let mut src = source();
        src.thread_id = Some("99".to_string());
        let key = src.session_key();
        assert_eq!(key.file_stem(), "42_99");
        assert_eq!(key.to_string(), "telegram:42:99");
    }

    #[test]
    fn command_name_is_lowercased() {
        let event = MessageEvent::text("/New please", source());
        assert!(event.is_command());
        assert_eq!(event.command_name().as_deref(), Some("new"));
        assert_eq!(event.command_args(), "please");
    }

    #[test]
    fn command_without_args() {
        let event = MessageEvent::text("/reset", source());
        assert_eq!(event.command_name().as_deref(), Some("reset"));
        assert_eq!(event.command_args(), "");
    }

    #[test]
    fn non_command_passes_text_through() {
        let event = MessageEvent::text("hello there", source());
        assert!(!event.is_command());
        assert_eq!(event.command_name(), None);
        assert_eq!(event.command_args(), "hello there");
        assert_eq!(event.kind, MessageKind::Text);
    }
}
