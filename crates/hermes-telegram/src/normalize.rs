//! Inbound normalization: teloxide `Message` → [`MessageEvent`].

use teloxide::types::Message;

use hermes_core::{ChatKind, MessageEvent, MessageKind, Platform, SessionSource};

/// Build the normalized event for an incoming Telegram message.
///
/// Returns `None` for messages with neither text nor media (service
/// messages, joins, pins, …).
pub fn normalize(msg: &Message) -> Option<MessageEvent> {
    let text = msg
        .text()
        .or_else(|| msg.caption())
        .unwrap_or("")
        .to_string();

    let kind = message_kind(msg, &text);
    let media = media_refs(msg);
    if text.is_empty() && media.is_empty() {
        return None;
    }

    let source = build_source(msg);
    Some(MessageEvent {
        text,
        kind,
        source,
        message_id: Some(msg.id.0.to_string()),
        reply_to: msg.reply_to_message().map(|r| r.id.0.to_string()),
        media,
        timestamp: msg.date,
    })
}

fn message_kind(msg: &Message, text: &str) -> MessageKind {
    if msg.photo().is_some() {
        MessageKind::Photo
    } else if msg.video().is_some() {
        MessageKind::Video
    } else if msg.audio().is_some() {
        MessageKind::Audio
    } else if msg.voice().is_some() {
        MessageKind::Voice
    } else if msg.document().is_some() {
        MessageKind::Document
    } else if msg.sticker().is_some() {
        MessageKind::Sticker
    } else if text.starts_with('/') {
        MessageKind::Command
    } else {
        MessageKind::Text
    }
}

/// Media attachments as `(file_id, mime)` pairs.
///
/// Telegram media is addressed by file id, not URL; downstream consumers
/// resolve ids through the Bot API when they need bytes.
fn media_refs(msg: &Message) -> Vec<(String, String)> {
    let mut media = Vec::new();

    if let Some(photos) = msg.photo() {
        // Highest resolution is last.
        if let Some(photo) = photos.last() {
            media.push((photo.file.id.clone(), "image/jpeg".to_string()));
        }
    }
    if let Some(video) = msg.video() {
        let mime = video
            .mime_type
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "video/mp4".to_string());
        media.push((video.file.id.clone(), mime));
    }
    if let Some(audio) = msg.audio() {
        let mime = audio
            .mime_type
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "audio/mpeg".to_string());
        media.push((audio.file.id.clone(), mime));
    }
    if let Some(voice) = msg.voice() {
        let mime = voice
            .mime_type
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "audio/ogg".to_string());
        media.push((voice.file.id.clone(), mime));
    }
    if let Some(doc) = msg.document() {
        let mime = doc
            .mime_type
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        media.push((doc.file.id.clone(), mime));
    }
    if let Some(sticker) = msg.sticker() {
        media.push((sticker.file.id.clone(), "image/webp".to_string()));
    }

    media
}

fn build_source(msg: &Message) -> SessionSource {
    let chat = &msg.chat;
    let thread_id = msg.thread_id.map(|t| t.0 .0.to_string());

    let chat_kind = if chat.is_private() {
        ChatKind::Dm
    } else if chat.is_channel() {
        ChatKind::Channel
    } else if thread_id.is_some() {
        // Supergroup forum topic; keep the topic separate from the
        // parent group's session.
        ChatKind::Forum
    } else {
        ChatKind::Group
    };

    let chat_name = chat
        .title()
        .map(String::from)
        .or_else(|| chat.username().map(String::from));

    SessionSource {
        platform: Platform::Telegram,
        chat_id: chat.id.0.to_string(),
        chat_name,
        chat_kind,
        user_id: msg.from.as_ref().map(|u| u.id.0.to_string()),
        user_name: msg.from.as_ref().map(|u| u.full_name()),
        thread_id,
    }
}
