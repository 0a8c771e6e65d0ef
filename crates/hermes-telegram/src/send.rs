//! Outbound send helpers for the Telegram adapter.
//!
//! Tries MarkdownV2 first and falls back to plain text when Telegram
//! rejects the parse mode. Transport-class failures are retried with the
//! shared backoff before being reported.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode, ReplyParameters};
use teloxide::RequestError;
use tracing::warn;

use hermes_channels::adapter::SendResult;
use hermes_channels::backoff::with_backoff;
use hermes_channels::split::{split_message, TELEGRAM_LIMIT};

/// Escape special characters for Telegram MarkdownV2.
///
/// MarkdownV2 requires escaping: `_ * [ ] ( ) ~ ` # + - = | { } . !`
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '#' | '+' | '-' | '=' | '|' | '{'
            | '}' | '.' | '!' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Connection-level failures worth retrying; API rejections are not.
fn is_transport_error(e: &RequestError) -> bool {
    matches!(
        e,
        RequestError::Network(_) | RequestError::Io(_) | RequestError::RetryAfter(_)
    )
}

/// Send `text` to `chat_id` in chunks within the Telegram limit.
///
/// Each chunk goes out as MarkdownV2; a parse-mode rejection downgrades
/// that chunk to plain text. A short delay between chunks keeps the bot
/// under the per-chat rate limit.
pub async fn send_chunked(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    reply_to: Option<MessageId>,
) -> SendResult {
    let chunks = split_message(text, TELEGRAM_LIMIT);
    let mut first_id: Option<String> = None;

    for (i, chunk) in chunks.iter().enumerate() {
        // Reply linkage only on the first chunk.
        let reply = if i == 0 { reply_to } else { None };
        match send_one(bot, chat_id, chunk, reply).await {
            Ok(id) => {
                if first_id.is_none() {
                    first_id = Some(id);
                }
            }
            Err(e) => {
                warn!(error = %e, chunk_index = i, "Telegram: chunk send failed");
                return SendResult::failed(format!("Transport error: {e}"));
            }
        }

        if i + 1 < chunks.len() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    SendResult::ok(first_id)
}

/// Send a single chunk, retrying transport errors with backoff.
async fn send_one(
    bot: &Bot,
    chat_id: ChatId,
    chunk: &str,
    reply_to: Option<MessageId>,
) -> Result<String, RequestError> {
    with_backoff("telegram send", || async {
        let escaped = escape_markdown_v2(chunk);
        let mut request = bot
            .send_message(chat_id, &escaped)
            .parse_mode(ParseMode::MarkdownV2);
        if let Some(id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(id));
        }

        match request.await {
            Ok(msg) => Ok(msg.id.0.to_string()),
            Err(e) if is_transport_error(&e) => Err(e),
            Err(_) => {
                // MarkdownV2 rejected; resend this chunk as plain text.
                let mut plain = bot.send_message(chat_id, chunk);
                if let Some(id) = reply_to {
                    plain = plain.reply_parameters(ReplyParameters::new(id));
                }
                plain.await.map(|msg| msg.id.0.to_string())
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_markdown_v2_escapes_specials() {
        let input = "Hello. World! (test) [link] ~strike~";
        let escaped = escape_markdown_v2(input);
        assert!(escaped.contains("\\."));
        assert!(escaped.contains("\\!"));
        assert!(escaped.contains("\\("));
        assert!(escaped.contains("\\)"));
        assert!(escaped.contains("\\["));
        assert!(escaped.contains("\\]"));
        assert!(escaped.contains("\\~"));
    }

    #[test]
    fn escape_markdown_v2_leaves_normal_chars() {
        let input = "Hello world 123 abc";
        assert_eq!(escape_markdown_v2(input), input);
    }
}
