//! Response gate for non-DM chats.
//!
//! In groups and channels the bot stays quiet unless it is @-mentioned.
//! A chat on the free-response allowlist responds to everything; the
//! allowlist wins over the global `require_mention` flag.

use hermes_core::{MessageEvent, PlatformConfig};

/// Should this event produce a response?
///
/// `mentioned` is the adapter's verdict on whether the bot was addressed
/// (platform mention syntax differs; the adapter knows its own).
pub fn should_respond(config: &PlatformConfig, event: &MessageEvent, mentioned: bool) -> bool {
    if event.source.is_dm() {
        return true;
    }
    if config
        .free_response_chats
        .iter()
        .any(|id| id == &event.source.chat_id)
    {
        return true;
    }
    if !config.require_mention {
        return true;
    }
    mentioned
}

/// True when `text` contains an `@name` mention of the bot.
pub fn contains_mention(text: &str, bot_name: &str) -> bool {
    if bot_name.is_empty() {
        return false;
    }
    text.contains(&format!("@{bot_name}"))
}

/// Remove bot self-mentions so the agent sees clean input.
///
/// `mentions` holds the raw mention tokens the adapter knows for itself
/// (e.g. `@botname`, `<@1234>`, `<@!1234>`).
pub fn strip_mentions(text: &str, mentions: &[String]) -> String {
    let mut cleaned = text.to_string();
    for mention in mentions {
        if mention.is_empty() {
            continue;
        }
        cleaned = cleaned.replace(mention.as_str(), "");
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::{ChatKind, Platform, SessionSource};

    fn event(kind: ChatKind, chat_id: &str) -> MessageEvent {
        MessageEvent::text(
            "hello",
            SessionSource {
                platform: Platform::Discord,
                chat_id: chat_id.to_string(),
                chat_name: None,
                chat_kind: kind,
                user_id: None,
                user_name: None,
                thread_id: None,
            },
        )
    }

    fn config(require_mention: bool, free: &[&str]) -> PlatformConfig {
        PlatformConfig {
            enabled: true,
            token: Some("t".to_string()),
            home_channel: None,
            require_mention,
            free_response_chats: free.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn dms_always_respond() {
        let cfg = config(true, &[]);
        assert!(should_respond(&cfg, &event(ChatKind::Dm, "1"), false));
    }

    #[test]
    fn group_requires_mention_by_default() {
        let cfg = config(true, &[]);
        assert!(!should_respond(&cfg, &event(ChatKind::Group, "1"), false));
        assert!(should_respond(&cfg, &event(ChatKind::Group, "1"), true));
    }

    #[test]
    fn free_response_list_wins_over_mention_flag() {
        let cfg = config(true, &["42"]);
        assert!(should_respond(&cfg, &event(ChatKind::Channel, "42"), false));
        assert!(!should_respond(&cfg, &event(ChatKind::Channel, "43"), false));
    }

    #[test]
    fn mention_flag_disabled_opens_all_chats() {
        let cfg = config(false, &[]);
        assert!(should_respond(&cfg, &event(ChatKind::Group, "9"), false));
    }

    #[test]
    fn mention_detection() {
        assert!(contains_mention("hey @hermes, ping", "hermes"));
        assert!(!contains_mention("hey hermes", "hermes"));
        assert!(!contains_mention("@anything", ""));
    }

    #[test]
    fn strip_removes_all_known_mention_forms() {
        let mentions = vec!["<@1234>".to_string(), "<@!1234>".to_string()];
        assert_eq!(strip_mentions("<@1234> do the thing", &mentions), "do the thing");
        assert_eq!(strip_mentions("do <@!1234> the thing", &mentions), "do the thing");
        assert_eq!(strip_mentions("no mention here", &mentions), "no mention here");
    }
}
