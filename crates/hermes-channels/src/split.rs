//! Message splitter shared by all adapters.
//!
//! Platforms cap message length (Telegram 4096, Discord 2000, Slack 4000).
//! Long content is split preferring a newline, then a space, then a hard
//! cut, and the remainder of each chunk boundary is left-trimmed.

/// Telegram message character limit.
pub const TELEGRAM_LIMIT: usize = 4096;
/// Discord message character limit.
pub const DISCORD_LIMIT: usize = 2000;
/// Slack message character limit.
pub const SLACK_LIMIT: usize = 4000;

/// Split `content` into chunks of at most `max_len` bytes.
///
/// Content at or under the limit comes back as a single chunk. Joining the
/// chunks reproduces the original up to the whitespace consumed at chunk
/// boundaries.
pub fn split_message(content: &str, max_len: usize) -> Vec<String> {
    if content.len() <= max_len {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = content;
    while !rest.is_empty() {
        if rest.len() <= max_len {
            chunks.push(rest.to_string());
            break;
        }

        // Largest prefix within the limit that ends on a char boundary.
        let mut cut = max_len;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let window = &rest[..cut];

        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(cut);

        chunks.push(rest[..split_at].to_string());
        rest = rest[split_at..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(split_message("hello", 100), vec!["hello"]);
    }

    #[test]
    fn exactly_at_limit_does_not_split() {
        let text = "a".repeat(100);
        assert_eq!(split_message(&text, 100), vec![text]);
    }

    #[test]
    fn one_over_limit_splits_at_nearest_newline() {
        let text = format!("{}\n{}", "a".repeat(40), "b".repeat(60));
        let chunks = split_message(&text, 100);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(40));
        assert_eq!(chunks[1], "b".repeat(60));
    }

    #[test]
    fn falls_back_to_space_when_no_newline() {
        let text = format!("{} {}", "a".repeat(50), "b".repeat(60));
        let chunks = split_message(&text, 100);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(50));
        assert_eq!(chunks[1], "b".repeat(60));
    }

    #[test]
    fn hard_cut_when_no_whitespace() {
        let text = "x".repeat(250);
        let chunks = split_message(&text, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn every_chunk_is_within_limit() {
        let text = "word ".repeat(2000);
        for chunk in split_message(&text, 137) {
            assert!(chunk.len() <= 137, "chunk too large: {}", chunk.len());
        }
    }

    #[test]
    fn roundtrip_up_to_whitespace() {
        let text = "the quick brown fox\njumps over the lazy dog. ".repeat(60);
        let chunks = split_message(&text, 97);
        let rejoined: String = chunks.join(" ");
        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalize(&rejoined), normalize(&text));
    }

    #[test]
    fn multibyte_content_never_splits_a_char() {
        let text = "héllo wörld ".repeat(40);
        for chunk in split_message(&text, 50) {
            assert!(chunk.len() <= 50);
            // Would have panicked on a bad boundary already; double-check.
            assert!(std::str::from_utf8(chunk.as_bytes()).is_ok());
        }
    }
}
