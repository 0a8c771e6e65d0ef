//! Channel directory: name to chat-id lookup per platform.
//!
//! Populated lazily from adapters' best-effort chat listings; consulted
//! when a delivery target names a channel by its human-readable name
//! instead of an id.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use hermes_core::{ChatKind, Platform};

/// One chat known to the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub id: String,
    pub name: String,
    pub kind: ChatKind,
}

struct Snapshot {
    entries: Vec<ChannelEntry>,
    fetched_at: Instant,
}

/// TTL-bounded per-platform membership cache. Single writer (the adapter
/// refresh), many readers (the router).
pub struct ChannelDirectory {
    ttl: Duration,
    cache: DashMap<Platform, Snapshot>,
}

impl ChannelDirectory {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: DashMap::new(),
        }
    }

    /// Replace the snapshot for `platform`.
    pub fn update(&self, platform: Platform, entries: Vec<ChannelEntry>) {
        self.cache.insert(
            platform,
            Snapshot {
                entries,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Current entries for `platform`, or `None` when the snapshot is
    /// missing or expired.
    pub fn entries(&self, platform: Platform) -> Option<Vec<ChannelEntry>> {
        let snapshot = self.cache.get(&platform)?;
        if snapshot.fetched_at.elapsed() > self.ttl {
            return None;
        }
        Some(snapshot.entries.clone())
    }

    /// Resolve a chat reference to a concrete id.
    ///
    /// Accepts an exact id, a name, or a `#name`; name matching is
    /// case-insensitive. Returns `None` when nothing matches or the
    /// snapshot has expired.
    pub fn resolve(&self, platform: Platform, reference: &str) -> Option<String> {
        let entries = self.entries(platform)?;
        let wanted = reference.strip_prefix('#').unwrap_or(reference);

        if let Some(entry) = entries.iter().find(|e| e.id == wanted) {
            return Some(entry.id.clone());
        }
        entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(wanted))
            .map(|e| e.id.clone())
    }
}

impl Default for ChannelDirectory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<ChannelEntry> {
        vec![
            ChannelEntry {
                id: "100".to_string(),
                name: "general".to_string(),
                kind: ChatKind::Channel,
            },
            ChannelEntry {
                id: "200".to_string(),
                name: "Alerts".to_string(),
                kind: ChatKind::Channel,
            },
        ]
    }

    #[test]
    fn resolves_by_id_name_and_hash_name() {
        let dir = ChannelDirectory::default();
        dir.update(Platform::Discord, entries());

        assert_eq!(dir.resolve(Platform::Discord, "100").as_deref(), Some("100"));
        assert_eq!(dir.resolve(Platform::Discord, "general").as_deref(), Some("100"));
        assert_eq!(dir.resolve(Platform::Discord, "#general").as_deref(), Some("100"));
        assert_eq!(dir.resolve(Platform::Discord, "alerts").as_deref(), Some("200"));
        assert_eq!(dir.resolve(Platform::Discord, "nope"), None);
    }

    #[test]
    fn unknown_platform_resolves_to_none() {
        let dir = ChannelDirectory::default();
        dir.update(Platform::Discord, entries());
        assert_eq!(dir.resolve(Platform::Telegram, "general"), None);
    }

    #[test]
    fn expired_snapshot_is_dropped() {
        let dir = ChannelDirectory::new(Duration::ZERO);
        dir.update(Platform::Discord, entries());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(dir.resolve(Platform::Discord, "general"), None);
        assert!(dir.entries(Platform::Discord).is_none());
    }
}
