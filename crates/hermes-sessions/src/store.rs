use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use hermes_core::{HistoryEntry, ResetPolicy, SessionKey, SessionSource};

use crate::error::Result;
use crate::reset::should_reset;
use crate::types::SessionContext;

/// Durable key → [`SessionContext`] map, one JSON file per session under
/// `sessions/<platform>/<chat_id>[_<thread_id>].json`.
///
/// Every key has its own async lock held for the duration of one mutation;
/// operations on different sessions never contend. Writes are crash-safe:
/// serialize to a temp file, then rename over the blob.
pub struct SessionStore {
    root: PathBuf,
    locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

impl SessionStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: DashMap::new(),
        }
    }

    /// Return the session for `source`, creating a fresh one when none
    /// exists or when `policy` demands a reset at `now`.
    ///
    /// A corrupt blob is logged and replaced with a fresh context rather
    /// than failing the turn.
    pub async fn load_or_create(
        &self,
        source: &SessionSource,
        policy: Option<&ResetPolicy>,
        now: DateTime<Utc>,
    ) -> Result<SessionContext> {
        let key = source.session_key();
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let existing = self.read_blob(&key).await;
        let context = match existing {
            Some(ctx) => {
                let stale = policy
                    .map(|p| should_reset(p, ctx.last_activity_at, now))
                    .unwrap_or(false);
                if stale {
                    debug!(key = %key, "reset policy fired, replacing session");
                    let fresh = SessionContext::new(source.clone());
                    self.write_blob(&fresh).await?;
                    fresh
                } else {
                    ctx
                }
            }
            None => {
                let fresh = SessionContext::new(source.clone());
                self.write_blob(&fresh).await?;
                fresh
            }
        };
        Ok(context)
    }

    /// Immutable snapshot of a session, or `None` when it does not exist.
    pub async fn get(&self, key: &SessionKey) -> Option<SessionContext> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        self.read_blob(key).await
    }

    /// Append one turn's history entries and bump the turn counter.
    ///
    /// Call once per completed turn; `entries` is everything the turn
    /// produced (user message, assistant reply, tool transcripts).
    pub async fn append(
        &self,
        key: &SessionKey,
        entries: Vec<HistoryEntry>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        let mut ctx = match self.read_blob(key).await {
            Some(ctx) => ctx,
            None => return Ok(()), // session was reset concurrently; nothing to extend
        };
        ctx.history.extend(entries);
        ctx.turn_count += 1;
        ctx.touch(now);
        self.write_blob(&ctx).await
    }

    /// Update `last_activity_at` without touching the history.
    pub async fn touch(&self, key: &SessionKey, now: DateTime<Utc>) -> Result<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        if let Some(mut ctx) = self.read_blob(key).await {
            ctx.touch(now);
            self.write_blob(&ctx).await?;
        }
        Ok(())
    }

    /// Atomically replace the session with an empty one, preserving the
    /// source. Returns the fresh context, or `None` when no session
    /// existed.
    pub async fn reset(&self, key: &SessionKey) -> Result<Option<SessionContext>> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        match self.read_blob(key).await {
            Some(old) => {
                let fresh = SessionContext::new(old.source);
                self.write_blob(&fresh).await?;
                Ok(Some(fresh))
            }
            None => Ok(None),
        }
    }

    // --- blob I/O -----------------------------------------------------------

    fn lock_for(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn blob_path(&self, key: &SessionKey) -> PathBuf {
        // Chat ids are opaque platform strings; keep them filesystem-safe.
        let stem = key.file_stem().replace(['/', '\\'], "_");
        self.root
            .join(key.platform.as_str())
            .join(format!("{stem}.json"))
    }

    async fn read_blob(&self, key: &SessionKey) -> Option<SessionContext> {
        let path = self.blob_path(key);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice::<SessionContext>(&bytes) {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                warn!(key = %key, path = %path.display(), error = %e,
                      "corrupt session blob, discarding");
                None
            }
        }
    }

    async fn write_blob(&self, ctx: &SessionContext) -> Result<()> {
        let path = self.blob_path(&ctx.key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(ctx)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
