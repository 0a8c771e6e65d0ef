//! Agent invoker: runs one turn end to end.
//!
//! Bridges a scheduled turn to the external agent engine: loads the
//! session (applying the reset policy), short-circuits explicit reset
//! commands, keeps the typing indicator alive, splits the response into
//! text and attachments, delivers to the origin, and appends the turn to
//! the session history.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use hermes_channels::{
    DeliveryMeta, DeliveryRouter, DeliveryTarget, OutboundPayload, PlatformAdapter,
};
use hermes_core::config::TYPING_REFRESH_SECS;
use hermes_core::{
    AgentEngine, GatewayConfig, HistoryEntry, InterruptHandle, MessageEvent, Platform,
    SessionSource,
};
use hermes_sessions::{SessionContext, SessionStore};

pub struct AgentInvoker {
    config: Arc<GatewayConfig>,
    store: Arc<SessionStore>,
    engine: Arc<dyn AgentEngine>,
    router: Arc<DeliveryRouter>,
    adapters: Arc<DashMap<Platform, Arc<dyn PlatformAdapter>>>,
}

impl AgentInvoker {
    pub fn new(
        config: Arc<GatewayConfig>,
        store: Arc<SessionStore>,
        engine: Arc<dyn AgentEngine>,
        router: Arc<DeliveryRouter>,
        adapters: Arc<DashMap<Platform, Arc<dyn PlatformAdapter>>>,
    ) -> Self {
        Self {
            config,
            store,
            engine,
            router,
            adapters,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Run one turn for `event`. All failures are contained here: the
    /// session survives, the user gets a brief error, details go to logs.
    pub async fn run_turn(&self, event: &MessageEvent, interrupt: &InterruptHandle) {
        let source = &event.source;
        let key = source.session_key();

        if self.config.is_reset_trigger(&event.text) {
            match self.store.reset(&key).await {
                Ok(_) => {
                    debug!(key = %key, "session reset by command");
                    self.reply(source, "Session reset. Starting a fresh conversation.")
                        .await;
                }
                Err(e) => {
                    error!(key = %key, error = %e, "session reset failed");
                    self.reply(source, "Could not reset the session.").await;
                }
            }
            return;
        }

        let policy = self.config.reset_policy(source.platform, source.chat_kind);
        let context = match self
            .store
            .load_or_create(source, Some(&policy), Utc::now())
            .await
        {
            Ok(context) => context,
            Err(e) => {
                // Store trouble must not kill the turn; continue with a
                // fresh in-memory context.
                error!(key = %key, error = %e, "session load failed, starting fresh");
                SessionContext::new(source.clone())
            }
        };

        let _typing = TypingGuard::start(
            Arc::clone(&self.adapters),
            source.platform,
            source.chat_id.clone(),
        );

        let result = self
            .engine
            .run_conversation(
                &event.text,
                &key.to_string(),
                &context.history,
                Some(interrupt.clone()),
            )
            .await;

        match result {
            Ok(response) => {
                if !response.completed {
                    debug!(key = %key, "turn interrupted, delivering partial output");
                }
                if !response.final_response.is_empty() {
                    let payload = OutboundPayload::from_response(&response.final_response);
                    self.deliver_to_origin(source, &payload).await;
                }

                let mut entries = vec![HistoryEntry::new("user", &event.text)];
                if response.messages.is_empty() {
                    entries.push(HistoryEntry::new("assistant", &response.final_response));
                } else {
                    entries.extend(response.messages);
                }
                if let Err(e) = self.store.append(&key, entries, Utc::now()).await {
                    error!(key = %key, error = %e, "failed to append turn to session");
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "agent turn failed");
                let entries = vec![
                    HistoryEntry::new("user", &event.text),
                    HistoryEntry::new("system", format!("(turn failed: {e})"))
                        .with_metadata(serde_json::json!({"failed": true})),
                ];
                if let Err(store_err) = self.store.append(&key, entries, Utc::now()).await {
                    error!(key = %key, error = %store_err, "failed to record failed turn");
                }
                self.reply(source, &format!("⚠️ Error: {e}")).await;
            }
        }
    }

    /// Deliver a plain text message back to the origin.
    async fn reply(&self, source: &SessionSource, text: &str) {
        let payload = OutboundPayload::text_only(text);
        self.deliver_to_origin(source, &payload).await;
    }

    async fn deliver_to_origin(&self, source: &SessionSource, payload: &OutboundPayload) {
        // Exactly the origin; the always-log-local append is for routed
        // job outputs, not chat replies.
        let targets = match DeliveryTarget::parse("origin", Some(source)) {
            Ok(target) => vec![target],
            Err(e) => {
                error!(error = %e, "origin target unresolvable");
                return;
            }
        };
        let results = self
            .router
            .deliver(payload, &targets, &DeliveryMeta::default())
            .await;
        for (target, result) in &results {
            if !result.success {
                warn!(target = %target,
                      error = result.error.as_deref().unwrap_or("unknown"),
                      "origin delivery failed");
            }
            for attachment_error in &result.attachment_errors {
                warn!(target = %target, error = %attachment_error, "attachment delivery failed");
            }
        }
    }
}

/// Keeps the platform typing indicator alive while a turn runs.
///
/// The refresh task is aborted on drop, so every exit path stops it,
/// including panic unwind.
struct TypingGuard {
    handle: JoinHandle<()>,
}

impl TypingGuard {
    fn start(
        adapters: Arc<DashMap<Platform, Arc<dyn PlatformAdapter>>>,
        platform: Platform,
        chat_id: String,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                let adapter = adapters.get(&platform).map(|a| Arc::clone(a.value()));
                if let Some(adapter) = adapter {
                    adapter.send_typing(&chat_id).await;
                }
                tokio::time::sleep(Duration::from_secs(TYPING_REFRESH_SECS)).await;
            }
        });
        Self { handle }
    }
}

impl Drop for TypingGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
