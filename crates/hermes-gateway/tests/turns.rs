//! End-to-end turn scheduler scenarios with a scripted agent engine and a
//! recording stub adapter.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};

use hermes_channels::adapter::{ChatInfo, PlatformAdapter, SendResult};
use hermes_channels::{ChannelDirectory, DeliveryRouter};
use hermes_core::{
    AgentEngine, AgentResponse, ChatKind, GatewayConfig, HistoryEntry, InterruptHandle,
    MessageEvent, Platform, PlatformConfig, SessionSource,
};
use hermes_gateway::invoker::AgentInvoker;
use hermes_gateway::turns::TurnScheduler;
use hermes_sessions::SessionStore;

struct RecordingAdapter {
    texts: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl PlatformAdapter for RecordingAdapter {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn connect(&self) -> hermes_channels::Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> hermes_channels::Result<()> {
        Ok(())
    }

    async fn send_text(
        &self,
        chat_id: &str,
        content: &str,
        _reply_to: Option<&str>,
        _metadata: Option<&serde_json::Value>,
    ) -> SendResult {
        self.texts
            .lock()
            .await
            .push((chat_id.to_string(), content.to_string()));
        SendResult::ok(Some("1".to_string()))
    }

    async fn send_image(
        &self,
        _chat_id: &str,
        _url: &str,
        _caption: Option<&str>,
        _reply_to: Option<&str>,
    ) -> SendResult {
        SendResult::ok(None)
    }

    async fn send_document(
        &self,
        _chat_id: &str,
        _path: &Path,
        _caption: Option<&str>,
    ) -> SendResult {
        SendResult::ok(None)
    }

    async fn send_typing(&self, _chat_id: &str) {}

    async fn get_chat_info(&self, chat_id: &str) -> hermes_channels::Result<ChatInfo> {
        Ok(ChatInfo {
            name: chat_id.to_string(),
            kind: ChatKind::Dm,
        })
    }
}

/// Engine whose `"A"` turn blocks until the test releases it, recording
/// the interrupt state observed at entry and at release.
struct ScriptedEngine {
    calls: std::sync::Mutex<Vec<(String, bool)>>,
    a_started: Notify,
    a_release: Notify,
}

impl ScriptedEngine {
    fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
            a_started: Notify::new(),
            a_release: Notify::new(),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }
}

#[async_trait]
impl AgentEngine for ScriptedEngine {
    async fn run_conversation(
        &self,
        prompt: &str,
        _session_id: &str,
        _history: &[HistoryEntry],
        interrupt: Option<InterruptHandle>,
    ) -> hermes_core::Result<AgentResponse> {
        let interrupted_at_entry = interrupt.as_ref().map(|h| h.is_set()).unwrap_or(false);
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), interrupted_at_entry));

        if prompt == "A" {
            self.a_started.notify_one();
            self.a_release.notified().await;
            let interrupted = interrupt.as_ref().map(|h| h.is_set()).unwrap_or(false);
            return Ok(AgentResponse {
                final_response: "par".to_string(),
                messages: Vec::new(),
                completed: !interrupted,
            });
        }

        Ok(AgentResponse {
            final_response: format!("done: {prompt}"),
            messages: Vec::new(),
            completed: true,
        })
    }
}

struct Fixture {
    _state: tempfile::TempDir,
    scheduler: TurnScheduler,
    adapter: Arc<RecordingAdapter>,
    engine: Arc<ScriptedEngine>,
    store: Arc<SessionStore>,
}

fn fixture() -> Fixture {
    let state = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::default();
    config.state_dir = state.path().to_path_buf();
    config.platforms.insert(
        Platform::Telegram,
        PlatformConfig {
            enabled: true,
            token: Some("token".to_string()),
            ..Default::default()
        },
    );
    let config = Arc::new(config);

    let adapter = Arc::new(RecordingAdapter {
        texts: Mutex::new(Vec::new()),
    });
    let adapters: Arc<DashMap<Platform, Arc<dyn PlatformAdapter>>> = Arc::new(DashMap::new());
    adapters.insert(Platform::Telegram, adapter.clone() as Arc<dyn PlatformAdapter>);

    let store = Arc::new(SessionStore::new(config.sessions_dir()));
    let router = Arc::new(DeliveryRouter::new(
        Arc::clone(&config),
        Arc::clone(&adapters),
        Arc::new(ChannelDirectory::default()),
    ));
    let engine = Arc::new(ScriptedEngine::new());
    let invoker = Arc::new(AgentInvoker::new(
        config,
        Arc::clone(&store),
        engine.clone() as Arc<dyn AgentEngine>,
        router,
        adapters,
    ));

    Fixture {
        _state: state,
        scheduler: TurnScheduler::new(invoker),
        adapter,
        engine,
        store,
    }
}

fn source() -> SessionSource {
    SessionSource {
        platform: Platform::Telegram,
        chat_id: "42".to_string(),
        chat_name: None,
        chat_kind: ChatKind::Dm,
        user_id: Some("7".to_string()),
        user_name: None,
        thread_id: None,
    }
}

async fn wait_for_idle(scheduler: &TurnScheduler) {
    for _ in 0..500 {
        if scheduler.active_sessions() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scheduler did not go idle");
}

#[tokio::test(flavor = "multi_thread")]
async fn single_message_no_interruption() {
    let fx = fixture();
    fx.scheduler.submit(MessageEvent::text("hi", source()));
    wait_for_idle(&fx.scheduler).await;

    let texts = fx.adapter.texts.lock().await;
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].0, "42");
    assert_eq!(texts[0].1, "done: hi");

    let context = fx.store.get(&source().session_key()).await.unwrap();
    assert_eq!(context.history.len(), 2);
    assert_eq!(context.history[0].role, "user");
    assert_eq!(context.history[1].role, "assistant");
    assert_eq!(context.turn_count, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn interruption_replaces_pending() {
    let fx = fixture();

    fx.scheduler.submit(MessageEvent::text("A", source()));
    fx.engine.a_started.notified().await;

    // Two rapid-fire events while A's turn runs: C replaces B.
    fx.scheduler.submit(MessageEvent::text("B", source()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    fx.scheduler.submit(MessageEvent::text("C", source()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    fx.engine.a_release.notify_one();

    wait_for_idle(&fx.scheduler).await;

    // A delivered its partial output, then C ran; B never drove a turn.
    let texts = fx.adapter.texts.lock().await;
    let bodies: Vec<&str> = texts.iter().map(|(_, t)| t.as_str()).collect();
    assert_eq!(bodies, vec!["par", "done: C"]);
    assert_eq!(fx.engine.prompts(), vec!["A", "C"]);

    // The interrupt raised during A was cleared before C's agent call.
    let calls = fx.engine.calls.lock().unwrap();
    let (_, c_saw_interrupt) = calls[1].clone();
    assert!(!c_saw_interrupt, "interrupt must be cleared between turns");
    drop(calls);

    // Both turns are in the history: A's partial and C's reply.
    let context = fx.store.get(&source().session_key()).await.unwrap();
    assert_eq!(context.turn_count, 2);
    assert_eq!(context.history.len(), 4);
    assert_eq!(context.history[0].content, "A");
    assert_eq!(context.history[1].content, "par");
    assert_eq!(context.history[2].content, "C");
}

#[tokio::test(flavor = "multi_thread")]
async fn explicit_reset_command_skips_the_agent() {
    let fx = fixture();

    // Seed a session with history.
    let context = fx
        .store
        .load_or_create(&source(), None, Utc::now())
        .await
        .unwrap();
    let entries: Vec<HistoryEntry> = (0..10)
        .map(|i| HistoryEntry::new("user", format!("m{i}")))
        .collect();
    fx.store
        .append(&context.key, entries, Utc::now())
        .await
        .unwrap();

    fx.scheduler.submit(MessageEvent::text("/new", source()));
    wait_for_idle(&fx.scheduler).await;

    assert!(fx.engine.prompts().is_empty(), "no agent call on reset");
    let texts = fx.adapter.texts.lock().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].1.contains("reset"));

    let after = fx.store.get(&context.key).await.unwrap();
    assert!(after.history.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn sessions_run_concurrently() {
    let fx = fixture();

    let mut other = source();
    other.chat_id = "43".to_string();

    // "A" blocks until released; the other session's turn must complete
    // while A is still running.
    fx.scheduler.submit(MessageEvent::text("A", source()));
    fx.engine.a_started.notified().await;
    fx.scheduler.submit(MessageEvent::text("other chat", other));

    for _ in 0..500 {
        if fx.scheduler.active_sessions() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(fx.scheduler.active_sessions(), 1, "A still active");

    fx.engine.a_release.notify_one();
    wait_for_idle(&fx.scheduler).await;

    let texts = fx.adapter.texts.lock().await;
    let bodies: Vec<&str> = texts.iter().map(|(_, t)| t.as_str()).collect();
    assert!(bodies.contains(&"done: other chat"));
}
