//! Interface to the external agent engine.
//!
//! The gateway never looks inside a conversation: it hands the engine a
//! prompt, the session history, and an interrupt latch, and gets back a
//! final response. LLM calls, tool execution, and context compression all
//! live behind this trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::interrupt::InterruptHandle;
use crate::types::HistoryEntry;

/// Result of one agent conversation.
#[derive(Debug, Clone, Default)]
pub struct AgentResponse {
    /// The text the user should see.
    pub final_response: String,
    /// Full message transcript of the turn (agent-opaque blobs), appended
    /// to the session history by the invoker.
    pub messages: Vec<HistoryEntry>,
    /// False when the turn was cut short by an interrupt; the partial
    /// `final_response` is still delivered.
    pub completed: bool,
}

/// The opaque conversational engine the gateway drives.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    /// Run one conversation turn.
    ///
    /// `history` is the prior conversation (empty for fresh cron sessions).
    /// When `interrupt` is supplied the engine must check it between tool
    /// calls and between streaming chunks, returning early with
    /// `completed = false` once it is set.
    async fn run_conversation(
        &self,
        prompt: &str,
        session_id: &str,
        history: &[HistoryEntry],
        interrupt: Option<InterruptHandle>,
    ) -> Result<AgentResponse>;
}
