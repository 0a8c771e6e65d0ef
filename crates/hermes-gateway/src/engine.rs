//! Subprocess bridge to the external agent engine.
//!
//! The gateway never implements conversations itself: it invokes the
//! configured agent command once per turn. The prompt arrives on stdin; a
//! JSON request file (session id, model, history) is passed as the last
//! argument; the response comes back on stdout, either as a JSON object
//! (`{"final_response": …, "completed": …}`) or as plain text.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use hermes_core::{
    AgentConfig, AgentEngine, AgentResponse, GatewayError, HistoryEntry, InterruptHandle, Result,
};

/// How often the bridge checks the interrupt latch while the agent runs.
const INTERRUPT_POLL_MS: u64 = 250;

pub struct ProcessAgentEngine {
    config: AgentConfig,
}

impl ProcessAgentEngine {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AgentEngine for ProcessAgentEngine {
    async fn run_conversation(
        &self,
        prompt: &str,
        session_id: &str,
        history: &[HistoryEntry],
        interrupt: Option<InterruptHandle>,
    ) -> Result<AgentResponse> {
        // Request file keeps the argv short and the history off the
        // command line.
        let request = serde_json::json!({
            "session_id": session_id,
            "model": self.config.model,
            "history": history,
        });
        let request_file = tempfile::Builder::new()
            .prefix("hermes-req-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| GatewayError::Agent(format!("request file: {e}")))?;
        std::fs::write(request_file.path(), serde_json::to_vec(&request)?)
            .map_err(|e| GatewayError::Agent(format!("request file: {e}")))?;

        debug!(
            command = %self.config.command,
            session = %session_id,
            prompt_len = prompt.len(),
            history_len = history.len(),
            "invoking agent engine"
        );

        let mut child = tokio::process::Command::new(&self.config.command)
            .args(&self.config.args)
            .arg(request_file.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GatewayError::Agent(format!("spawn {}: {e}", self.config.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| GatewayError::Agent(format!("write prompt: {e}")))?;
        }

        let mut stdout = child.stdout.take().expect("stdout piped");
        let mut output: Vec<u8> = Vec::new();
        let mut buf = [0u8; 8192];
        let mut interrupted = false;

        loop {
            tokio::select! {
                read = stdout.read(&mut buf) => {
                    match read {
                        Ok(0) => break,
                        Ok(n) => output.extend_from_slice(&buf[..n]),
                        Err(e) => {
                            return Err(GatewayError::Agent(format!("read agent output: {e}")));
                        }
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(INTERRUPT_POLL_MS)),
                    if interrupt.is_some() && !interrupted =>
                {
                    if interrupt.as_ref().map(|h| h.is_set()).unwrap_or(false) {
                        // The engine is contractually required to exit on
                        // its own once signalled; the kill is the backstop.
                        interrupted = true;
                        let _ = child.start_kill();
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| GatewayError::Agent(format!("wait: {e}")))?;
        let text = String::from_utf8_lossy(&output).trim().to_string();

        if interrupted {
            debug!(session = %session_id, partial_len = text.len(), "agent turn interrupted");
            return Ok(AgentResponse {
                final_response: text,
                messages: Vec::new(),
                completed: false,
            });
        }
        if !status.success() {
            let mut stderr_text = String::new();
            if let Some(mut stderr) = child.stderr.take() {
                let _ = stderr.read_to_string(&mut stderr_text).await;
            }
            warn!(session = %session_id, status = %status, "agent engine exited with failure");
            return Err(GatewayError::Agent(format!(
                "agent exited with {status}: {}",
                stderr_text.trim()
            )));
        }

        Ok(parse_response(&text))
    }
}

/// Accept either the structured JSON reply or bare text.
fn parse_response(text: &str) -> AgentResponse {
    #[derive(serde::Deserialize)]
    struct Wire {
        final_response: String,
        #[serde(default)]
        messages: Vec<HistoryEntry>,
        #[serde(default = "default_true")]
        completed: bool,
    }
    fn default_true() -> bool {
        true
    }

    match serde_json::from_str::<Wire>(text) {
        Ok(wire) => AgentResponse {
            final_response: wire.final_response,
            messages: wire.messages,
            completed: wire.completed,
        },
        Err(_) => AgentResponse {
            final_response: text.to_string(),
            messages: Vec::new(),
            completed: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_reply_is_parsed() {
        let response =
            parse_response(r#"{"final_response": "hi", "completed": false}"#);
        assert_eq!(response.final_response, "hi");
        assert!(!response.completed);
    }

    #[test]
    fn bare_text_is_the_final_response() {
        let response = parse_response("plain answer");
        assert_eq!(response.final_response, "plain answer");
        assert!(response.completed);
        assert!(response.messages.is_empty());
    }

    #[tokio::test]
    async fn cat_as_engine_echoes_the_prompt() {
        // `cat -` echoes the stdin prompt, then the request file contents.
        let engine = ProcessAgentEngine::new(AgentConfig {
            command: "cat".to_string(),
            args: vec!["-".to_string()],
            model: None,
        });
        let response = engine
            .run_conversation("echo me", "s1", &[], None)
            .await
            .unwrap();
        assert!(response.final_response.contains("echo me"));
        assert!(response.completed);
    }

    #[tokio::test]
    async fn failing_command_surfaces_agent_error() {
        let engine = ProcessAgentEngine::new(AgentConfig {
            command: "false".to_string(),
            args: Vec::new(),
            model: None,
        });
        let err = engine.run_conversation("x", "s1", &[], None).await;
        assert!(matches!(err, Err(GatewayError::Agent(_))));
    }

    #[tokio::test]
    async fn missing_command_surfaces_agent_error() {
        let engine = ProcessAgentEngine::new(AgentConfig {
            command: "hermes-definitely-not-installed".to_string(),
            args: Vec::new(),
            model: None,
        });
        let err = engine.run_conversation("x", "s1", &[], None).await;
        assert!(matches!(err, Err(GatewayError::Agent(_))));
    }
}
