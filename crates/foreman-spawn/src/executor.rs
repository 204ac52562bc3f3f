use async_trait::async_trait;
use foreman_core::ForemanResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events emitted while an execution service streams an agent session.
///
/// The service produces a lazy, finite, non-restartable sequence terminated
/// by [`ExecEvent::Done`] or [`ExecEvent::ErrorEvent`]. Consumers match
/// exhaustively instead of probing message shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecEvent {
    /// A chunk of agent output text.
    TextChunk {
        /// The raw text, forwarded and logged verbatim.
        text: String,
    },

    /// A service-level notice that is not agent output (session start,
    /// model selection, turn accounting). Logged, never persisted.
    SystemEvent {
        /// Human-readable notice.
        message: String,
    },

    /// The service failed mid-stream. No further events follow.
    ErrorEvent {
        /// Failure detail, persisted into the agent's `current_task`.
        message: String,
    },

    /// The stream finished successfully.
    Done,
}

/// Everything the execution service needs for one agent session.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Directory the agent works in (the project root).
    pub working_dir: PathBuf,
    /// The agent's own prompt text, used as the system prompt.
    pub system_prompt: String,
    /// The single synthesized instruction that starts the session.
    pub instruction: String,
    /// Upper bound on execution turns.
    pub max_turns: u32,
    /// Capability names the service may invoke.
    pub allowed_tools: Vec<String>,
}

/// The external engine that actually performs an agent's reasoning loop.
///
/// Returns a receiver for streamed events plus a join handle that resolves
/// once the underlying session has fully shut down. The handle's error is
/// authoritative when the stream closes without a terminal event.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Start one session and stream its output.
    async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> ForemanResult<(mpsc::Receiver<ExecEvent>, JoinHandle<ForemanResult<()>>)>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_event_is_tagged() {
        let json = serde_json::to_string(&ExecEvent::TextChunk {
            text: "hello".into(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"text_chunk\""));

        let parsed: ExecEvent =
            serde_json::from_str(r#"{"type":"error_event","message":"boom"}"#).unwrap();
        assert!(matches!(parsed, ExecEvent::ErrorEvent { message } if message == "boom"));
    }
}
