use crate::executor::{ExecEvent, ExecutionRequest, ExecutionService};
use async_trait::async_trait;
use foreman_core::{ForemanError, ForemanResult};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Execution backend that runs the `claude` CLI in headless streaming mode
/// (`-p --output-format stream-json`). Uses the operator's existing Claude
/// Code installation; no API key handling here.
pub struct ClaudeCodeService {
    binary: String,
    model: Option<String>,
}

impl ClaudeCodeService {
    /// Backend using the `claude` binary from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: "claude".to_string(),
            model: None,
        }
    }

    /// Override the binary name or path.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Pin a specific model instead of the CLI default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.model = (!model.is_empty()).then_some(model);
        self
    }

    /// Map one stdout line of `stream-json` output to an event.
    ///
    /// Unknown message kinds become `SystemEvent`s rather than being
    /// dropped; non-JSON lines are skipped.
    fn parse_line(line: &str) -> Option<ExecEvent> {
        let value: serde_json::Value = serde_json::from_str(line).ok()?;
        match value["type"].as_str()? {
            "assistant" => {
                let mut text = String::new();
                if let Some(blocks) = value["message"]["content"].as_array() {
                    for block in blocks {
                        if let Some(t) = block["text"].as_str() {
                            text.push_str(t);
                        }
                    }
                }
                (!text.is_empty()).then_some(ExecEvent::TextChunk { text })
            }
            "result" => {
                if value["is_error"].as_bool().unwrap_or(false) {
                    Some(ExecEvent::ErrorEvent {
                        message: value["result"].as_str().unwrap_or("unknown error").to_string(),
                    })
                } else {
                    Some(ExecEvent::Done)
                }
            }
            other => Some(ExecEvent::SystemEvent {
                message: format!("{other}: {}", value["subtype"].as_str().unwrap_or("")),
            }),
        }
    }
}

impl Default for ClaudeCodeService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionService for ClaudeCodeService {
    async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> ForemanResult<(mpsc::Receiver<ExecEvent>, JoinHandle<ForemanResult<()>>)> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.arg("-p").arg(&request.instruction);
        cmd.arg("--output-format").arg("stream-json");
        cmd.arg("--verbose");
        cmd.arg("--max-turns").arg(request.max_turns.to_string());
        cmd.arg("--append-system-prompt").arg(&request.system_prompt);
        if !request.allowed_tools.is_empty() {
            cmd.arg("--allowed-tools")
                .arg(request.allowed_tools.join(","));
        }
        if let Some(model) = &self.model {
            cmd.arg("--model").arg(model);
        }
        cmd.current_dir(&request.working_dir);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::info!(
            binary = %self.binary,
            max_turns = request.max_turns,
            tools = request.allowed_tools.len(),
            "ClaudeCode: spawning claude CLI"
        );

        let mut child = cmd.spawn().map_err(|e| {
            ForemanError::Execution(format!(
                "failed to run '{}'. Is Claude Code installed? Error: {e}",
                self.binary
            ))
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ForemanError::Execution("claude CLI stdout was not captured".to_string())
        })?;

        let (tx, rx) = mpsc::channel::<ExecEvent>(64);

        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = Self::parse_line(&line) {
                    if tx.send(event).await.is_err() {
                        // Receiver gone; stop reading and let the child be
                        // reaped below.
                        break;
                    }
                }
            }

            let status = child.wait().await?;
            if status.success() {
                Ok(())
            } else {
                let detail = format!(
                    "claude CLI exited with status {}",
                    status.code().map_or_else(|| "signal".to_string(), |c| c.to_string())
                );
                let _ = tx
                    .send(ExecEvent::ErrorEvent {
                        message: detail.clone(),
                    })
                    .await;
                Err(ForemanError::Execution(detail))
            }
        });

        Ok((rx, handle))
    }
}
