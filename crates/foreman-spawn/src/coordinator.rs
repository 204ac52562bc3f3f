use crate::executor::{ExecEvent, ExecutionRequest, ExecutionService};
use chrono::Utc;
use foreman_core::{AgentsLayout, ForemanError, ForemanResult};
use foreman_registry::{AgentDefinition, AgentRegistry, RegisteredAgent};
use foreman_state::{AgentState, StateStore};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How a finished stream ended.
enum StreamOutcome {
    Completed { chunks: usize },
    Failed { detail: String },
    Interrupted,
}

/// Runs the spawn protocol for single agents.
///
/// Per-agent states move `ready → running → {complete | blocked}`. Blocked
/// and complete agents may be spawned again; the synthesized instruction
/// always tells the agent to resume from its task document and prior log.
/// Every exit path from [`SpawnCoordinator::spawn`] drives a terminal
/// transition — the state file is never left claiming `running` for a
/// process that no longer exists.
pub struct SpawnCoordinator {
    layout: AgentsLayout,
    service: Arc<dyn ExecutionService>,
    stale_after: Duration,
}

impl SpawnCoordinator {
    /// Coordinator over the given project layout and execution service.
    pub fn new(layout: AgentsLayout, service: Arc<dyn ExecutionService>) -> Self {
        Self {
            layout,
            service,
            stale_after: Duration::from_secs(30 * 60),
        }
    }

    /// Age past which a persisted `running` status is treated as a crashed
    /// run rather than a concurrent one.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Spawn one agent, streaming output chunks to `sink`. Ctrl-C cancels
    /// the session and parks the agent in `blocked`.
    pub async fn spawn<S>(
        &self,
        registry: &AgentRegistry,
        store: &StateStore,
        agent_id: &str,
        sink: S,
    ) -> ForemanResult<()>
    where
        S: FnMut(&str),
    {
        self.spawn_with_shutdown(
            registry,
            store,
            agent_id,
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
            sink,
        )
        .await
    }

    /// Like [`SpawnCoordinator::spawn`] but with an explicit cancellation
    /// future, so callers and tests control the interrupt path.
    pub async fn spawn_with_shutdown<F, S>(
        &self,
        registry: &AgentRegistry,
        store: &StateStore,
        agent_id: &str,
        shutdown: F,
        sink: S,
    ) -> ForemanResult<()>
    where
        F: Future<Output = ()> + Send,
        S: FnMut(&str),
    {
        // Resolve the definition first; an unknown agent must not touch
        // any state file.
        let agent = registry.get(agent_id)?;
        let def = &agent.definition;

        // Load artifacts before any status mutation. A missing prompt or
        // task document is an operator error, reported rather than retried.
        let prompt = read_artifact(&self.layout.prompt_path(&agent.dir_name), "prompt").await?;
        let task_doc_path = self.layout.root.join(&def.source_document);
        read_artifact(&task_doc_path, "task document").await?;

        // Staleness heuristic: with no lock spanning invocations, the age
        // of the persisted record is the only signal separating a crashed
        // run from a genuinely concurrent one. Warn either way, never
        // block.
        let statuses = store.load_status().await?;
        let prior_task = match statuses.get(agent_id) {
            Some(record) => {
                if record.status == AgentState::Running {
                    let age = (Utc::now() - record.last_update)
                        .to_std()
                        .unwrap_or_default();
                    if age > self.stale_after {
                        warn!(
                            agent_id,
                            age_secs = age.as_secs(),
                            "Persisted status is running but stale; previous run likely crashed"
                        );
                    } else {
                        warn!(
                            agent_id,
                            age_secs = age.as_secs(),
                            "Agent appears to be running concurrently; proceeding anyway"
                        );
                    }
                }
                record.current_task.clone()
            }
            None => None,
        };

        // Transition to running and persist immediately so a concurrent
        // status query observes it even if this spawn later crashes.
        store
            .update_status(agent_id, |s| s.status = AgentState::Running)
            .await?;

        let run_id = Uuid::new_v4();
        info!(
            agent_id,
            run_id = %run_id,
            branch = %def.git.branch,
            max_turns = def.max_turns,
            "Spawning agent"
        );

        // From here on every failure, interrupt, or local error must land
        // in a persisted terminal state before surfacing.
        let result = self
            .run_stream(agent, &prompt, prior_task.as_deref(), run_id, shutdown, sink)
            .await;
        self.finish(store, agent_id, run_id, result).await
    }

    /// Assemble the request, stream the session, and append output to the
    /// agent's log file.
    async fn run_stream<F, S>(
        &self,
        agent: &RegisteredAgent,
        prompt: &str,
        prior_task: Option<&str>,
        run_id: Uuid,
        shutdown: F,
        mut sink: S,
    ) -> ForemanResult<StreamOutcome>
    where
        F: Future<Output = ()> + Send,
        S: FnMut(&str),
    {
        let def = &agent.definition;
        let request = ExecutionRequest {
            working_dir: self.layout.root.clone(),
            system_prompt: prompt.to_string(),
            instruction: self.build_instruction(def, prior_task),
            max_turns: def.max_turns,
            allowed_tools: def.tools.clone(),
        };

        tokio::fs::create_dir_all(self.layout.logs_dir()).await?;
        let mut log_file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.layout.log_path(&def.agent_id))
            .await?;
        log_file
            .write_all(format!("[run {run_id} started {}]\n", Utc::now().to_rfc3339()).as_bytes())
            .await?;

        let (mut rx, handle) = self.service.execute(&request).await?;
        tokio::pin!(shutdown);

        enum Terminal {
            Done,
            Failed(String),
            Interrupted,
            Closed,
        }

        let mut chunks = 0usize;
        let terminal = loop {
            tokio::select! {
                _ = &mut shutdown => break Terminal::Interrupted,
                event = rx.recv() => match event {
                    Some(ExecEvent::TextChunk { text }) => {
                        log_file.write_all(text.as_bytes()).await?;
                        sink(&text);
                        chunks += 1;
                    }
                    Some(ExecEvent::SystemEvent { message }) => {
                        debug!(agent_id = %def.agent_id, message, "Execution service notice");
                    }
                    Some(ExecEvent::ErrorEvent { message }) => break Terminal::Failed(message),
                    Some(ExecEvent::Done) => break Terminal::Done,
                    None => break Terminal::Closed,
                },
            }
        };

        let outcome = match terminal {
            Terminal::Done => StreamOutcome::Completed { chunks },
            Terminal::Failed(detail) => {
                handle.abort();
                StreamOutcome::Failed { detail }
            }
            Terminal::Interrupted => {
                handle.abort();
                StreamOutcome::Interrupted
            }
            // Channel closed without a terminal event: the join handle is
            // authoritative about how the session ended.
            Terminal::Closed => match handle.await {
                Ok(Ok(())) => StreamOutcome::Completed { chunks },
                Ok(Err(e)) => StreamOutcome::Failed {
                    detail: e.to_string(),
                },
                Err(e) => StreamOutcome::Failed {
                    detail: format!("execution task panicked: {e}"),
                },
            },
        };

        // Interrupted and failed runs are distinguished in the transcript,
        // not just in the persisted status.
        let trailer = match &outcome {
            StreamOutcome::Completed { .. } => format!("\n[run {run_id} complete]\n"),
            StreamOutcome::Failed { detail } => format!("\n[run {run_id} failed: {detail}]\n"),
            StreamOutcome::Interrupted => format!("\n[run {run_id} interrupted]\n"),
        };
        log_file.write_all(trailer.as_bytes()).await?;
        log_file.flush().await?;

        Ok(outcome)
    }

    /// Map the stream result onto a persisted terminal transition.
    async fn finish(
        &self,
        store: &StateStore,
        agent_id: &str,
        run_id: Uuid,
        result: ForemanResult<StreamOutcome>,
    ) -> ForemanResult<()> {
        match result {
            Ok(StreamOutcome::Completed { chunks }) => {
                store
                    .update_status(agent_id, |s| {
                        s.status = AgentState::Complete;
                        s.progress = 1.0;
                        s.current_task = None;
                    })
                    .await?;
                info!(agent_id, run_id = %run_id, chunks, "Spawn complete");
                Ok(())
            }
            Ok(StreamOutcome::Failed { detail }) => {
                store
                    .update_status(agent_id, |s| {
                        s.status = AgentState::Blocked;
                        s.current_task = Some(format!("failed: {detail}"));
                    })
                    .await?;
                error!(agent_id, run_id = %run_id, error = %detail, "Spawn failed");
                Err(ForemanError::Execution(detail))
            }
            Ok(StreamOutcome::Interrupted) => {
                store
                    .update_status(agent_id, |s| {
                        s.status = AgentState::Blocked;
                        s.current_task = Some("interrupted by operator".to_string());
                    })
                    .await?;
                warn!(agent_id, run_id = %run_id, "Spawn interrupted by operator");
                Err(ForemanError::Interrupted(format!(
                    "spawn of '{agent_id}' cancelled"
                )))
            }
            Err(e) => {
                store
                    .update_status(agent_id, |s| {
                        s.status = AgentState::Blocked;
                        s.current_task = Some(format!("failed: {e}"));
                    })
                    .await?;
                error!(agent_id, run_id = %run_id, error = %e, "Spawn aborted");
                Err(e)
            }
        }
    }

    /// The single instruction that starts a session: identity, task
    /// document path, branch, and the resumption context (last recorded
    /// task plus the agent's own progress log).
    fn build_instruction(&self, def: &AgentDefinition, prior_task: Option<&str>) -> String {
        format!(
            "You are now active as the {name}.\n\
             \n\
             Your task document is at: {doc}\n\
             Your branch is: {branch}\n\
             Last recorded task: {prior}\n\
             \n\
             Please:\n\
             1. Read your task document completely.\n\
             2. Check the current git branch (should be: {branch}).\n\
             3. Review what work has already been done (check git log and your progress log).\n\
             4. Continue from where you left off or start the first pending task.\n\
             5. Update your progress log at {progress}.\n\
             \n\
             Begin your work now.",
            name = def.name,
            doc = def.source_document,
            branch = def.git.branch,
            prior = prior_task.unwrap_or("none recorded"),
            progress = self
                .layout
                .progress_log_path(&def.agent_id)
                .display(),
        )
    }
}

async fn read_artifact(path: &Path, what: &str) -> ForemanResult<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        ForemanError::MissingArtifact(format!("{what} not readable at '{}': {e}", path.display()))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use foreman_registry::GitBinding;

    fn test_definition() -> AgentDefinition {
        AgentDefinition {
            agent_id: "alpha".into(),
            name: "Alpha Agent".into(),
            priority: "high".into(),
            estimated_duration_weeks: 2.0,
            git: GitBinding {
                branch: "feat/a".into(),
            },
            source_document: "docs/alpha.md".into(),
            max_turns: 40,
            tools: vec!["Read".into()],
        }
    }

    fn test_coordinator() -> SpawnCoordinator {
        struct Never;
        #[async_trait::async_trait]
        impl ExecutionService for Never {
            async fn execute(
                &self,
                _request: &ExecutionRequest,
            ) -> ForemanResult<(
                tokio::sync::mpsc::Receiver<ExecEvent>,
                tokio::task::JoinHandle<ForemanResult<()>>,
            )> {
                unreachable!("not used by instruction tests")
            }
        }
        SpawnCoordinator::new(AgentsLayout::new("/work/project"), Arc::new(Never))
    }

    #[test]
    fn test_instruction_carries_identity_and_paths() {
        let coordinator = test_coordinator();
        let instruction = coordinator.build_instruction(&test_definition(), None);
        assert!(instruction.contains("Alpha Agent"));
        assert!(instruction.contains("docs/alpha.md"));
        assert!(instruction.contains("feat/a"));
        assert!(instruction.contains("alpha-progress.md"));
        assert!(instruction.contains("none recorded"));
    }

    #[test]
    fn test_instruction_includes_prior_task_for_resumption() {
        let coordinator = test_coordinator();
        let instruction =
            coordinator.build_instruction(&test_definition(), Some("migrating auth module"));
        assert!(instruction.contains("migrating auth module"));
    }
}
