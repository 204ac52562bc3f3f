use crate::status::{AgentStatus, CompletionEntry, CompletionLog, StatusMap, TaskAssignments};
use chrono::Utc;
use foreman_core::{AgentsLayout, ForemanError, ForemanResult};
use foreman_registry::AgentRegistry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const STATUS_FILE: &str = "agent-status.json";
const ASSIGNMENTS_FILE: &str = "task-assignments.json";
const COMPLETION_FILE: &str = "completion-log.json";

/// File-backed store for all persisted orchestration state.
///
/// The store exclusively owns the three state files; the registry and the
/// query surface only ever see snapshots loaded through it.
pub struct StateStore {
    state_dir: PathBuf,
}

impl StateStore {
    /// Create a store over the layout's state directory. No files are
    /// touched until `init_state` or a write operation runs.
    pub fn new(layout: &AgentsLayout) -> Self {
        Self {
            state_dir: layout.state_dir(),
        }
    }

    fn status_path(&self) -> PathBuf {
        self.state_dir.join(STATUS_FILE)
    }

    fn assignments_path(&self) -> PathBuf {
        self.state_dir.join(ASSIGNMENTS_FILE)
    }

    fn completion_path(&self) -> PathBuf {
        self.state_dir.join(COMPLETION_FILE)
    }

    /// Whether `init_state` has ever run (status file present).
    pub fn is_initialized(&self) -> bool {
        self.status_path().is_file()
    }

    /// (Re)create the full state set: one ready record per registered
    /// agent, empty assignments, empty completion log.
    ///
    /// This is an explicit wholesale reset, not a merge — any prior state
    /// is overwritten.
    pub async fn init_state(&self, registry: &AgentRegistry) -> ForemanResult<()> {
        tokio::fs::create_dir_all(&self.state_dir).await?;

        let now = Utc::now();
        let statuses: StatusMap = registry
            .list()
            .iter()
            .map(|a| (a.definition.agent_id.clone(), AgentStatus::ready(now)))
            .collect();

        self.write_json_atomic(&self.status_path(), &statuses).await?;
        self.write_json_atomic(&self.assignments_path(), &TaskAssignments::new())
            .await?;
        self.write_json_atomic(&self.completion_path(), &CompletionLog::default())
            .await?;

        info!(
            agents = statuses.len(),
            dir = %self.state_dir.display(),
            "Orchestrator state initialized"
        );
        Ok(())
    }

    /// Load the full status map, validating it.
    ///
    /// A missing file means `init` never ran and surfaces as
    /// [`ForemanError::Uninitialized`]; a malformed file fails loudly
    /// rather than being silently coerced.
    pub async fn load_status(&self) -> ForemanResult<StatusMap> {
        let map: StatusMap = self.read_json(&self.status_path()).await?;
        for (agent_id, status) in &map {
            if !(0.0..=1.0).contains(&status.progress) {
                return Err(ForemanError::Config(format!(
                    "corrupt status record for '{agent_id}': progress {} outside [0, 1]",
                    status.progress
                )));
            }
        }
        Ok(map)
    }

    /// Atomically replace the full status map.
    pub async fn save_status(&self, map: &StatusMap) -> ForemanResult<()> {
        self.write_json_atomic(&self.status_path(), map).await
    }

    /// Load, mutate one agent's record, and save.
    ///
    /// `last_update` is stamped here and clamped so it never moves
    /// backward even if the wall clock does. Returns the record as
    /// persisted.
    pub async fn update_status<F>(&self, agent_id: &str, mutate: F) -> ForemanResult<AgentStatus>
    where
        F: FnOnce(&mut AgentStatus),
    {
        let mut map = self.load_status().await?;
        let record = map
            .get_mut(agent_id)
            .ok_or_else(|| ForemanError::NotFound(agent_id.to_string()))?;

        let previous = record.last_update;
        mutate(record);
        record.last_update = Utc::now().max(previous);
        let updated = record.clone();

        self.save_status(&map).await?;
        debug!(agent_id, status = %updated.status, "Agent status persisted");
        Ok(updated)
    }

    /// Insert or overwrite the task assignment for one agent. Unregistered
    /// agent ids are rejected.
    pub async fn assign_task(&self, agent_id: &str, task_id: &str) -> ForemanResult<()> {
        let statuses = self.load_status().await?;
        if !statuses.contains_key(agent_id) {
            return Err(ForemanError::NotFound(agent_id.to_string()));
        }

        let mut assignments = self.load_assignments().await?;
        assignments.insert(agent_id.to_string(), task_id.to_string());
        self.write_json_atomic(&self.assignments_path(), &assignments)
            .await?;
        info!(agent_id, task_id, "Task assigned");
        Ok(())
    }

    /// Load the assignment map.
    pub async fn load_assignments(&self) -> ForemanResult<TaskAssignments> {
        self.read_json(&self.assignments_path()).await
    }

    /// Append a completion entry, bump the running commit total, and clear
    /// the agent's task assignment.
    pub async fn record_completion(
        &self,
        agent_id: &str,
        task_id: &str,
        commit_count: u64,
    ) -> ForemanResult<()> {
        let statuses = self.load_status().await?;
        if !statuses.contains_key(agent_id) {
            return Err(ForemanError::NotFound(agent_id.to_string()));
        }

        let mut log = self.load_completion_log().await?;
        log.completed_tasks.push(CompletionEntry {
            agent_id: agent_id.to_string(),
            task_id: task_id.to_string(),
            timestamp: Utc::now(),
            commit_count,
        });
        log.total_commits += commit_count;
        self.write_json_atomic(&self.completion_path(), &log).await?;

        let mut assignments = self.load_assignments().await?;
        if assignments.remove(agent_id).is_some() {
            self.write_json_atomic(&self.assignments_path(), &assignments)
                .await?;
        }

        info!(
            agent_id,
            task_id,
            commit_count,
            total_commits = log.total_commits,
            "Completion recorded"
        );
        Ok(())
    }

    /// Load the completion log.
    pub async fn load_completion_log(&self) -> ForemanResult<CompletionLog> {
        self.read_json(&self.completion_path()).await
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> ForemanResult<T> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ForemanError::Uninitialized(format!(
                    "state file '{}' does not exist",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|e| {
            ForemanError::Config(format!(
                "corrupt state file '{}': {e}",
                path.display()
            ))
        })
    }

    /// Write-to-temp-then-rename so a concurrent reader never sees a
    /// truncated file.
    async fn write_json_atomic<T: Serialize>(&self, path: &Path, value: &T) -> ForemanResult<()> {
        let json = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
