use crate::{ForemanError, ForemanResult};
use std::path::{Path, PathBuf};

/// Resolved paths under a project's `.agents/` directory.
///
/// All orchestrator state lives in this tree: per-agent definitions under
/// `agents/`, the persisted state files under `state/`, and per-agent spawn
/// transcripts under `logs/`.
#[derive(Debug, Clone)]
pub struct AgentsLayout {
    /// The project root (the directory containing `.agents/`).
    pub root: PathBuf,
}

impl AgentsLayout {
    /// Create a layout rooted at the given project directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk upward from `start` until a directory containing `.agents/` is
    /// found. Fails with [`ForemanError::Config`] when no ancestor has one.
    pub fn discover(start: &Path) -> ForemanResult<Self> {
        let mut current = start.to_path_buf();
        loop {
            if current.join(".agents").is_dir() {
                return Ok(Self::new(current));
            }
            if !current.pop() {
                return Err(ForemanError::Config(format!(
                    "no .agents directory found in '{}' or any parent; \
                     run from a project root containing .agents/",
                    start.display()
                )));
            }
        }
    }

    /// `.agents/` itself.
    pub fn agents_root(&self) -> PathBuf {
        self.root.join(".agents")
    }

    /// Directory of per-agent definition subdirectories.
    pub fn agents_dir(&self) -> PathBuf {
        self.agents_root().join("agents")
    }

    /// Directory of the persisted state files.
    pub fn state_dir(&self) -> PathBuf {
        self.agents_root().join("state")
    }

    /// Directory of per-agent spawn transcripts.
    pub fn logs_dir(&self) -> PathBuf {
        self.agents_root().join("logs")
    }

    /// Optional orchestrator settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.agents_root().join("foreman.toml")
    }

    /// The definition file for one agent.
    pub fn definition_path(&self, dir_name: &str) -> PathBuf {
        self.agents_dir().join(dir_name).join("config.json")
    }

    /// The system prompt file for one agent.
    pub fn prompt_path(&self, dir_name: &str) -> PathBuf {
        self.agents_dir().join(dir_name).join("prompt.md")
    }

    /// The task document for one agent.
    pub fn tasks_path(&self, dir_name: &str) -> PathBuf {
        self.agents_dir().join(dir_name).join("tasks.json")
    }

    /// The append-only spawn transcript for one agent.
    pub fn log_path(&self, agent_id: &str) -> PathBuf {
        self.logs_dir().join(format!("{agent_id}.log"))
    }

    /// The free-form progress log an agent maintains for itself.
    pub fn progress_log_path(&self, agent_id: &str) -> PathBuf {
        self.logs_dir().join(format!("{agent_id}-progress.md"))
    }
}
