use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle state of one agent.
///
/// `ready → running → {complete | blocked}`. Blocked and complete are not
/// terminal: a later spawn re-enters running, and the agent is expected to
/// resume from its task document and prior log. Only `init` produces ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Freshly initialized, never spawned.
    Ready,
    /// A spawn attempt is (or was) in flight.
    Running,
    /// The last spawn failed or was interrupted.
    Blocked,
    /// The last spawn ran its stream to completion.
    Complete,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Ready => write!(f, "ready"),
            AgentState::Running => write!(f, "running"),
            AgentState::Blocked => write!(f, "blocked"),
            AgentState::Complete => write!(f, "complete"),
        }
    }
}

/// The mutable, persisted status of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Current lifecycle state.
    pub status: AgentState,
    /// Free-text descriptor of the current task; on a blocked agent this
    /// carries the error or interrupt detail for operator visibility.
    pub current_task: Option<String>,
    /// Fraction in `[0.0, 1.0]`.
    pub progress: f64,
    /// Monotonically non-decreasing per agent.
    pub last_update: DateTime<Utc>,
}

impl AgentStatus {
    /// A fresh record as written by `init`.
    pub fn ready(now: DateTime<Utc>) -> Self {
        Self {
            status: AgentState::Ready,
            current_task: None,
            progress: 0.0,
            last_update: now,
        }
    }
}

/// One append-only completion record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEntry {
    /// The agent that finished the task.
    pub agent_id: String,
    /// The task identifier.
    pub task_id: String,
    /// When the completion was recorded.
    pub timestamp: DateTime<Utc>,
    /// Commits the task produced on the agent's branch.
    pub commit_count: u64,
}

/// The aggregate completion log. Entries are never edited or removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionLog {
    /// Every recorded completion, in append order.
    pub completed_tasks: Vec<CompletionEntry>,
    /// Running total of commits across all entries.
    pub total_commits: u64,
}

/// Full agent-status map. `BTreeMap` keeps the serialized file ordering
/// stable across writes.
pub type StatusMap = BTreeMap<String, AgentStatus>;

/// Agent id to the task currently (or most recently) delegated to it.
pub type TaskAssignments = BTreeMap<String, String>;
