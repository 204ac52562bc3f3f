use serde::{Deserialize, Serialize};

/// Source-control binding for an agent. Each agent exclusively owns one
/// branch; no two definitions should share one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitBinding {
    /// The branch this agent commits to.
    pub branch: String,
}

/// The immutable definition of one agent, loaded from its `config.json`.
///
/// Created once at registry load time and never mutated; a fresh copy is
/// loaded on every invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique key for this agent, stable across runs.
    pub agent_id: String,
    /// Human-readable name shown in listings.
    pub name: String,
    /// Scheduling priority label (free text, e.g. "high").
    pub priority: String,
    /// Rough effort estimate, in weeks.
    pub estimated_duration_weeks: f64,
    /// Branch binding.
    pub git: GitBinding,
    /// Path to the task specification document this agent consumes.
    pub source_document: String,
    /// Upper bound on execution turns per spawn.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Capability names the execution service may invoke.
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,
}

fn default_max_turns() -> u32 {
    80
}

fn default_tools() -> Vec<String> {
    ["Read", "Write", "Edit", "Bash", "Grep", "Glob"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "agent_id": "frontend-cleanup",
        "name": "Frontend Cleanup Agent",
        "priority": "high",
        "estimated_duration_weeks": 2,
        "git": { "branch": "refactor/frontend" },
        "source_document": "docs/frontend-tasks.md",
        "max_turns": 40,
        "tools": ["Read", "Edit"]
    }"#;

    const MINIMAL: &str = r#"{
        "agent_id": "db-migration",
        "name": "DB Migration Agent",
        "priority": "medium",
        "estimated_duration_weeks": 1.5,
        "git": { "branch": "refactor/db" },
        "source_document": "docs/db-tasks.md"
    }"#;

    #[test]
    fn test_parse_full_definition() {
        let def: AgentDefinition = serde_json::from_str(FULL).unwrap();
        assert_eq!(def.agent_id, "frontend-cleanup");
        assert_eq!(def.git.branch, "refactor/frontend");
        assert_eq!(def.max_turns, 40);
        assert_eq!(def.tools, vec!["Read", "Edit"]);
    }

    #[test]
    fn test_optional_fields_take_defaults() {
        let def: AgentDefinition = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(def.max_turns, 80);
        assert_eq!(
            def.tools,
            vec!["Read", "Write", "Edit", "Bash", "Grep", "Glob"]
        );
        assert!((def.estimated_duration_weeks - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_branch_is_rejected() {
        let bad = r#"{
            "agent_id": "x",
            "name": "X",
            "priority": "low",
            "estimated_duration_weeks": 1,
            "git": {},
            "source_document": "docs/x.md"
        }"#;
        assert!(serde_json::from_str::<AgentDefinition>(bad).is_err());
    }
}
