use crate::definition::AgentDefinition;
use foreman_core::{AgentsLayout, ForemanError, ForemanResult};
use tracing::{info, warn};

/// One successfully loaded agent: its definition plus the subdirectory it
/// was found in (the prompt and task files live beside the definition).
#[derive(Debug, Clone)]
pub struct RegisteredAgent {
    /// Name of the subdirectory under `.agents/agents/`.
    pub dir_name: String,
    /// The parsed definition.
    pub definition: AgentDefinition,
}

/// Discovers and holds the static definition of every agent.
///
/// One bad agent never blocks discovery of the rest: a subdirectory with a
/// missing or malformed `config.json` is skipped with a warning and the
/// load continues.
#[derive(Debug)]
pub struct AgentRegistry {
    agents: Vec<RegisteredAgent>,
}

impl AgentRegistry {
    /// Scan `.agents/agents/` and load every definition found.
    ///
    /// Registration order is the sorted subdirectory-name order, so
    /// [`AgentRegistry::list`] is deterministic across invocations.
    pub async fn load(layout: &AgentsLayout) -> ForemanResult<Self> {
        let agents_dir = layout.agents_dir();
        let mut dir_names = Vec::new();

        let mut entries = tokio::fs::read_dir(&agents_dir).await.map_err(|e| {
            ForemanError::Config(format!(
                "cannot read agents directory '{}': {e}",
                agents_dir.display()
            ))
        })?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    dir_names.push(name.to_string());
                }
            }
        }
        dir_names.sort();

        let mut agents = Vec::new();
        for dir_name in dir_names {
            let path = layout.definition_path(&dir_name);
            match tokio::fs::read_to_string(&path).await {
                Ok(raw) => match serde_json::from_str::<AgentDefinition>(&raw) {
                    Ok(definition) => agents.push(RegisteredAgent {
                        dir_name,
                        definition,
                    }),
                    Err(e) => {
                        warn!(agent_dir = %dir_name, error = %e, "Skipping malformed agent definition");
                    }
                },
                Err(e) => {
                    warn!(agent_dir = %dir_name, error = %e, "Skipping agent directory without readable config.json");
                }
            }
        }

        info!(count = agents.len(), "Agent definitions loaded");
        Ok(Self { agents })
    }

    /// Look up one agent by id.
    pub fn get(&self, agent_id: &str) -> ForemanResult<&RegisteredAgent> {
        self.agents
            .iter()
            .find(|a| a.definition.agent_id == agent_id)
            .ok_or_else(|| ForemanError::NotFound(agent_id.to_string()))
    }

    /// All agents, in registration order.
    pub fn list(&self) -> &[RegisteredAgent] {
        &self.agents
    }

    /// Number of successfully loaded agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// True when no agent definition loaded.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn write_definition(layout: &AgentsLayout, dir: &str, agent_id: &str, branch: &str) {
        let agent_dir = layout.agents_dir().join(dir);
        std::fs::create_dir_all(&agent_dir).unwrap();
        let config = serde_json::json!({
            "agent_id": agent_id,
            "name": format!("{agent_id} agent"),
            "priority": "high",
            "estimated_duration_weeks": 1,
            "git": { "branch": branch },
            "source_document": format!("docs/{agent_id}.md"),
        });
        std::fs::write(
            agent_dir.join("config.json"),
            serde_json::to_string_pretty(&config).unwrap(),
        )
        .unwrap();
    }

    fn temp_layout() -> (AgentsLayout, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let layout = AgentsLayout::new(tmp.path());
        std::fs::create_dir_all(layout.agents_dir()).unwrap();
        (layout, tmp)
    }

    #[tokio::test]
    async fn test_load_registers_in_sorted_order() {
        let (layout, _tmp) = temp_layout();
        write_definition(&layout, "beta", "beta", "feat/b");
        write_definition(&layout, "alpha", "alpha", "feat/a");

        let registry = AgentRegistry::load(&layout).await.unwrap();
        let ids: Vec<&str> = registry
            .list()
            .iter()
            .map(|a| a.definition.agent_id.as_str())
            .collect();
        assert_eq!(ids, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_bad_agent_is_skipped_not_fatal() {
        let (layout, _tmp) = temp_layout();
        write_definition(&layout, "good", "good", "feat/good");

        // Directory without a config.json
        std::fs::create_dir_all(layout.agents_dir().join("empty")).unwrap();
        // Directory with malformed JSON
        let broken = layout.agents_dir().join("broken");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join("config.json"), "{ not json").unwrap();

        let registry = AgentRegistry::load(&layout).await.unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("good").is_ok());
    }

    #[tokio::test]
    async fn test_get_unknown_agent_fails_with_not_found() {
        let (layout, _tmp) = temp_layout();
        let registry = AgentRegistry::load(&layout).await.unwrap();
        let err = registry.get("gamma").unwrap_err();
        assert!(matches!(err, ForemanError::NotFound(_)));
        assert!(err.to_string().contains("gamma"));
    }

    #[tokio::test]
    async fn test_load_fails_when_agents_dir_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = AgentsLayout::new(tmp.path());
        let result = AgentRegistry::load(&layout).await;
        assert!(matches!(result, Err(ForemanError::Config(_))));
    }
}
