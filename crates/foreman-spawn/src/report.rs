use foreman_core::{AgentsLayout, ForemanResult};
use foreman_registry::AgentRegistry;
use foreman_state::StateStore;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Render the status table: every registered agent joined with its branch,
/// in registration order.
///
/// Agents missing from the status file (registered after the last `init`)
/// show a `-` status rather than failing the whole view.
pub async fn status_table(registry: &AgentRegistry, store: &StateStore) -> ForemanResult<String> {
    let statuses = store.load_status().await?;

    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:<10} {:<24} {:>8}  {:<20} {}\n",
        "AGENT", "STATUS", "BRANCH", "PROGRESS", "LAST UPDATE", "CURRENT TASK"
    ));

    for agent in registry.list() {
        let def = &agent.definition;
        let (status, progress, last_update, task) = match statuses.get(&def.agent_id) {
            Some(record) => (
                record.status.to_string(),
                format!("{:.0}%", record.progress * 100.0),
                record.last_update.format("%Y-%m-%d %H:%M:%S").to_string(),
                record.current_task.clone().unwrap_or_else(|| "-".into()),
            ),
            None => ("-".into(), "-".into(), "-".into(), "-".into()),
        };
        out.push_str(&format!(
            "{:<24} {:<10} {:<24} {:>8}  {:<20} {}\n",
            def.agent_id,
            status,
            def.git.branch,
            progress,
            last_update,
            truncate(&task, 60),
        ));
    }

    Ok(out)
}

/// Render the registry listing (static definitions, no live state).
pub fn registry_table(registry: &AgentRegistry) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:<32} {:<10} {:>8}  {}\n",
        "AGENT", "NAME", "PRIORITY", "DURATION", "BRANCH"
    ));
    for agent in registry.list() {
        let def = &agent.definition;
        out.push_str(&format!(
            "{:<24} {:<32} {:<10} {:>7}w  {}\n",
            def.agent_id,
            truncate(&def.name, 32),
            def.priority,
            def.estimated_duration_weeks,
            def.git.branch,
        ));
    }
    out
}

/// Full contents of one agent's spawn transcript.
///
/// `Ok(None)` means "no logs yet" — the agent has never been spawned; this
/// is an expected condition, not an error.
pub async fn agent_log(layout: &AgentsLayout, agent_id: &str) -> ForemanResult<Option<String>> {
    let path = layout.log_path(agent_id);
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Live-tail one agent's transcript: emit the current contents, then poll
/// for appended bytes until the shutdown future resolves.
pub async fn follow_log<F, S>(
    layout: &AgentsLayout,
    agent_id: &str,
    shutdown: F,
    mut sink: S,
) -> ForemanResult<()>
where
    F: Future<Output = ()> + Send,
    S: FnMut(&str),
{
    let path = layout.log_path(agent_id);
    let mut offset: u64 = 0;
    let mut interval = tokio::time::interval(Duration::from_millis(500));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            _ = interval.tick() => {
                let mut file = match tokio::fs::File::open(&path).await {
                    Ok(file) => file,
                    // Not written yet; keep waiting.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                };
                let len = file.metadata().await?.len();
                if len < offset {
                    // Truncated (e.g. rotated by hand); start over.
                    offset = 0;
                }
                if len > offset {
                    file.seek(std::io::SeekFrom::Start(offset)).await?;
                    let mut buf = Vec::with_capacity((len - offset) as usize);
                    file.read_to_end(&mut buf).await?;
                    offset = len;
                    sink(&String::from_utf8_lossy(&buf));
                }
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_truncate_long_string() {
        let out = truncate("a very long current task description", 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with('…'));
    }

    #[tokio::test]
    async fn test_status_table_after_init_shows_every_agent_ready() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = AgentsLayout::new(tmp.path());
        for (agent_id, branch) in [("alpha", "feat/a"), ("beta", "feat/b")] {
            let dir = layout.agents_dir().join(agent_id);
            std::fs::create_dir_all(&dir).unwrap();
            let config = serde_json::json!({
                "agent_id": agent_id,
                "name": format!("{agent_id} agent"),
                "priority": "high",
                "estimated_duration_weeks": 1,
                "git": { "branch": branch },
                "source_document": format!("docs/{agent_id}.md"),
            });
            std::fs::write(
                dir.join("config.json"),
                serde_json::to_string(&config).unwrap(),
            )
            .unwrap();
        }
        let registry = foreman_registry::AgentRegistry::load(&layout).await.unwrap();
        let store = StateStore::new(&layout);
        store.init_state(&registry).await.unwrap();

        let table = status_table(&registry, &store).await.unwrap();
        let rows: Vec<&str> = table.lines().skip(1).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("alpha"));
        assert!(rows[0].contains("ready"));
        assert!(rows[0].contains("feat/a"));
        assert!(rows[0].contains("0%"));
        assert!(rows[1].starts_with("beta"));
        assert!(rows[1].contains("feat/b"));

        // No intervening writes: a second render is identical.
        assert_eq!(table, status_table(&registry, &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_agent_log_missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = AgentsLayout::new(tmp.path());
        let result = agent_log(&layout, "alpha").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_agent_log_returns_exact_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = AgentsLayout::new(tmp.path());
        std::fs::create_dir_all(layout.logs_dir()).unwrap();
        std::fs::write(layout.log_path("alpha"), "chunk one\nchunk two\n").unwrap();

        let contents = agent_log(&layout, "alpha").await.unwrap().unwrap();
        assert_eq!(contents, "chunk one\nchunk two\n");
    }

    #[tokio::test]
    async fn test_follow_log_emits_appended_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = AgentsLayout::new(tmp.path());
        std::fs::create_dir_all(layout.logs_dir()).unwrap();
        let path = layout.log_path("alpha");
        std::fs::write(&path, "first ").unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(700)).await;
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&writer_path)
                .unwrap();
            file.write_all(b"second").unwrap();
            tokio::time::sleep(Duration::from_millis(700)).await;
            let _ = stop_tx.send(());
        });

        let mut seen = String::new();
        follow_log(&layout, "alpha", async { let _ = stop_rx.await; }, |s| {
            seen.push_str(s);
        })
        .await
        .unwrap();
        writer.await.unwrap();

        assert_eq!(seen, "first second");
    }
}
