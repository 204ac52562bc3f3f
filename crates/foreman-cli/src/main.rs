//! `foreman` — one-shot CLI for coordinating branch-bound worker agents.

use clap::{Parser, Subcommand};
use foreman_core::AgentsLayout;
use foreman_registry::AgentRegistry;
use foreman_spawn::{report, ClaudeCodeService, SpawnCoordinator};
use foreman_state::StateStore;
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "foreman",
    about = "Foreman — coordinate long-running, branch-bound worker agents"
)]
struct Cli {
    /// Project root containing .agents/ (discovered by walking up from the
    /// current directory when omitted)
    #[arg(long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize (or wholesale reset) orchestrator state
    Init,
    /// List all registered agents
    List,
    /// Spawn a specific agent by id
    Spawn {
        /// Agent to spawn
        agent_id: String,
    },
    /// Show the status of all agents
    Status,
    /// Show logs for a specific agent
    Logs {
        /// Agent whose transcript to show
        agent_id: String,
        /// Follow the log, emitting newly appended lines until Ctrl-C
        #[arg(short, long)]
        follow: bool,
    },
    /// Record a task assignment for an agent
    Assign {
        /// Agent receiving the task
        agent_id: String,
        /// Task identifier
        task_id: String,
    },
    /// Record a task completion for an agent
    Complete {
        /// Agent that finished the task
        agent_id: String,
        /// Task identifier
        task_id: String,
        /// Commits the task produced
        #[arg(long, default_value_t = 0)]
        commits: u64,
    },
    /// Re-render the status table on an interval until Ctrl-C
    Monitor {
        /// Refresh interval in seconds
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

#[derive(Deserialize, Default)]
struct Settings {
    #[serde(default)]
    spawn: SpawnSettings,
}

#[derive(Deserialize)]
struct SpawnSettings {
    #[serde(default = "default_stale_minutes")]
    stale_after_minutes: u64,
    #[serde(default = "default_binary")]
    binary: String,
    #[serde(default)]
    model: String,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            stale_after_minutes: default_stale_minutes(),
            binary: default_binary(),
            model: String::new(),
        }
    }
}

fn default_stale_minutes() -> u64 {
    30
}
fn default_binary() -> String {
    "claude".to_string()
}

async fn load_settings(layout: &AgentsLayout) -> anyhow::Result<Settings> {
    let path = layout.settings_path();
    match tokio::fs::read_to_string(&path).await {
        Ok(raw) => Ok(toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid settings file '{}': {e}", path.display()))?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let layout = match cli.root {
        Some(root) => AgentsLayout::new(root),
        None => AgentsLayout::discover(&std::env::current_dir()?)?,
    };
    tracing::debug!(root = %layout.root.display(), "Project root resolved");
    let settings = load_settings(&layout).await?;
    let registry = AgentRegistry::load(&layout).await?;
    let store = StateStore::new(&layout);

    match cli.command {
        Commands::Init => {
            store.init_state(&registry).await?;
            println!(
                "Initialized state for {} agent(s) in {}",
                registry.len(),
                layout.state_dir().display()
            );
        }
        Commands::List => {
            print!("{}", report::registry_table(&registry));
        }
        Commands::Spawn { agent_id } => {
            let mut service = ClaudeCodeService::new().with_binary(&settings.spawn.binary);
            if !settings.spawn.model.is_empty() {
                service = service.with_model(&settings.spawn.model);
            }
            let coordinator = SpawnCoordinator::new(layout, Arc::new(service)).with_stale_after(
                Duration::from_secs(settings.spawn.stale_after_minutes * 60),
            );
            coordinator
                .spawn(&registry, &store, &agent_id, |chunk| {
                    print!("{chunk}");
                    let _ = std::io::stdout().flush();
                })
                .await?;
            println!();
            println!("Agent {agent_id} session completed");
        }
        Commands::Status => {
            print!("{}", report::status_table(&registry, &store).await?);
        }
        Commands::Logs { agent_id, follow } => {
            // Reject unknown agents up front rather than tailing nothing.
            registry.get(&agent_id)?;
            if follow {
                eprintln!("Following logs for {agent_id} (Ctrl-C to stop)");
                report::follow_log(
                    &layout,
                    &agent_id,
                    async {
                        let _ = tokio::signal::ctrl_c().await;
                    },
                    |s| {
                        print!("{s}");
                        let _ = std::io::stdout().flush();
                    },
                )
                .await?;
            } else {
                match report::agent_log(&layout, &agent_id).await? {
                    Some(contents) => print!("{contents}"),
                    None => println!("No logs yet for {agent_id}"),
                }
            }
        }
        Commands::Assign { agent_id, task_id } => {
            store.assign_task(&agent_id, &task_id).await?;
            println!("Assigned {task_id} to {agent_id}");
        }
        Commands::Complete {
            agent_id,
            task_id,
            commits,
        } => {
            store.record_completion(&agent_id, &task_id, commits).await?;
            println!("Recorded completion of {task_id} by {agent_id} ({commits} commit(s))");
        }
        Commands::Monitor { interval } => {
            loop {
                print!("{}", report::status_table(&registry, &store).await?);
                println!();
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    () = tokio::time::sleep(Duration::from_secs(interval)) => {}
                }
            }
        }
    }

    Ok(())
}
