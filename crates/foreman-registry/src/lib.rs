//! Agent definition discovery for the Foreman orchestrator.
//!
//! Each agent is declared by a `config.json` in its own subdirectory of
//! `.agents/agents/`. The registry loads every definition once per
//! invocation; definitions are immutable for the lifetime of the process.

/// The per-agent definition schema.
pub mod definition;
/// Discovery and lookup over all agent definitions.
pub mod registry;

pub use definition::{AgentDefinition, GitBinding};
pub use registry::{AgentRegistry, RegisteredAgent};
