//! Durable orchestration state for Foreman.
//!
//! The state store is the single source of truth across invocations: there
//! is no long-lived scheduler process, so every command reads and writes
//! these files. Three files live under `.agents/state/`:
//!
//! - `agent-status.json` — one [`AgentStatus`] per registered agent.
//! - `task-assignments.json` — agent id to task id.
//! - `completion-log.json` — append-only [`CompletionLog`].
//!
//! All writes funnel through an atomic write-to-temp-then-rename helper so
//! a concurrently running status query never observes a truncated file.

/// Persisted record types.
pub mod status;
/// The file-backed store itself.
pub mod store;

pub use status::{AgentState, AgentStatus, CompletionEntry, CompletionLog, StatusMap, TaskAssignments};
pub use store::StateStore;
