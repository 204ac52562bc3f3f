//! Spawn coordination for Foreman.
//!
//! A spawn is one invocation of the execution protocol for a single agent:
//! resolve the definition, load its prompt and task document, hand the
//! assembled request to the external execution service, stream the output
//! back, and drive the persisted status to a terminal state on every exit
//! path. The execution service itself is an opaque streaming collaborator
//! behind the [`ExecutionService`] trait.

/// Claude Code CLI execution backend.
pub mod claude_code;
/// The spawn state machine.
pub mod coordinator;
/// Execution-service contract and streaming event types.
pub mod executor;
/// Read-only status table and log views.
pub mod report;

pub use claude_code::ClaudeCodeService;
pub use coordinator::SpawnCoordinator;
pub use executor::{ExecEvent, ExecutionRequest, ExecutionService};
