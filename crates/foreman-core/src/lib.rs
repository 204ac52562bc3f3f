//! Core types shared across the Foreman orchestrator crates.
//!
//! This crate provides the unified error taxonomy and the resolved on-disk
//! layout of a Foreman project tree. Everything else (registry, state store,
//! spawn coordinator, CLI) builds on these two pieces.
//!
//! # Main types
//!
//! - [`ForemanError`] — Unified error enum for all orchestrator subsystems.
//! - [`ForemanResult`] — Convenience alias for `Result<T, ForemanError>`.
//! - [`AgentsLayout`] — Resolved paths under a project's `.agents/` tree.

/// Resolved paths for a project's `.agents/` directory tree.
pub mod layout;

pub use layout::AgentsLayout;

// --- Error types ---

/// Top-level error type for the Foreman orchestrator.
///
/// Each variant corresponds to one failure class an operator can hit; the
/// display strings are what the CLI prints before exiting non-zero.
#[derive(Debug, thiserror::Error)]
pub enum ForemanError {
    /// A malformed or missing agent definition. During registry load this is
    /// scoped to a single agent and never aborts discovery of the rest.
    #[error("Config error: {0}")]
    Config(String),

    /// An operation referenced an agent id that is not registered.
    #[error("Agent not found: {0}")]
    NotFound(String),

    /// State was read before `foreman init` ever ran.
    #[error("Orchestrator not initialized ({0}). Run: foreman init")]
    Uninitialized(String),

    /// A prompt or task document was absent at spawn time. Reported before
    /// any status mutation; a missing artifact is an operator error, not a
    /// transient condition.
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    /// The external execution service failed mid-stream.
    #[error("Execution error: {0}")]
    Execution(String),

    /// The operator cancelled a running spawn.
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`ForemanError`].
pub type ForemanResult<T> = Result<T, ForemanError>;
