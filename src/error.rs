//! Error types for module wiring and startup
//!
//! Every failure mode has an explicit kind; callers match on the kind
//! rather than parsing message text. `WireError` is `Clone` so a failed
//! startup can report the same error to every later `start()` call.

use thiserror::Error;

/// Errors produced while registering, wiring, and starting modules
#[derive(Debug, Clone, Error)]
pub enum WireError {
    /// A dependency name was requested that no module ever registered.
    /// Fails the request immediately instead of waiting forever.
    #[error("Unregistered dependency: {0}")]
    UnregisteredDependency(String),

    /// A dependency edge closed a cycle reachable from the root vertex.
    /// Carries the full offending chain, first occurrence through repeat.
    #[error("Cyclic dependency: {}", .path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// A module's initializer returned an error or panicked.
    #[error("Module {module} failed to initialize: {reason}")]
    ModuleInitialization { module: String, reason: String },

    /// An operation not permitted in the caller's position, e.g. a module
    /// calling `start()` from inside its own initializer.
    #[error("Illegal operation: {0}")]
    IllegalOperation(String),

    /// An edge referenced a vertex that was never added to the graph.
    /// This is a programming error, not a cycle.
    #[error("Vertex not found: {0}")]
    VertexNotFound(String),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, WireError>;
