//! modwire - runtime module registry with dependency-ordered startup
//!
//! Independent units of functionality ("modules") register under unique
//! names, discover dependencies on each other as their own initialization
//! code runs, and are initialized exactly once each in an order consistent
//! with those dependencies, without the host spelling the order out.
//! Intended to be embedded in one process to wire together loosely-coupled
//! subsystems developed independently.
//!
//! ## How it works
//!
//! `register()` queues a declaration. `start()` builds a dependency graph
//! (one vertex per module plus a synthetic root), dispatches every
//! module's initializer in registration order, and settles when all of
//! them complete or the first one fails. Each initializer receives a
//! scoped [`ModuleContext`]; requesting dependencies through it records
//! graph edges, runs cycle detection, and waits on completion events for
//! modules still initializing. Cycles, unregistered names, initializer
//! errors, and illegal operations each fail with their own
//! [`WireError`] kind.
//!
//! ## Example
//!
//! ```no_run
//! use modwire::{Instance, ModuleDecl, Orchestrator};
//!
//! # async fn demo() -> modwire::Result<()> {
//! let orchestrator = Orchestrator::new();
//!
//! orchestrator.register(ModuleDecl::new("config", |_ctx| async {
//!     Ok(Instance::new("production"))
//! }));
//! orchestrator.register(ModuleDecl::new("api", |ctx| async move {
//!     let deps = ctx.dependency(&["config"]).await?;
//!     let env = *deps[0].downcast_ref::<&str>().unwrap();
//!     Ok(Instance::new(format!("api[{}]", env)))
//! }));
//!
//! orchestrator.start().await?;
//! assert!(orchestrator.get_module("api").is_some());
//! # Ok(())
//! # }
//! ```
//!
//! There is no teardown: startup only. A module that hangs leaves its
//! dependents waiting; no timeouts are imposed.

pub mod bus;
pub mod context;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod registry;

mod resolver;

pub use bus::{BusEvent, EventBus, Payload, SubscriptionId, NAMESPACE_SEPARATOR};
pub use context::ModuleContext;
pub use error::{Result, WireError};
pub use graph::{find_cycle, DependencyGraph, Vertex};
pub use orchestrator::{
    module_event_key, Orchestrator, Phase, INIT_PROGRESS_EVENT, MODULE_EVENT_NAMESPACE,
    STARTED_EVENT,
};
pub use registry::{InsertOutcome, Instance, Module, ModuleDecl, ModuleInfo};
