//! Scoped per-module context
//!
//! The restricted orchestrator view handed to each module's initializer.
//! Everything passes through to the shared orchestrator state except
//! `dependency`, which first records the calling module's edges and runs a
//! cycle check, and `start`, which always fails. This is the only path
//! through which the graph learns inter-module edges, since dependencies
//! surface only as each module's own code runs.
//!
//! Contexts are cloneable and may outlive initialization; a module whose
//! instance keeps its context can look peers up lazily after startup.

use std::sync::Arc;

use tracing::warn;

use crate::bus::{BusEvent, Payload, SubscriptionId};
use crate::error::{Result, WireError};
use crate::orchestrator::Shared;
use crate::registry::{Instance, ModuleDecl};
use crate::resolver;

/// Restricted orchestrator facade scoped to one module
#[derive(Clone)]
pub struct ModuleContext {
    module: Arc<str>,
    shared: Arc<Shared>,
}

impl ModuleContext {
    pub(crate) fn new(module: String, shared: Arc<Shared>) -> Self {
        Self {
            module: module.into(),
            shared,
        }
    }

    /// Name of the module this context belongs to
    pub fn module_name(&self) -> &str {
        &self.module
    }

    /// Resolve dependencies for the calling module
    ///
    /// Records the requested names on the module's record, inserts the
    /// module's edges into the graph, and checks for cycles before waiting
    /// on anything. A cycle fails the call with the full offending chain
    /// and nothing is resolved. Instances come back in request order.
    pub async fn dependency(&self, names: &[&str]) -> Result<Vec<Instance>> {
        let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        {
            let mut core = self.shared.lock_core();

            // Unknown names have no vertex to draw an edge to; fail before
            // touching the graph.
            for name in &names {
                if !core.registry.contains(name) {
                    return Err(WireError::UnregisteredDependency(name.clone()));
                }
            }

            core.registry.record_dependencies(&self.module, &names);
            for name in &names {
                core.graph.add_edge(&self.module, name)?;
            }
            if let Some(path) = core.find_cycle() {
                warn!(
                    "Module {} introduced a dependency cycle: {}",
                    self.module,
                    path.join(" -> ")
                );
                return Err(WireError::CyclicDependency { path });
            }
        }
        resolver::resolve(Arc::clone(&self.shared), names).await
    }

    /// Single-name convenience form of `dependency`
    pub async fn dependency_one(&self, name: &str) -> Result<Instance> {
        let mut instances = self.dependency(&[name]).await?;
        Ok(instances.remove(0))
    }

    /// Instance of an initialized module, `None` otherwise
    pub fn get_module(&self, name: &str) -> Option<Instance> {
        self.shared.get_module(name)
    }

    /// Register another module from inside an initializer
    ///
    /// The new module joins the in-flight startup pass.
    pub fn register(&self, declaration: ModuleDecl) {
        self.shared.register(declaration);
    }

    /// Always fails: a module may not recursively trigger global startup
    pub async fn start(&self) -> Result<()> {
        Err(WireError::IllegalOperation(format!(
            "module {} may not call start() from its own initializer",
            self.module
        )))
    }

    /// Subscribe to an event key (or a namespace when `key` ends in `:`)
    pub fn on<F>(&self, key: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        self.shared.on(key, handler)
    }

    /// Subscribe for a single delivery
    pub fn once<F>(&self, key: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        self.shared.once(key, handler)
    }

    /// Remove a subscription
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.shared.off(id)
    }

    /// Emit an event to current subscribers
    pub fn emit(&self, key: &str, payload: Payload) {
        self.shared.emit(key, payload);
    }
}
