//! Orchestrator: owns the registry, graph, and bus, and drives startup
//!
//! Initializers are dispatched in registration order as tokio tasks;
//! completion is tracked with a pending counter and a `Notify`. All shared
//! state sits behind one mutex, and that mutex is never held across an
//! await or while a bus handler runs, so handlers and module code may call
//! back into the orchestrator freely.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::bus::{BusEvent, EventBus, Payload, SubscriptionId};
use crate::context::ModuleContext;
use crate::error::{Result, WireError};
use crate::graph::{self, DependencyGraph};
use crate::registry::{InitFn, InsertOutcome, Instance, ModuleDecl, ModuleInfo, ModuleRegistry};
use crate::resolver;

/// Name of the synthetic root vertex every module hangs off
pub(crate) const ROOT_VERTEX: &str = "__root__";

/// Namespace whose events announce module completions; the event name is
/// the module name and the payload is its `Instance`
pub const MODULE_EVENT_NAMESPACE: &str = "module:";

/// Fired as each module completes; the payload is the module name
pub const INIT_PROGRESS_EVENT: &str = "lifecycle:init-progress";

/// Fired once when startup completes successfully
pub const STARTED_EVENT: &str = "lifecycle:started";

/// Completion event key for one module
pub fn module_event_key(name: &str) -> String {
    format!("{}{}", MODULE_EVENT_NAMESPACE, name)
}

/// Orchestrator lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Modules may register; nothing runs yet
    Created,
    /// Startup in progress; registrations join the in-flight pass
    Starting,
    /// Startup finished; new registrations initialize out of band
    Started,
    /// Startup aborted; the first error is reported to every `start()`
    Failed,
}

/// State guarded by the single orchestrator mutex
pub(crate) struct Core {
    pub(crate) phase: Phase,
    pub(crate) registry: ModuleRegistry,
    pub(crate) graph: DependencyGraph<()>,
    pub(crate) bus: EventBus,
    /// Modules dispatched but not yet completed in the startup pass
    pending: usize,
    /// First startup failure; never retried
    failure: Option<WireError>,
}

impl Core {
    /// Run cycle detection over the whole graph from the root
    pub(crate) fn find_cycle(&self) -> Option<Vec<String>> {
        graph::find_cycle(&self.graph, ROOT_VERTEX)
    }

    fn add_module_vertex(&mut self, name: &str) {
        self.graph.add_vertex(name, None);
        if self.graph.contains(ROOT_VERTEX) {
            // Both endpoints exist here, insertion cannot fail.
            let _ = self.graph.add_edge(ROOT_VERTEX, name);
        }
    }
}

/// Shared orchestrator state: one mutex over the core plus a completion
/// signal for the startup loop
pub(crate) struct Shared {
    core: Mutex<Core>,
    progress: Notify,
}

impl Shared {
    pub(crate) fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().expect("orchestrator core lock poisoned")
    }

    pub(crate) fn get_module(&self, name: &str) -> Option<Instance> {
        self.lock_core().registry.instance(name)
    }

    pub(crate) fn on<F>(&self, key: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        self.lock_core().bus.on(key, handler)
    }

    pub(crate) fn once<F>(&self, key: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        self.lock_core().bus.once(key, handler)
    }

    pub(crate) fn off(&self, id: SubscriptionId) -> bool {
        self.lock_core().bus.off(id)
    }

    /// Emit on the bus; handlers run after the core lock is released
    pub(crate) fn emit(&self, key: &str, payload: Payload) {
        let deliveries = self.lock_core().bus.collect(key, payload);
        for delivery in deliveries {
            delivery.invoke();
        }
    }

    /// Register a declaration; dispatches immediately when the module
    /// joins an in-flight or finished startup
    pub(crate) fn register(self: &Arc<Self>, declaration: ModuleDecl) {
        let name = declaration.name().to_string();
        let dispatch = {
            let mut core = self.lock_core();
            let outcome = core.registry.insert(declaration);
            match outcome {
                InsertOutcome::Inserted => debug!("Registered module: {}", name),
                InsertOutcome::Replaced => {
                    warn!("Module {} re-registered before initialization; declaration replaced", name)
                }
                InsertOutcome::ReplacedInitialized => {
                    warn!("Module {} re-registered after initialization; existing instance kept", name)
                }
            }

            let fresh = outcome == InsertOutcome::Inserted;
            match core.phase {
                Phase::Starting if fresh => {
                    // Joins the in-flight pass and counts toward start().
                    core.add_module_vertex(&name);
                    core.pending += 1;
                    core.registry.take_init(&name)
                }
                Phase::Started if fresh => {
                    info!("Initializing late-registered module {} out of band", name);
                    core.add_module_vertex(&name);
                    core.registry.take_init(&name)
                }
                _ => None,
            }
        };
        if let Some(init) = dispatch {
            spawn_module(Arc::clone(self), name, init);
        }
    }
}

/// Module orchestrator
///
/// Owns the registry, dependency graph, and event bus. Cheap to clone;
/// clones share the same state. Independent orchestrators may coexist in
/// one process.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    /// Create an orchestrator in the `Created` phase
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    phase: Phase::Created,
                    registry: ModuleRegistry::new(),
                    graph: DependencyGraph::new(),
                    bus: EventBus::new(),
                    pending: 0,
                    failure: None,
                }),
                progress: Notify::new(),
            }),
        }
    }

    /// Register a module declaration
    ///
    /// Before startup the module is queued; during startup it joins the
    /// in-flight pass; after startup it is initialized immediately, out of
    /// band. Re-registering a name overwrites the declaration (with a
    /// warning) and never re-runs an initialized module.
    pub fn register(&self, declaration: ModuleDecl) {
        self.shared.register(declaration);
    }

    /// Initialize every registered module, respecting dependencies
    ///
    /// Idempotent: returns `Ok(())` immediately when already started, and
    /// repeats the recorded error after a failed startup. A call arriving
    /// while another is starting waits for that pass and settles with its
    /// outcome. One failing module aborts startup with its error; modules
    /// already initialized stay initialized and retrievable.
    pub async fn start(&self) -> Result<()> {
        let dispatch: Option<Vec<(String, InitFn)>> = {
            let mut core = self.shared.lock_core();
            match core.phase {
                Phase::Started => {
                    debug!("start() called again; nothing to do");
                    return Ok(());
                }
                Phase::Starting => {
                    debug!("start() called while starting; joining the in-flight pass");
                    None
                }
                Phase::Failed => {
                    return Err(core
                        .failure
                        .clone()
                        .expect("failed phase without recorded error"));
                }
                Phase::Created => {
                    let names = core.registry.names_in_order();
                    info!("Starting {} registered modules", names.len());
                    core.phase = Phase::Starting;
                    core.graph.add_vertex(ROOT_VERTEX, None);
                    for name in &names {
                        core.add_module_vertex(name);
                    }

                    // Dependencies declared up front go into the graph
                    // before anything runs; a cycle among them aborts
                    // startup here.
                    for name in &names {
                        for dependency in core.registry.declared_dependencies(name) {
                            if core.graph.contains(&dependency) {
                                let _ = core.graph.add_edge(name, &dependency);
                            }
                        }
                    }
                    if let Some(path) = core.find_cycle() {
                        let err = WireError::CyclicDependency { path };
                        error!("Startup aborted: {}", err);
                        core.phase = Phase::Failed;
                        core.failure = Some(err.clone());
                        return Err(err);
                    }

                    core.pending = names.len();
                    let mut dispatch = Vec::with_capacity(names.len());
                    for name in names {
                        let init = core
                            .registry
                            .take_init(&name)
                            .expect("undispatched record has an initializer");
                        dispatch.push((name, init));
                    }
                    Some(dispatch)
                }
            }
        };

        // Dispatch in registration order, outside the lock.
        if let Some(dispatch) = dispatch {
            for (name, init) in dispatch {
                spawn_module(Arc::clone(&self.shared), name, init);
            }
        }

        self.wait_for_completion().await
    }

    async fn wait_for_completion(&self) -> Result<()> {
        loop {
            let notified = self.shared.progress.notified();
            tokio::pin!(notified);
            // Register for the next notification before checking state so
            // a completion between check and await cannot be missed.
            notified.as_mut().enable();

            {
                let mut core = self.shared.lock_core();
                if let Some(err) = core.failure.clone() {
                    return Err(err);
                }
                if core.pending == 0 {
                    // Several callers may wait on the same pass; only the
                    // first to observe completion flips the phase and
                    // fires the started event.
                    let deliveries = if core.phase == Phase::Starting {
                        core.phase = Phase::Started;
                        info!("Module startup complete");
                        core.bus.collect(STARTED_EVENT, Payload::none())
                    } else {
                        Vec::new()
                    };
                    drop(core);
                    for delivery in deliveries {
                        delivery.invoke();
                    }
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// Instance of an initialized module, `None` otherwise; never errors
    pub fn get_module(&self, name: &str) -> Option<Instance> {
        self.shared.get_module(name)
    }

    /// Resolve instances for `names` in request order, waiting for any
    /// still initializing
    ///
    /// Usable outside any module; no graph edges are recorded because the
    /// caller is not a vertex. Unregistered names fail immediately.
    pub async fn dependency(&self, names: &[&str]) -> Result<Vec<Instance>> {
        let names = names.iter().map(|name| name.to_string()).collect();
        resolver::resolve(Arc::clone(&self.shared), names).await
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

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.shared.lock_core().phase
    }

    /// Snapshots of every registered module, in registration order
    pub fn modules(&self) -> Vec<ModuleInfo> {
        self.shared.lock_core().registry.info()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_module(shared: Arc<Shared>, name: String, init: InitFn) {
    tokio::spawn(run_module(shared, name, init));
}

async fn run_module(shared: Arc<Shared>, name: String, init: InitFn) {
    debug!("Initializing module: {}", name);
    let ctx = ModuleContext::new(name.clone(), Arc::clone(&shared));

    let outcome = std::panic::AssertUnwindSafe(init(ctx)).catch_unwind().await;
    let result = match outcome {
        Ok(Ok(instance)) => Ok(instance),
        Ok(Err(err)) => Err(match err.downcast::<WireError>() {
            // Wiring failures (cycles, unregistered names) keep their kind
            // so start() rejects with the original error.
            Ok(wire) => wire,
            Err(other) => WireError::ModuleInitialization {
                module: name.clone(),
                reason: format!("{:#}", other),
            },
        }),
        Err(_) => Err(WireError::ModuleInitialization {
            module: name.clone(),
            reason: "initializer panicked".to_string(),
        }),
    };

    match result {
        Ok(instance) => complete_module(&shared, &name, instance),
        Err(err) => fail_module(&shared, &name, err),
    }
}

fn complete_module(shared: &Arc<Shared>, name: &str, instance: Instance) {
    let deliveries = {
        let mut core = shared.lock_core();
        core.registry.mark_initialized(name, instance.clone());
        info!("Module {} initialized", name);

        let mut deliveries = core
            .bus
            .collect(&module_event_key(name), Payload::new(instance));
        deliveries.extend(
            core.bus
                .collect(INIT_PROGRESS_EVENT, Payload::new(name.to_string())),
        );
        deliveries
    };

    for delivery in deliveries {
        delivery.invoke();
    }

    // The pending count drops only after this module's completion events
    // have been delivered, so start() cannot settle ahead of them.
    {
        let mut core = shared.lock_core();
        core.pending = core.pending.saturating_sub(1);
    }
    shared.progress.notify_waiters();
}

fn fail_module(shared: &Arc<Shared>, name: &str, err: WireError) {
    error!("Module {} failed to initialize: {}", name, err);
    {
        let mut core = shared.lock_core();
        core.pending = core.pending.saturating_sub(1);
        // Out-of-band failures after startup are logged only; they must
        // not regress a started orchestrator.
        if core.phase == Phase::Starting && core.failure.is_none() {
            core.failure = Some(err);
            core.phase = Phase::Failed;
        }
    }
    shared.progress.notify_waiters();
}
