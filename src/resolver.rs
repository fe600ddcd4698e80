//! Dependency resolution
//!
//! Resolves a set of module names to their instances, in request order.
//! Names still initializing are waited on via `once` subscriptions to
//! their completion events; every firing re-checks the full set, so
//! several dependencies finishing in any order complete the request
//! exactly once. The initial check and the subscriptions happen under the
//! same core lock the completion path uses to flip the initialized flag,
//! so a completion cannot slip between check and subscribe.
//!
//! Handlers hold the shared state through a `Weak`; a subscription that
//! never fires cannot keep the orchestrator alive on its own.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::oneshot;
use tracing::debug;

use crate::bus::BusEvent;
use crate::error::{Result, WireError};
use crate::orchestrator::{module_event_key, Shared};
use crate::registry::{Instance, ModuleRegistry};

pub(crate) async fn resolve(shared: Arc<Shared>, names: Vec<String>) -> Result<Vec<Instance>> {
    let rx = {
        let mut core = shared.lock_core();

        if let Some(instances) = instances_if_ready(&core.registry, &names) {
            return Ok(instances);
        }

        // A name nothing ever registered can never complete; waiting on it
        // would hang the caller forever.
        for name in &names {
            if !core.registry.contains(name) {
                return Err(WireError::UnregisteredDependency(name.clone()));
            }
        }

        debug!("Waiting on dependencies: {:?}", names);
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let pending: Vec<String> = names
            .iter()
            .filter(|name| !core.registry.is_initialized(name))
            .cloned()
            .collect();
        for name in pending {
            let shared: Weak<Shared> = Arc::downgrade(&shared);
            let names = names.clone();
            let tx = Arc::clone(&tx);
            core.bus.once(module_event_key(&name), move |_event: &BusEvent| {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                // Any single completion re-checks the whole set; only the
                // firing that finds every name satisfied takes the sender.
                let instances = {
                    let core = shared.lock_core();
                    instances_if_ready(&core.registry, &names)
                };
                if let Some(instances) = instances {
                    let sender = tx.lock().expect("resolver sender lock poisoned").take();
                    if let Some(sender) = sender {
                        let _ = sender.send(instances);
                    }
                }
            });
        }
        rx
    };

    // Unreachable in practice: the sender lives in bus subscriptions kept
    // alive by the same Shared this future holds.
    rx.await
        .map_err(|_| WireError::IllegalOperation("dependency resolution interrupted".to_string()))
}

/// Instances for `names` in request order, or None if any is uninitialized
fn instances_if_ready(registry: &ModuleRegistry, names: &[String]) -> Option<Vec<Instance>> {
    names.iter().map(|name| registry.instance(name)).collect()
}
