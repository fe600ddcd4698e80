//! Dependency resolver tests
//!
//! Ordering guarantees, fail-fast behavior, and resolution from outside
//! any module.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use modwire::{Instance, ModuleDecl, Orchestrator, WireError};

use common::*;

#[tokio::test]
async fn instances_arrive_in_request_order_regardless_of_completion() {
    let orchestrator = Orchestrator::new();
    let values: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&values);
    orchestrator.register(ModuleDecl::new("gate", move |ctx| async move {
        let deps = ctx.dependency(&["slow", "fast"]).await?;
        let mut sink = sink.lock().unwrap();
        for dep in &deps {
            sink.push(dep.downcast_ref::<&str>().unwrap().to_string());
        }
        Ok(Instance::new(()))
    }));
    orchestrator.register(ModuleDecl::new("slow", |_ctx| async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Instance::new("slow-value"))
    }));
    orchestrator.register(ModuleDecl::new("fast", |_ctx| async {
        Ok(Instance::new("fast-value"))
    }));

    orchestrator.start().await.unwrap();

    // "fast" completed first, but the request asked slow-then-fast.
    assert_eq!(*values.lock().unwrap(), vec!["slow-value", "fast-value"]);
}

#[tokio::test]
async fn resolution_outside_any_module_waits_for_startup() {
    let orchestrator = Orchestrator::new();
    let log = init_log();
    orchestrator.register(leaf("a", &log));

    let (started, resolved) =
        tokio::join!(orchestrator.start(), orchestrator.dependency(&["a"]));

    started.unwrap();
    assert_eq!(resolved.unwrap().len(), 1);
}

#[tokio::test]
async fn resolution_is_immediate_once_initialized() {
    let orchestrator = Orchestrator::new();
    let log = init_log();
    orchestrator.register(leaf("a", &log));
    orchestrator.register(leaf("b", &log));
    orchestrator.start().await.unwrap();

    let instances = orchestrator.dependency(&["b", "a"]).await.unwrap();
    assert_eq!(instances.len(), 2);
}

#[tokio::test]
async fn unknown_name_fails_fast_instead_of_hanging() {
    let orchestrator = Orchestrator::new();
    let log = init_log();
    orchestrator.register(leaf("a", &log));
    orchestrator.start().await.unwrap();

    let err = orchestrator.dependency(&["a", "ghost"]).await.unwrap_err();
    assert!(matches!(
        err,
        WireError::UnregisteredDependency(ref name) if name == "ghost"
    ));
}

#[tokio::test]
async fn shared_dependency_resolves_for_every_requester() {
    let orchestrator = Orchestrator::new();
    let log = init_log();

    orchestrator.register(dependent("first", &["base"], &log));
    orchestrator.register(dependent("second", &["base"], &log));
    orchestrator.register(ModuleDecl::new("base", |_ctx| async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(Instance::new(()))
    }));

    orchestrator.start().await.unwrap();

    let order = logged(&log);
    assert_eq!(order.len(), 2);
    assert!(order.contains(&"first".to_string()));
    assert!(order.contains(&"second".to_string()));
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn abandoned_resolution_does_not_keep_the_orchestrator_alive() {
    let freed = Arc::new(AtomicBool::new(false));
    let orchestrator = Orchestrator::new();

    // Registered but never started, so resolving it has to wait. The
    // queued initializer owns the flag; it drops with the orchestrator.
    let guard = DropFlag(Arc::clone(&freed));
    orchestrator.register(ModuleDecl::new("dormant", move |_ctx| async move {
        let _guard = guard;
        Ok(Instance::new(()))
    }));

    let waiter = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.dependency(&["dormant"]).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Abandoning the waiter leaves its completion subscription in the
    // bus; that subscription must not pin the shared state.
    waiter.abort();
    let _ = waiter.await;
    drop(orchestrator);

    assert!(freed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn transitive_cycle_is_reported_with_full_chain() {
    let orchestrator = Orchestrator::new();
    let log = init_log();

    orchestrator.register(dependent("a", &["b"], &log));
    orchestrator.register(dependent("b", &["c"], &log));
    orchestrator.register(dependent("c", &["a"], &log));

    let err = orchestrator.start().await.unwrap_err();
    match err {
        WireError::CyclicDependency { path } => {
            for name in ["a", "b", "c"] {
                assert!(path.contains(&name.to_string()), "{} missing from {:?}", name, path);
            }
        }
        other => panic!("expected cycle error, got {:?}", other),
    }
}
