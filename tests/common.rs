//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use modwire::{Instance, ModuleDecl};
use tracing_subscriber::EnvFilter;

/// Opt-in test logs; run with e.g. RUST_LOG=modwire=debug.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records the order in which modules finished initializing.
pub type InitLog = Arc<Mutex<Vec<String>>>;

pub fn init_log() -> InitLog {
    init_tracing();
    Arc::new(Mutex::new(Vec::new()))
}

pub fn logged(log: &InitLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Module with no dependencies; records its name once initialized.
pub fn leaf(name: &str, log: &InitLog) -> ModuleDecl {
    let log = Arc::clone(log);
    let tag = name.to_string();
    ModuleDecl::new(name, move |_ctx| async move {
        log.lock().unwrap().push(tag);
        Ok(Instance::new(()))
    })
}

/// Module that resolves `dependencies` through its context, then records
/// its name.
pub fn dependent(name: &str, dependencies: &[&str], log: &InitLog) -> ModuleDecl {
    let log = Arc::clone(log);
    let tag = name.to_string();
    let dependencies: Vec<String> = dependencies.iter().map(|d| d.to_string()).collect();
    ModuleDecl::new(name, move |ctx| async move {
        let names: Vec<&str> = dependencies.iter().map(String::as_str).collect();
        ctx.dependency(&names).await?;
        log.lock().unwrap().push(tag);
        Ok(Instance::new(()))
    })
}
