//! Module registry
//!
//! One record per registered module name: the declaration, the dependency
//! names discovered so far, the initialized flag, and the produced
//! instance. Registration order is preserved because it drives dispatch
//! order at startup.

pub mod decl;

pub use decl::{InitFn, Instance, Module, ModuleDecl};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Outcome of inserting a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// First registration under this name
    Inserted,
    /// Overwrote a not-yet-initialized record
    Replaced,
    /// Overwrote an initialized record; the existing instance is kept and
    /// the module is never re-initialized
    ReplacedInitialized,
}

/// Snapshot of a module record for host inspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Module name
    pub name: String,
    /// Dependency names discovered so far
    pub dependencies: Vec<String>,
    /// Whether initialization has completed
    pub initialized: bool,
}

/// Per-module bookkeeping
pub struct ModuleRecord {
    name: String,
    /// Taken once when the module is dispatched
    init: Option<InitFn>,
    /// Dependency names, declared up front or discovered at runtime
    dependencies: Vec<String>,
    /// Flips false -> true exactly once
    initialized: bool,
    instance: Option<Instance>,
}

/// Registry of module records in registration order
#[derive(Default)]
pub struct ModuleRegistry {
    records: HashMap<String, ModuleRecord>,
    order: Vec<String>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record for the declaration's name
    pub fn insert(&mut self, declaration: ModuleDecl) -> InsertOutcome {
        let ModuleDecl {
            name,
            dependencies,
            init,
        } = declaration;

        if let Some(existing) = self.records.get_mut(&name) {
            existing.init = Some(init);
            existing.dependencies = dependencies;
            if existing.initialized {
                // The produced instance stays; the new declaration only
                // replaces what a future dispatch would run, and startup
                // never dispatches an initialized record again.
                return InsertOutcome::ReplacedInitialized;
            }
            existing.instance = None;
            return InsertOutcome::Replaced;
        }

        self.order.push(name.clone());
        self.records.insert(
            name.clone(),
            ModuleRecord {
                name,
                init: Some(init),
                dependencies,
                initialized: false,
                instance: None,
            },
        );
        InsertOutcome::Inserted
    }

    /// Whether a name was ever registered
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Whether a module finished initializing
    pub fn is_initialized(&self, name: &str) -> bool {
        self.records
            .get(name)
            .map(|record| record.initialized)
            .unwrap_or(false)
    }

    /// The instance of an initialized module
    pub fn instance(&self, name: &str) -> Option<Instance> {
        self.records
            .get(name)
            .filter(|record| record.initialized)
            .and_then(|record| record.instance.clone())
    }

    /// Declared dependency names for a module
    pub fn declared_dependencies(&self, name: &str) -> Vec<String> {
        self.records
            .get(name)
            .map(|record| record.dependencies.clone())
            .unwrap_or_default()
    }

    /// Merge newly discovered dependency names into a module's record,
    /// keeping first-seen order and dropping duplicates
    pub fn record_dependencies(&mut self, name: &str, dependencies: &[String]) {
        if let Some(record) = self.records.get_mut(name) {
            for dependency in dependencies {
                if !record.dependencies.contains(dependency) {
                    record.dependencies.push(dependency.clone());
                }
            }
        }
    }

    /// Take a module's initializer for dispatch; None once taken
    pub fn take_init(&mut self, name: &str) -> Option<InitFn> {
        self.records.get_mut(name).and_then(|record| record.init.take())
    }

    /// Mark a module initialized and attach its instance
    pub fn mark_initialized(&mut self, name: &str, instance: Instance) {
        if let Some(record) = self.records.get_mut(name) {
            debug_assert!(!record.initialized, "module {} initialized twice", name);
            record.initialized = true;
            record.instance = Some(instance);
        }
    }

    /// Module names in registration order
    pub fn names_in_order(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Snapshots of every record, in registration order
    pub fn info(&self) -> Vec<ModuleInfo> {
        self.order
            .iter()
            .filter_map(|name| self.records.get(name))
            .map(|record| ModuleInfo {
                name: record.name.clone(),
                dependencies: record.dependencies.clone(),
                initialized: record.initialized,
            })
            .collect()
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no modules are registered
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_decl(name: &str) -> ModuleDecl {
        ModuleDecl::new(name, |_ctx| async { Ok(Instance::new(())) })
    }

    #[test]
    fn insert_preserves_registration_order() {
        let mut registry = ModuleRegistry::new();
        registry.insert(noop_decl("b"));
        registry.insert(noop_decl("a"));
        registry.insert(noop_decl("c"));

        assert_eq!(registry.names_in_order(), vec!["b", "a", "c"]);
    }

    #[test]
    fn reregistering_keeps_order_and_reports_overwrite() {
        let mut registry = ModuleRegistry::new();
        assert_eq!(registry.insert(noop_decl("a")), InsertOutcome::Inserted);
        assert_eq!(registry.insert(noop_decl("b")), InsertOutcome::Inserted);
        assert_eq!(registry.insert(noop_decl("a")), InsertOutcome::Replaced);

        assert_eq!(registry.names_in_order(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn reregistering_initialized_module_keeps_instance() {
        let mut registry = ModuleRegistry::new();
        registry.insert(noop_decl("a"));
        registry.take_init("a").unwrap();
        registry.mark_initialized("a", Instance::new(7u32));

        assert_eq!(
            registry.insert(noop_decl("a")),
            InsertOutcome::ReplacedInitialized
        );
        assert!(registry.is_initialized("a"));
        let instance = registry.instance("a").unwrap();
        assert_eq!(*instance.downcast_ref::<u32>().unwrap(), 7);
    }

    #[test]
    fn instance_is_absent_until_initialized() {
        let mut registry = ModuleRegistry::new();
        registry.insert(noop_decl("a"));

        assert!(registry.contains("a"));
        assert!(!registry.is_initialized("a"));
        assert!(registry.instance("a").is_none());
    }

    #[test]
    fn record_dependencies_unions_without_duplicates() {
        let mut registry = ModuleRegistry::new();
        registry.insert(noop_decl("a").with_dependencies(["x"]));

        registry.record_dependencies("a", &["y".to_string(), "x".to_string()]);
        registry.record_dependencies("a", &["y".to_string()]);

        assert_eq!(registry.declared_dependencies("a"), vec!["x", "y"]);
    }

    #[test]
    fn take_init_yields_once() {
        let mut registry = ModuleRegistry::new();
        registry.insert(noop_decl("a"));

        assert!(registry.take_init("a").is_some());
        assert!(registry.take_init("a").is_none());
    }
}
