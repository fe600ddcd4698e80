//! Module declarations and the opaque instance handle
//!
//! A declaration is a unique name plus an asynchronous initializer that
//! consumes a scoped context and produces whatever value the module wants
//! to expose. The closure form is primary; the `Module` trait adapts
//! struct-based modules onto the same internal representation.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::ModuleContext;

/// Opaque handle to the value a module's initializer produced
///
/// The orchestrator tracks identity and presence only; the shape of the
/// value is the module's business. Clones share the underlying value.
#[derive(Clone)]
pub struct Instance(Arc<dyn Any + Send + Sync>);

impl Instance {
    /// Wrap a value as a module instance
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the instance as a concrete type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Convert into a shared handle of a concrete type, or give the
    /// instance back unchanged
    pub fn downcast_arc<T: Any + Send + Sync>(self) -> std::result::Result<Arc<T>, Self> {
        self.0.downcast::<T>().map_err(Self)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Instance(..)")
    }
}

/// Boxed asynchronous initializer, consumed exactly once at dispatch
pub type InitFn =
    Box<dyn FnOnce(ModuleContext) -> BoxFuture<'static, anyhow::Result<Instance>> + Send>;

/// A module declaration: unique name, optional up-front dependency names,
/// and the initializer
pub struct ModuleDecl {
    pub(crate) name: String,
    pub(crate) dependencies: Vec<String>,
    pub(crate) init: InitFn,
}

impl ModuleDecl {
    /// Declare a module from a name and an async initializer closure
    pub fn new<F, Fut>(name: impl Into<String>, init: F) -> Self
    where
        F: FnOnce(ModuleContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Instance>> + Send + 'static,
    {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            init: Box::new(move |ctx| Box::pin(init(ctx))),
        }
    }

    /// Declare dependency names up front
    ///
    /// The edges go into the graph at `start()` before any initializer
    /// runs, so cycles among declared dependencies abort startup early.
    /// Declaration is graph-only: instances are still obtained through
    /// `ctx.dependency`, which also accepts names never declared here.
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Adapt a trait-based module into a declaration
    pub fn from_module<M: Module + 'static>(module: M) -> Self {
        let name = module.name().to_string();
        let dependencies = module.dependencies();
        Self {
            name,
            dependencies,
            init: Box::new(move |ctx| {
                Box::pin(async move { module.initialize(ctx).await })
            }),
        }
    }

    /// The module's unique name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ModuleDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDecl")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Trait form of a module declaration
///
/// Implement this for struct-based modules and register them with
/// `ModuleDecl::from_module`.
#[async_trait]
pub trait Module: Send + Sync {
    /// Unique module name
    fn name(&self) -> &str;

    /// Dependency names known ahead of initialization
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Produce the module's instance; runs exactly once
    async fn initialize(&self, ctx: ModuleContext) -> anyhow::Result<Instance>;
}
