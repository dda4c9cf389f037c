//! In-process handler container.
//!
//! A small resolver for applications that do not bring their own
//! dependency container. Handlers are registered either as scoped
//! factories (one instance per dispatched message) or as shared
//! singletons.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;

use super::resolver::{HandlerKey, HandlerResolver, ResolutionScope};

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn() -> Instance + Send + Sync>;

#[derive(Clone)]
enum Registration {
    Scoped(Factory),
    Singleton(Instance),
}

/// Handler container implementing `HandlerResolver`.
///
/// Cloning shares the scope counters, so a clone kept by a test can observe
/// scopes opened by the bus.
///
/// ## Example
///
/// ```ignore
/// let container = HandlerContainer::new()
///     .scoped(|| OrderPlacedHandler::new(db.clone()))
///     .singleton(AuditHandler::default());
/// ```
#[derive(Clone, Default)]
pub struct HandlerContainer {
    registrations: HashMap<TypeId, Registration>,
    active_scopes: Arc<AtomicUsize>,
    scopes_created: Arc<AtomicUsize>,
}

impl HandlerContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory invoked at most once per message scope.
    pub fn scoped<H, F>(mut self, factory: F) -> Self
    where
        H: Send + Sync + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || Arc::new(factory()) as Instance);
        self.registrations
            .insert(TypeId::of::<H>(), Registration::Scoped(factory));
        self
    }

    /// Register one instance shared by every scope.
    pub fn singleton<H>(self, handler: H) -> Self
    where
        H: Send + Sync + 'static,
    {
        self.singleton_arc(Arc::new(handler))
    }

    /// Register an already shared instance.
    pub fn singleton_arc<H>(mut self, handler: Arc<H>) -> Self
    where
        H: Send + Sync + 'static,
    {
        self.registrations
            .insert(TypeId::of::<H>(), Registration::Singleton(handler));
        self
    }

    /// Check whether a handler type is registered.
    pub fn contains<H: 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<H>())
    }

    /// Number of scopes currently open.
    pub fn active_scopes(&self) -> usize {
        self.active_scopes.load(Ordering::SeqCst)
    }

    /// Total number of scopes opened since the container was built.
    pub fn scopes_created(&self) -> usize {
        self.scopes_created.load(Ordering::SeqCst)
    }
}

impl HandlerResolver for HandlerContainer {
    fn create_scope(&self) -> Box<dyn ResolutionScope + '_> {
        self.active_scopes.fetch_add(1, Ordering::SeqCst);
        self.scopes_created.fetch_add(1, Ordering::SeqCst);
        trace!("handler scope opened");
        Box::new(ContainerScope {
            container: self,
            instances: RefCell::new(HashMap::new()),
        })
    }
}

/// Scope handed out by `HandlerContainer`; caches scoped instances.
struct ContainerScope<'a> {
    container: &'a HandlerContainer,
    instances: RefCell<HashMap<TypeId, Instance>>,
}

impl ResolutionScope for ContainerScope<'_> {
    fn resolve(&self, handler: &HandlerKey) -> Option<Instance> {
        match self.container.registrations.get(&handler.type_id())? {
            Registration::Singleton(instance) => Some(Arc::clone(instance)),
            Registration::Scoped(factory) => {
                let mut instances = self.instances.borrow_mut();
                let instance = instances
                    .entry(handler.type_id())
                    .or_insert_with(|| (**factory)());
                Some(Arc::clone(instance))
            }
        }
    }
}

impl Drop for ContainerScope<'_> {
    fn drop(&mut self) {
        self.container.active_scopes.fetch_sub(1, Ordering::SeqCst);
        trace!(
            instances = self.instances.borrow().len(),
            "handler scope released"
        );
    }
}
