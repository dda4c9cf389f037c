//! Handler resolution: the seam to whatever owns handler instances.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identifies a handler type in the registry and in the resolver.
#[derive(Clone, Copy)]
pub struct HandlerKey {
    type_id: TypeId,
    name: &'static str,
}

impl HandlerKey {
    pub fn of<H: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<H>(),
            name: type_name::<H>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for HandlerKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for HandlerKey {}

impl Hash for HandlerKey {
    fn hash<S: Hasher>(&self, state: &mut S) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A resolution context that lives for exactly one dispatched message.
///
/// Instances resolved from the same scope may be shared between the
/// handlers of that message; they are never shared with another message.
/// Dropping the scope releases whatever it created.
pub trait ResolutionScope {
    /// Resolve an instance of the given handler type, or `None` if the
    /// resolver does not know it.
    fn resolve(&self, handler: &HandlerKey) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// Creates one `ResolutionScope` per dispatched message.
pub trait HandlerResolver: Send + Sync {
    fn create_scope(&self) -> Box<dyn ResolutionScope + '_>;
}

impl<R: HandlerResolver + ?Sized> HandlerResolver for Arc<R> {
    fn create_scope(&self) -> Box<dyn ResolutionScope + '_> {
        (**self).create_scope()
    }
}

/// Resolve a handler and downcast it to its concrete type.
pub(crate) fn resolve_as<H>(scope: &dyn ResolutionScope) -> Option<Arc<H>>
where
    H: Send + Sync + 'static,
{
    scope
        .resolve(&HandlerKey::of::<H>())
        .and_then(|instance| instance.downcast::<H>().ok())
}
