//! Resolver handles passed to factories and handed out to consumers.

use std::any::Any;
use std::sync::{Arc, Weak};

use crate::error::{DiError, DiResult};
use crate::internal::ObjectGraphId;
use crate::key::Key;
use crate::provider::{Container, ContainerInner};
use crate::traits::ResolverCore;

/// Context passed to factory functions for resolving dependencies.
///
/// A factory always runs against the container that owns its entry, and every
/// resolution made through the context joins the object graph of the call
/// that triggered the factory.
///
/// # Examples
///
/// ```
/// use weft_di::{Container, ObjectScope, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let container = Container::new();
/// container.register::<Database, _>(ObjectScope::Container, |_| {
///     Arc::new(Database { url: "postgres://localhost".to_string() })
/// });
/// container.register::<UserService, _>(ObjectScope::Transient, |resolver| {
///     // resolver is a ResolverContext bound to the current object graph
///     Arc::new(UserService { db: resolver.resolve_required::<Database>() })
/// });
///
/// let users = container.resolve_required::<UserService>();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    container: &'a Container,
    graph: ObjectGraphId,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(container: &'a Container, graph: ObjectGraphId) -> Self {
        Self { container, graph }
    }

    /// The object graph this factory call belongs to.
    pub fn graph_id(&self) -> ObjectGraphId {
        self.graph
    }

    /// The container owning the entry being built.
    pub fn container(&self) -> &'a Container {
        self.container
    }

    /// A weak handle to the owning container, safe to store inside services.
    pub fn weak_resolver(&self) -> WeakResolver {
        self.container.downgrade()
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_any(&self, key: &Key, arguments: &dyn Any) -> DiResult<Arc<dyn Any + Send + Sync>> {
        self.container.resolve_any(key, arguments)
    }

    fn diagnostics(&self) -> Option<String> {
        self.container.diagnostics()
    }
}

/// Resolver handle that does not keep its container alive.
///
/// Services that need to resolve lazily can store a `WeakResolver` without
/// creating a reference cycle through the container. Once the container is
/// dropped every resolution fails with [`DiError::ReleasedContainer`].
///
/// # Examples
///
/// ```
/// use weft_di::{Container, DiError, ObjectScope, Resolver};
/// use std::sync::Arc;
///
/// let container = Container::new();
/// container.register::<u32, _>(ObjectScope::Container, |_| Arc::new(7));
///
/// let weak = container.downgrade();
/// assert_eq!(*weak.resolve_required::<u32>(), 7);
///
/// drop(container);
/// assert!(weak.is_released());
/// assert!(matches!(weak.try_resolve::<u32>(), Err(DiError::ReleasedContainer(_))));
/// ```
#[derive(Clone)]
pub struct WeakResolver {
    inner: Weak<ContainerInner>,
}

impl WeakResolver {
    pub(crate) fn new(inner: Weak<ContainerInner>) -> Self {
        Self { inner }
    }

    /// Upgrades to a strong container handle, if the container is still alive.
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(Container::from_inner)
    }

    /// Whether the backing container has been dropped.
    pub fn is_released(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

impl ResolverCore for WeakResolver {
    fn resolve_any(&self, key: &Key, arguments: &dyn Any) -> DiResult<Arc<dyn Any + Send + Sync>> {
        match self.upgrade() {
            Some(container) => container.resolve_any(key, arguments),
            None => {
                tracing::warn!(service = %key, "resolve through a weak resolver after its container was released");
                Err(DiError::ReleasedContainer(key.clone()))
            }
        }
    }

    fn diagnostics(&self) -> Option<String> {
        self.upgrade().and_then(|container| container.diagnostics())
    }
}

impl std::fmt::Debug for WeakResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakResolver").field("released", &self.is_released()).finish()
    }
}
