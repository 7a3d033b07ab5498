//! Resolver traits for service resolution.

use std::any::Any;
use std::borrow::Cow;
use std::panic::Location;
use std::sync::Arc;

use crate::behavior::{ErasedCollection, ServiceCollection, COLLECTION_KEY_NAME};
use crate::error::{DiError, DiResult};
use crate::key::Key;

/// Core resolver trait for object-safe service resolution.
///
/// This trait provides the fundamental resolution capability in an object-safe
/// form (usable as `&dyn ResolverCore`). Implementations take the hierarchy
/// lock, track the object graph and walk the parent chain.
///
/// Most users should use the [`Resolver`] trait instead, which provides
/// typed generic methods built on top of this trait.
pub trait ResolverCore: Send + Sync {
    /// Resolves the entry registered under `key`.
    ///
    /// `arguments` is handed to the factory of entries registered with
    /// runtime arguments; pass `&()` otherwise.
    ///
    /// # Returns
    ///
    /// * `Ok(instance)` - The resolved service, stored as `Arc<Arc<S>>` inside `Arc<dyn Any>`
    /// * `Err(DiError)` - Resolution error (not found, released container, etc.)
    fn resolve_any(&self, key: &Key, arguments: &dyn Any) -> DiResult<Arc<dyn Any + Send + Sync>>;

    /// Human-readable dump of the available registrations and module graph.
    ///
    /// Used to enrich fatal resolution messages in debug builds.
    fn diagnostics(&self) -> Option<String> {
        None
    }
}

/// Unwraps a stored `Arc<Arc<S>>` into the `Arc<S>` handed to callers.
pub(crate) fn downcast_service<S>(any: Arc<dyn Any + Send + Sync>) -> DiResult<Arc<S>>
where
    S: ?Sized + Send + Sync + 'static,
{
    any.downcast::<Arc<S>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<S>()))
}

/// High-level resolver interface with generic methods for type-safe resolution.
///
/// Implemented for every [`ResolverCore`]: the [`Container`](crate::Container),
/// the [`ResolverContext`](crate::ResolverContext) handed to factories and the
/// [`WeakResolver`](crate::WeakResolver) all resolve the same way.
///
/// The `try_*` methods report why resolution failed. The plain methods return
/// `None` on failure, and the `*_required` methods escalate to a panic carrying
/// the call site.
///
/// # Examples
///
/// ```
/// use weft_di::{Container, ObjectScope, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String {
///         format!("LOG: {}", msg)
///     }
/// }
///
/// let container = Container::new();
/// container.register::<usize, _>(ObjectScope::Container, |_| Arc::new(42));
/// container.register::<dyn Logger, _>(ObjectScope::Container, |_| Arc::new(ConsoleLogger));
///
/// assert_eq!(*container.resolve_required::<usize>(), 42);
/// let logger = container.resolve::<dyn Logger>().unwrap();
/// assert_eq!(logger.log("ready"), "LOG: ready");
/// assert!(container.resolve::<String>().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a service by type, reporting failures.
    fn try_resolve<S>(&self) -> DiResult<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        downcast_service(self.resolve_any(&Key::of::<S>(), &())?)
    }

    /// Resolves a service by type.
    fn resolve<S>(&self) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.try_resolve::<S>().ok()
    }

    /// Resolves a named service, reporting failures.
    fn try_resolve_named<S>(&self, name: impl Into<Cow<'static, str>>) -> DiResult<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        downcast_service(self.resolve_any(&Key::named::<S>(name), &())?)
    }

    /// Resolves a named service.
    fn resolve_named<S>(&self, name: impl Into<Cow<'static, str>>) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.try_resolve_named::<S>(name).ok()
    }

    /// Resolves a service registered with runtime arguments `A`, reporting failures.
    ///
    /// # Examples
    ///
    /// ```
    /// use weft_di::{Container, ObjectScope, Resolver};
    /// use std::sync::Arc;
    ///
    /// struct Endpoint { url: String }
    ///
    /// let container = Container::new();
    /// container.register_with_args::<Endpoint, (String, u16), _>(
    ///     None,
    ///     ObjectScope::Transient,
    ///     |_, (host, port)| Arc::new(Endpoint { url: format!("{}:{}", host, port) }),
    /// );
    ///
    /// let endpoint = container
    ///     .try_resolve_with_args::<Endpoint, _>(("localhost".to_string(), 8080u16))
    ///     .unwrap();
    /// assert_eq!(endpoint.url, "localhost:8080");
    /// ```
    fn try_resolve_with_args<S, A>(&self, arguments: A) -> DiResult<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        downcast_service(self.resolve_any(&Key::with_args::<S, A>(None), &arguments)?)
    }

    /// Resolves a service registered with runtime arguments `A`.
    fn resolve_with_args<S, A>(&self, arguments: A) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        self.try_resolve_with_args::<S, A>(arguments).ok()
    }

    /// Resolves a named service registered with runtime arguments `A`, reporting failures.
    fn try_resolve_named_with_args<S, A>(
        &self,
        name: impl Into<Cow<'static, str>>,
        arguments: A,
    ) -> DiResult<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        let key = Key::with_args::<S, A>(Some(name.into()));
        downcast_service(self.resolve_any(&key, &arguments)?)
    }

    /// Resolves a named service registered with runtime arguments `A`.
    fn resolve_named_with_args<S, A>(&self, name: impl Into<Cow<'static, str>>, arguments: A) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        self.try_resolve_named_with_args::<S, A>(name, arguments).ok()
    }

    /// Resolves an optional integration point.
    ///
    /// Optional services are declared with
    /// [`Container::register_abstract_optional`](crate::Container::register_abstract_optional).
    /// A concrete registration of `S` resolves to `Some`. When no module
    /// supplies one, validation registers an absent value and this returns
    /// `Ok(None)`.
    fn try_resolve_optional<S>(&self) -> DiResult<Option<Arc<S>>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let key = Key::of::<S>();
        match self.resolve_any(&key, &()) {
            Ok(any) => return downcast_service::<S>(any).map(Some),
            Err(DiError::ResolutionFailure(missing)) if missing == key => {}
            Err(err) => return Err(err),
        }
        let any = self.resolve_any(&Key::of::<Option<Arc<S>>>(), &())?;
        let optional = downcast_service::<Option<Arc<S>>>(any)?;
        Ok((*optional).clone())
    }

    /// Resolves an optional integration point, folding every failure into `None`.
    fn resolve_optional<S>(&self) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.try_resolve_optional::<S>().ok().flatten()
    }

    /// Resolves every entry registered through
    /// [`Container::register_into_collection`](crate::Container::register_into_collection),
    /// parent container entries first.
    ///
    /// A type nobody contributed to resolves to an empty collection.
    fn try_resolve_collection<S>(&self) -> DiResult<ServiceCollection<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let key = Key::named::<S>(COLLECTION_KEY_NAME);
        let erased = match self.resolve_any(&key, &()) {
            Ok(any) => downcast_service::<ErasedCollection>(any)?,
            Err(DiError::ResolutionFailure(missing)) if missing == key => {
                return Ok(ServiceCollection::default())
            }
            Err(err) => return Err(err),
        };
        let entries = erased
            .instances()
            .iter()
            .cloned()
            .map(downcast_service::<S>)
            .collect::<DiResult<Vec<_>>>()?;
        Ok(ServiceCollection::new(entries))
    }

    /// Resolves a service collection, yielding an empty one on failure.
    fn resolve_collection<S>(&self) -> ServiceCollection<S>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.try_resolve_collection::<S>().unwrap_or_default()
    }

    /// Resolves a service, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be resolved. The message names the call
    /// site and, in debug builds, lists the available registrations together
    /// with the module graph that produced them.
    #[track_caller]
    fn resolve_required<S>(&self) -> Arc<S>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let location = Location::caller();
        self.try_resolve::<S>()
            .unwrap_or_else(|e| required_failure(self, &e, location))
    }

    /// Resolves a named service, panicking on failure.
    #[track_caller]
    fn resolve_named_required<S>(&self, name: impl Into<Cow<'static, str>>) -> Arc<S>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let location = Location::caller();
        self.try_resolve_named::<S>(name)
            .unwrap_or_else(|e| required_failure(self, &e, location))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

fn required_failure<R, T>(resolver: &R, err: &DiError, location: &Location<'_>) -> T
where
    R: ResolverCore + ?Sized,
{
    let mut message = format!("Failed to resolve at {}: {}", location, err);
    if cfg!(debug_assertions) {
        if let Some(diagnostics) = resolver.diagnostics() {
            message.push_str("\n\n");
            message.push_str(&diagnostics);
        }
    }
    panic!("{}", message)
}
