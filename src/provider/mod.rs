//! Resolution container.
//!
//! This module contains the [`Container`] type, the handles returned by its
//! registration methods and the resolver handles used by factories.

use std::any::Any;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::behavior::{AbstractRegistrationContainer, Behavior, ServiceCollector, COLLECTION_ITEM_PREFIX};
use crate::error::{DiError, DiResult};
use crate::internal::{DepthGuard, HierarchyLock, ObjectGraphId, ResolutionState, DEFAULT_MAX_DEPTH};
use crate::key::Key;
use crate::object_scope::ObjectScope;
use crate::registration::{downgrade_service, AnyArc, Binding, Cast, Downgrade, Entry, Factory, Registry};
use crate::traits::{downcast_service, ResolverCore};

pub mod context;
pub use context::{ResolverContext, WeakResolver};

static NEXT_COLLECTION_ITEM: AtomicU64 = AtomicU64::new(0);

/// Resolution container holding registrations and cached instances.
///
/// The `Container` is the heart of the runtime. It owns the registry entries,
/// resolves them according to their [`ObjectScope`], and may have a parent
/// whose registrations it falls back to.
///
/// # Hierarchy
///
/// A child created with [`child`](Container::child) checks its own entries
/// first and then its ancestors. Registering a key the parent already has is
/// not a duplicate; it shadows the parent for lookups through the child.
///
/// # Thread Safety
///
/// Every container of one hierarchy shares a single reentrant lock. Register
/// and resolve hold it for their full duration, so a factory may resolve
/// further services on the same thread while other threads wait their turn.
/// `Container` is cheap to clone (it uses `Arc` internally).
///
/// # Examples
///
/// ```
/// use weft_di::{Container, ObjectScope, Resolver};
/// use std::sync::Arc;
///
/// struct Config { name: &'static str }
///
/// let parent = Container::new();
/// parent.register::<Config, _>(ObjectScope::Container, |_| Arc::new(Config { name: "parent" }));
///
/// let child = parent.child();
/// child.register::<Config, _>(ObjectScope::Container, |_| Arc::new(Config { name: "child" }));
///
/// assert_eq!(child.resolve_required::<Config>().name, "child");
/// assert_eq!(parent.resolve_required::<Config>().name, "parent");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    parent: Option<Container>,
    lock: Arc<HierarchyLock>,
    registry: RwLock<Registry>,
    behaviors: RwLock<Vec<Arc<dyn Behavior>>>,
    abstracts: Arc<AbstractRegistrationContainer>,
    graph_description: OnceCell<String>,
}

impl Container {
    /// Creates an empty root container.
    pub fn new() -> Self {
        Self::with_max_resolution_depth(DEFAULT_MAX_DEPTH)
    }

    /// Creates an empty root container with a custom recursion limit.
    ///
    /// Resolving deeper than `max_depth` nested levels is treated as an
    /// unbroken dependency cycle and panics. A limit of 0 is raised to 1.
    pub fn with_max_resolution_depth(max_depth: usize) -> Self {
        Self::build(None, ResolutionState::new_lock(max_depth.max(1)))
    }

    /// The recursion limit of this container's hierarchy.
    pub fn max_resolution_depth(&self) -> usize {
        self.inner.lock.lock().max_depth()
    }

    /// Creates a child container sharing this container's hierarchy lock.
    pub fn child(&self) -> Self {
        Self::build(Some(self.clone()), self.inner.lock.clone())
    }

    fn build(parent: Option<Container>, lock: Arc<HierarchyLock>) -> Self {
        let abstracts = Arc::new(AbstractRegistrationContainer::new());
        let behaviors: Vec<Arc<dyn Behavior>> = vec![
            abstracts.clone() as Arc<dyn Behavior>,
            Arc::new(ServiceCollector::new()) as Arc<dyn Behavior>,
        ];
        Self {
            inner: Arc::new(ContainerInner {
                parent,
                lock,
                registry: RwLock::new(Registry::new()),
                behaviors: RwLock::new(behaviors),
                abstracts,
                graph_description: OnceCell::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ContainerInner>) -> Self {
        Self { inner }
    }

    /// The parent container, if this is a child.
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    /// A resolver handle that does not keep this container alive.
    pub fn downgrade(&self) -> WeakResolver {
        WeakResolver::new(Arc::downgrade(&self.inner))
    }

    /// Whether both handles point at the same container.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Registers a factory for `S` under its plain type key.
    ///
    /// The factory receives a [`ResolverContext`] for resolving dependencies
    /// and may return any `Arc` that coerces to `Arc<S>`, so `S` can be a
    /// trait object.
    ///
    /// # Examples
    ///
    /// ```
    /// use weft_di::{Container, ObjectScope, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync { fn now(&self) -> u64; }
    /// struct Fixed;
    /// impl Clock for Fixed { fn now(&self) -> u64 { 1 } }
    ///
    /// let container = Container::new();
    /// container.register::<dyn Clock, _>(ObjectScope::Container, |_| Arc::new(Fixed));
    /// assert_eq!(container.resolve_required::<dyn Clock>().now(), 1);
    /// ```
    pub fn register<S, F>(&self, scope: ObjectScope, factory: F) -> EntryHandle<S>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Arc<S> + Send + Sync + 'static,
    {
        self.register_keyed(Key::of::<S>(), scope, move |ctx: &ResolverContext<'_>, _: &dyn Any| {
            Ok(factory(ctx))
        })
    }

    /// Registers a factory for `S` under a name.
    pub fn register_named<S, F>(
        &self,
        name: impl Into<Cow<'static, str>>,
        scope: ObjectScope,
        factory: F,
    ) -> EntryHandle<S>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Arc<S> + Send + Sync + 'static,
    {
        self.register_keyed(Key::named::<S>(name), scope, move |ctx: &ResolverContext<'_>, _: &dyn Any| {
            Ok(factory(ctx))
        })
    }

    /// Registers a factory that takes runtime arguments `A` at resolve time.
    ///
    /// The argument type is part of the key: resolve the service with
    /// [`Resolver::resolve_with_args`](crate::Resolver::resolve_with_args)
    /// passing the same tuple type. Cached scopes cache the first instance
    /// regardless of later arguments.
    pub fn register_with_args<S, A, F>(
        &self,
        name: Option<Cow<'static, str>>,
        scope: ObjectScope,
        factory: F,
    ) -> EntryHandle<S>
    where
        S: ?Sized + Send + Sync + 'static,
        A: Clone + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>, A) -> Arc<S> + Send + Sync + 'static,
    {
        let key = Key::with_args::<S, A>(name);
        self.register_keyed(key, scope, move |ctx: &ResolverContext<'_>, arguments: &dyn Any| {
            let arguments = arguments
                .downcast_ref::<A>()
                .cloned()
                .ok_or(DiError::TypeMismatch(std::any::type_name::<A>()))?;
            Ok(factory(ctx, arguments))
        })
    }

    /// Contributes an entry to the service collection of `S`.
    ///
    /// Every contribution is resolved by
    /// [`Resolver::resolve_collection`](crate::Resolver::resolve_collection),
    /// in registration order and after the parent container's contributions.
    ///
    /// # Examples
    ///
    /// ```
    /// use weft_di::{Container, ObjectScope, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Plugin: Send + Sync { fn name(&self) -> &'static str; }
    /// struct A;
    /// struct B;
    /// impl Plugin for A { fn name(&self) -> &'static str { "a" } }
    /// impl Plugin for B { fn name(&self) -> &'static str { "b" } }
    ///
    /// let container = Container::new();
    /// container.register_into_collection::<dyn Plugin, _>(ObjectScope::Container, |_| Arc::new(A));
    /// container.register_into_collection::<dyn Plugin, _>(ObjectScope::Container, |_| Arc::new(B));
    ///
    /// let names: Vec<_> = container.resolve_collection::<dyn Plugin>().iter().map(|p| p.name()).collect();
    /// assert_eq!(names, ["a", "b"]);
    /// ```
    pub fn register_into_collection<S, F>(&self, scope: ObjectScope, factory: F) -> EntryHandle<S>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Arc<S> + Send + Sync + 'static,
    {
        let item = NEXT_COLLECTION_ITEM.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}{}", COLLECTION_ITEM_PREFIX, item);
        self.register_named(name, scope, factory)
    }

    fn register_keyed<S, F>(&self, key: Key, scope: ObjectScope, factory: F) -> EntryHandle<S>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>, &dyn Any) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        let erased: Factory = Arc::new(move |ctx: &ResolverContext<'_>, arguments: &dyn Any| {
            let service = factory(ctx, arguments)?;
            Ok(Arc::new(service) as AnyArc)
        });
        let entry = self.register_erased(key, scope, erased, Some(downgrade_service::<S>()));
        EntryHandle { container: self.clone(), entry, _marker: PhantomData }
    }

    /// Inserts a type-erased entry and notifies the behaviors.
    pub(crate) fn register_erased(
        &self,
        key: Key,
        scope: ObjectScope,
        factory: Factory,
        downgrade: Option<Downgrade>,
    ) -> Arc<Entry> {
        let _hierarchy = self.inner.lock.lock();
        let entry = Arc::new(Entry::new(key.clone(), scope, factory, downgrade));
        let replaced = self.inner.registry.write().insert(key.clone(), Binding::direct(entry.clone()));
        debug!(service = %key, scope = %scope, replaced = replaced.is_some(), "registered service");
        self.notify(&key, scope);
        entry
    }

    fn register_forwarded(&self, key: Key, entry: &Arc<Entry>, cast: Cast) {
        let _hierarchy = self.inner.lock.lock();
        self.inner.registry.write().insert(key.clone(), Binding::forwarded(entry.clone(), cast));
        entry.add_forwarded(key.clone());
        debug!(service = %key, target = %entry.key, "forwarded service");
        self.notify(&key, entry.scope);
    }

    fn notify(&self, key: &Key, scope: ObjectScope) {
        // Behaviors may register further entries, so the list is cloned first.
        let behaviors = self.inner.behaviors.read().clone();
        for behavior in behaviors {
            behavior.on_register(self, key, scope);
        }
    }

    /// Adds a behavior notified of every later registration in this container.
    pub fn add_behavior(&self, behavior: Arc<dyn Behavior>) {
        let _hierarchy = self.inner.lock.lock();
        self.inner.behaviors.write().push(behavior);
    }

    /// Declares that some module must register `S` concretely.
    ///
    /// Checked by [`validate_abstract_registrations`](Self::validate_abstract_registrations);
    /// the caller location is recorded for the error message.
    #[track_caller]
    pub fn register_abstract<S>(&self)
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.declare_abstract(Key::of::<S>(), None, Location::caller());
    }

    /// Declares that some module must register `S` under `name`.
    #[track_caller]
    pub fn register_abstract_named<S>(&self, name: impl Into<Cow<'static, str>>)
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.declare_abstract(Key::named::<S>(name), None, Location::caller());
    }

    /// Declares an optional integration point for `S`.
    ///
    /// If no module registers `S`, validation registers an absent value and
    /// [`Resolver::resolve_optional`](crate::Resolver::resolve_optional)
    /// yields `None` instead of validation failing.
    #[track_caller]
    pub fn register_abstract_optional<S>(&self)
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let absent: Factory = Arc::new(|_: &ResolverContext<'_>, _: &dyn Any| {
            Ok(Arc::new(Arc::new(None::<Arc<S>>)) as AnyArc)
        });
        let absent = (Key::of::<Option<Arc<S>>>(), absent);
        self.declare_abstract(Key::of::<S>(), Some(absent), Location::caller());
    }

    fn declare_abstract(&self, key: Key, absent: Option<(Key, Factory)>, location: &Location<'_>) {
        let _hierarchy = self.inner.lock.lock();
        let label = format!("{}:{}", location.file(), location.line());
        self.inner.abstracts.declare(key, label, absent);
    }

    /// Fails with every abstract registration still lacking a concrete one.
    ///
    /// Registrations in ancestor containers count as fulfilment. Optional
    /// abstract registrations never fail; their absent values are registered
    /// here.
    pub fn validate_abstract_registrations(&self) -> DiResult<()> {
        let _hierarchy = self.inner.lock.lock();
        self.inner.abstracts.validate(self)
    }

    /// The abstract-registration tracker of this container.
    pub fn abstract_registrations(&self) -> &AbstractRegistrationContainer {
        &self.inner.abstracts
    }

    /// Discards cached instances of `scope` in this container and its ancestors.
    pub fn reset_object_scope(&self, scope: ObjectScope) {
        let _hierarchy = self.inner.lock.lock();
        let mut current = Some(self);
        while let Some(container) = current {
            let entries = container.inner.registry.read().entries();
            for entry in entries.iter().filter(|entry| entry.scope == scope) {
                entry.reset();
            }
            current = container.parent();
        }
        debug!(scope = %scope, "reset object scope");
    }

    /// Keys registered directly in this container, in registration order.
    pub fn registrations(&self) -> Vec<Key> {
        self.inner.registry.read().keys()
    }

    /// Whether `key` resolves from this container or one of its ancestors.
    pub fn contains(&self, key: &Key) -> bool {
        self.lookup(key).is_some()
    }

    /// Whether `key` is registered directly in this container.
    pub fn contains_own(&self, key: &Key) -> bool {
        self.inner.registry.read().contains_key(key)
    }

    /// Attaches the module graph dump shown in resolution diagnostics.
    pub(crate) fn attach_graph_description(&self, description: String) {
        let _ = self.inner.graph_description.set(description);
    }

    fn lookup(&self, key: &Key) -> Option<(Container, Binding)> {
        let mut current = Some(self);
        while let Some(container) = current {
            if let Some(binding) = container.inner.registry.read().get(key) {
                return Some((container.clone(), binding));
            }
            current = container.parent();
        }
        None
    }

    fn instantiate(
        &self,
        entry: &Arc<Entry>,
        arguments: &dyn Any,
        graph: ObjectGraphId,
        state: &ResolutionState,
    ) -> DiResult<AnyArc> {
        if let Some(instance) = entry.cached(graph) {
            return Ok(instance);
        }

        let ctx = ResolverContext::new(self, graph);
        let built = (entry.factory)(&ctx, arguments)?;

        // The factory may have resolved this entry again through a cycle.
        if let Some(instance) = entry.cached(graph) {
            return Ok(instance);
        }
        if entry.store(graph, &built) {
            state.touch(entry.clone());
        }
        entry.run_init_completed(&ctx, &built);
        Ok(built)
    }

    fn describe_registrations(&self, out: &mut String) {
        let registry = self.inner.registry.read();
        out.push_str(&format!("Registered services ({}):\n", registry.len()));
        for entry in registry.entries() {
            out.push_str(&format!("  - {} [{}]\n", entry.key, entry.scope));
            for forwarded in entry.forwarded() {
                out.push_str(&format!("      implements {}\n", forwarded));
            }
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverCore for Container {
    fn resolve_any(&self, key: &Key, arguments: &dyn Any) -> DiResult<Arc<dyn Any + Send + Sync>> {
        let state = self.inner.lock.lock();
        let guard = DepthGuard::enter(&state, key);

        let Some((owner, binding)) = self.lookup(key) else {
            trace!(service = %key, depth = state.depth(), "no registration");
            return Err(DiError::ResolutionFailure(key.clone()));
        };
        trace!(service = %key, graph = guard.graph().as_u64(), "resolving");

        let instance = owner.instantiate(&binding.entry, arguments, guard.graph(), &state)?;
        match &binding.cast {
            Some(cast) => cast(instance),
            None => Ok(instance),
        }
    }

    fn diagnostics(&self) -> Option<String> {
        let mut out = String::new();
        let mut current = Some(self);
        let mut level = 0;
        while let Some(container) = current {
            if level > 0 {
                out.push_str(&format!("Ancestor container {}:\n", level));
            }
            container.describe_registrations(&mut out);
            if let Some(graph) = container.inner.graph_description.get() {
                out.push_str("Module graph:\n");
                out.push_str(graph);
                if !graph.ends_with('\n') {
                    out.push('\n');
                }
            }
            current = container.parent();
            level += 1;
        }
        Some(out)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("registrations", &self.inner.registry.read().len())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

/// Handle to a freshly registered entry.
///
/// Used to forward further type keys to the same entry and to attach
/// completion hooks. Dropping the handle has no effect on the registration.
pub struct EntryHandle<S: ?Sized> {
    container: Container,
    entry: Arc<Entry>,
    _marker: PhantomData<fn() -> Arc<S>>,
}

impl<S> EntryHandle<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    /// The key of the underlying entry.
    pub fn key(&self) -> &Key {
        &self.entry.key
    }

    /// The object scope of the underlying entry.
    pub fn scope(&self) -> ObjectScope {
        self.entry.scope
    }

    /// Makes the entry answer for `U` as well, sharing scope and instance.
    ///
    /// `cast` converts the service into the forwarded type; for trait objects
    /// this is an unsizing coercion (`|service| service`).
    ///
    /// # Examples
    ///
    /// ```
    /// use weft_di::{Container, ObjectScope, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Reader: Send + Sync { fn read(&self) -> u8; }
    /// trait Writer: Send + Sync { fn write(&self, v: u8); }
    ///
    /// struct Store(std::sync::atomic::AtomicU8);
    /// impl Reader for Store { fn read(&self) -> u8 { self.0.load(std::sync::atomic::Ordering::SeqCst) } }
    /// impl Writer for Store { fn write(&self, v: u8) { self.0.store(v, std::sync::atomic::Ordering::SeqCst) } }
    ///
    /// let container = Container::new();
    /// container
    ///     .register::<Store, _>(ObjectScope::Container, |_| Arc::new(Store(Default::default())))
    ///     .implements::<dyn Reader, _>(|store| store)
    ///     .implements::<dyn Writer, _>(|store| store);
    ///
    /// container.resolve_required::<dyn Writer>().write(9);
    /// assert_eq!(container.resolve_required::<dyn Reader>().read(), 9);
    /// ```
    pub fn implements<U, C>(self, cast: C) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
        C: Fn(Arc<S>) -> Arc<U> + Send + Sync + 'static,
    {
        self.forward::<U, C>(None, cast)
    }

    /// Makes the entry answer for `U` registered under `name`.
    pub fn implements_named<U, C>(self, name: impl Into<Cow<'static, str>>, cast: C) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
        C: Fn(Arc<S>) -> Arc<U> + Send + Sync + 'static,
    {
        self.forward::<U, C>(Some(name.into()), cast)
    }

    fn forward<U, C>(self, name: Option<Cow<'static, str>>, cast: C) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
        C: Fn(Arc<S>) -> Arc<U> + Send + Sync + 'static,
    {
        let key = self.entry.key.forwarded::<U>(name);
        let erased: Cast = Arc::new(move |instance: AnyArc| {
            let service = downcast_service::<S>(instance)?;
            Ok(Arc::new(cast(service)) as AnyArc)
        });
        self.container.register_forwarded(key, &self.entry, erased);
        self
    }

    /// Runs `hook` after each construction, once the instance is cached.
    ///
    /// Because the instance is already visible to its object graph, the hook
    /// may resolve services that depend back on it. This is how circular
    /// dependencies are completed: construct one side without the back
    /// reference, then patch it in here.
    ///
    /// # Examples
    ///
    /// ```
    /// use weft_di::{Container, ObjectScope, Resolver};
    /// use std::sync::{Arc, Weak};
    /// use parking_lot::Mutex;
    ///
    /// struct Parent { child: Mutex<Option<Arc<Child>>> }
    /// struct Child { parent: Weak<Parent> }
    ///
    /// let container = Container::new();
    /// container
    ///     .register::<Parent, _>(ObjectScope::Graph, |_| Arc::new(Parent { child: Mutex::new(None) }))
    ///     .init_completed(|r, parent| {
    ///         *parent.child.lock() = Some(r.resolve_required::<Child>());
    ///     });
    /// container.register::<Child, _>(ObjectScope::Graph, |r| {
    ///     Arc::new(Child { parent: Arc::downgrade(&r.resolve_required::<Parent>()) })
    /// });
    ///
    /// let parent = container.resolve_required::<Parent>();
    /// let child = parent.child.lock().clone().unwrap();
    /// assert!(Arc::ptr_eq(&child.parent.upgrade().unwrap(), &parent));
    /// ```
    pub fn init_completed<H>(self, hook: H) -> Self
    where
        H: Fn(&ResolverContext<'_>, &Arc<S>) + Send + Sync + 'static,
    {
        self.entry.add_init_completed(Arc::new(move |ctx: &ResolverContext<'_>, instance: &AnyArc| {
            let any: &(dyn Any + Send + Sync) = &**instance;
            if let Some(service) = any.downcast_ref::<Arc<S>>() {
                hook(ctx, service);
            }
        }));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Resolver;
    use std::sync::atomic::AtomicUsize;

    struct Counter(usize);

    fn counting(container: &Container, scope: ObjectScope) -> Arc<AtomicUsize> {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        container.register::<Counter, _>(scope, move |_| {
            Arc::new(Counter(seen.fetch_add(1, Ordering::SeqCst)))
        });
        calls
    }

    #[test]
    fn transient_builds_every_time() {
        let container = Container::new();
        let calls = counting(&container, ObjectScope::Transient);
        let a = container.resolve_required::<Counter>();
        let b = container.resolve_required::<Counter>();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn container_scope_is_cached() {
        let container = Container::new();
        let calls = counting(&container, ObjectScope::Container);
        let a = container.resolve_required::<Counter>();
        let b = container.resolve_required::<Counter>();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn weak_scope_lives_while_held() {
        let container = Container::new();
        let calls = counting(&container, ObjectScope::Weak);
        let a = container.resolve_required::<Counter>();
        let b = container.resolve_required::<Counter>();
        assert!(Arc::ptr_eq(&a, &b));
        drop(a);
        drop(b);
        let c = container.resolve_required::<Counter>();
        assert_eq!(c.0, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn weak_scope_is_shared_through_forwarded_keys() {
        trait Numbered: Send + Sync {
            fn number(&self) -> usize;
        }
        impl Numbered for Counter {
            fn number(&self) -> usize {
                self.0
            }
        }

        let container = Container::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        container
            .register::<Counter, _>(ObjectScope::Weak, move |_| {
                Arc::new(Counter(seen.fetch_add(1, Ordering::SeqCst)))
            })
            .implements::<dyn Numbered, _>(|counter| counter);

        let forwarded = container.resolve_required::<dyn Numbered>();
        let concrete = container.resolve_required::<Counter>();
        assert_eq!(forwarded.number(), concrete.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(concrete);
        assert_eq!(container.resolve_required::<dyn Numbered>().number(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(forwarded);
        assert_eq!(container.resolve_required::<Counter>().0, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_depth_limit_is_raised_to_one() {
        let container = Container::with_max_resolution_depth(0);
        container.register::<Counter, _>(ObjectScope::Transient, |_| Arc::new(Counter(3)));
        assert_eq!(container.max_resolution_depth(), 1);
        assert_eq!(container.resolve_required::<Counter>().0, 3);
        assert_eq!(container.child().max_resolution_depth(), 1);
    }

    #[test]
    fn reset_clears_ancestor_caches() {
        let parent = Container::new();
        let calls = counting(&parent, ObjectScope::Container);
        let child = parent.child();

        let first = child.resolve_required::<Counter>();
        child.reset_object_scope(ObjectScope::Container);
        let second = parent.resolve_required::<Counter>();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_service_reports_key() {
        let container = Container::new();
        match container.try_resolve::<Counter>() {
            Err(DiError::ResolutionFailure(key)) => assert_eq!(key, Key::of::<Counter>()),
            _ => panic!("expected a resolution failure"),
        }
        assert!(container.resolve::<Counter>().is_none());
    }

    #[test]
    fn arguments_are_part_of_the_key() {
        let container = Container::new();
        container.register_with_args::<String, (u16,), _>(None, ObjectScope::Transient, |_, (port,)| {
            Arc::new(format!("port {}", port))
        });

        assert_eq!(*container.resolve_with_args::<String, _>((8080u16,)).unwrap(), "port 8080");
        assert!(container.resolve::<String>().is_none());
        assert!(matches!(
            container.try_resolve_with_args::<String, _>((1u32,)),
            Err(DiError::ResolutionFailure(_))
        ));
    }

    #[test]
    fn diagnostics_list_registrations() {
        let container = Container::new();
        container.register::<Counter, _>(ObjectScope::Graph, |_| Arc::new(Counter(0)));
        container.attach_graph_description("Root\n".to_string());
        let text = container.diagnostics().unwrap();
        assert!(text.contains("Registered services (1):"));
        assert!(text.contains("Counter [graph]"));
        assert!(text.contains("Module graph:\nRoot"));
    }

    #[test]
    #[should_panic(expected = "Failed to resolve at")]
    fn required_resolution_panics_with_location() {
        let container = Container::new();
        let _ = container.resolve_required::<Counter>();
    }
}
