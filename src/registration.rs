//! Registry entries and per-scope instance storage.

use std::any::Any;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::DiResult;
use crate::internal::{FastMap, ObjectGraphId};
use crate::key::Key;
use crate::object_scope::ObjectScope;
use crate::provider::ResolverContext;

// Type-erased Arc for storage. A service `S` is stored as `Arc<Arc<S>>` so
// that unsized services (`dyn Trait`) use the same path as concrete ones.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Factory =
    Arc<dyn for<'a> Fn(&ResolverContext<'a>, &dyn Any) -> DiResult<AnyArc> + Send + Sync>;

pub(crate) type InitCompleted = Arc<dyn for<'a> Fn(&ResolverContext<'a>, &AnyArc) + Send + Sync>;

/// Converts the primary instance of an entry into a forwarded type.
pub(crate) type Cast = Arc<dyn Fn(AnyArc) -> DiResult<AnyArc> + Send + Sync>;

/// Weak reference to the service allocation, re-wrapped on upgrade.
pub(crate) type WeakSlot = Box<dyn Fn() -> Option<AnyArc> + Send + Sync>;

/// Builds the weak slot for an instance of a `Weak`-scoped entry.
pub(crate) type Downgrade = Arc<dyn Fn(&AnyArc) -> Option<WeakSlot> + Send + Sync>;

/// Downgrade for entries storing `Arc<Arc<S>>`.
///
/// The outer wrapper is dropped as soon as a caller unwraps the service, so
/// the slot tracks the inner `Arc<S>` consumers actually hold.
pub(crate) fn downgrade_service<S>() -> Downgrade
where
    S: ?Sized + Send + Sync + 'static,
{
    Arc::new(|instance: &AnyArc| {
        let any: &(dyn Any + Send + Sync) = &**instance;
        let service = Arc::downgrade(any.downcast_ref::<Arc<S>>()?);
        Some(Box::new(move || service.upgrade().map(|service| Arc::new(service) as AnyArc)) as WeakSlot)
    })
}

enum Stored {
    Empty,
    Graph { graph: ObjectGraphId, instance: AnyArc },
    Strong(AnyArc),
    Weak(WeakSlot),
}

/// A single factory registration.
///
/// Created on registration, mutated only through its owning container, and
/// dropped together with the container.
pub(crate) struct Entry {
    pub(crate) key: Key,
    pub(crate) scope: ObjectScope,
    pub(crate) factory: Factory,
    downgrade: Option<Downgrade>,
    init_completed: RwLock<Vec<InitCompleted>>,
    storage: Mutex<Stored>,
    forwarded: Mutex<Vec<Key>>,
}

impl Entry {
    pub(crate) fn new(key: Key, scope: ObjectScope, factory: Factory, downgrade: Option<Downgrade>) -> Self {
        Self {
            key,
            scope,
            factory,
            downgrade,
            init_completed: RwLock::new(Vec::new()),
            storage: Mutex::new(Stored::Empty),
            forwarded: Mutex::new(Vec::new()),
        }
    }

    /// Returns the instance this entry may hand out for `graph`, if any.
    pub(crate) fn cached(&self, graph: ObjectGraphId) -> Option<AnyArc> {
        match &*self.storage.lock() {
            Stored::Empty => None,
            Stored::Graph { graph: stored, instance } if *stored == graph => Some(instance.clone()),
            Stored::Graph { .. } => None,
            Stored::Strong(instance) => Some(instance.clone()),
            Stored::Weak(slot) => slot(),
        }
    }

    /// Caches a freshly built instance according to the entry's scope.
    ///
    /// Returns true when the instance was cached for `graph` and the entry must
    /// be notified once that graph completes.
    pub(crate) fn store(&self, graph: ObjectGraphId, instance: &AnyArc) -> bool {
        let mut storage = self.storage.lock();
        match self.scope {
            ObjectScope::Transient => false,
            ObjectScope::Graph => {
                *storage = Stored::Graph { graph, instance: instance.clone() };
                true
            }
            ObjectScope::Container => {
                *storage = Stored::Strong(instance.clone());
                false
            }
            ObjectScope::Weak => {
                // Untyped entries have no slot and are rebuilt on every resolve.
                *storage = match self.downgrade.as_ref().and_then(|downgrade| downgrade(instance)) {
                    Some(slot) => Stored::Weak(slot),
                    None => Stored::Empty,
                };
                false
            }
        }
    }

    /// Releases the instance held for a finished object graph.
    pub(crate) fn graph_completed(&self) {
        let released = {
            let mut storage = self.storage.lock();
            if matches!(*storage, Stored::Graph { .. }) {
                Some(std::mem::replace(&mut *storage, Stored::Empty))
            } else {
                None
            }
        };
        // Instances are dropped outside the storage lock; their Drop may resolve.
        drop(released);
    }

    /// Discards any cached instance.
    pub(crate) fn reset(&self) {
        let released = std::mem::replace(&mut *self.storage.lock(), Stored::Empty);
        drop(released);
    }

    pub(crate) fn add_init_completed(&self, hook: InitCompleted) {
        self.init_completed.write().push(hook);
    }

    pub(crate) fn run_init_completed(&self, ctx: &ResolverContext<'_>, instance: &AnyArc) {
        let hooks: Vec<InitCompleted> = self.init_completed.read().clone();
        for hook in hooks {
            hook(ctx, instance);
        }
    }

    pub(crate) fn add_forwarded(&self, key: Key) {
        self.forwarded.lock().push(key);
    }

    /// Keys forwarded to this entry through `implements`.
    pub(crate) fn forwarded(&self) -> Vec<Key> {
        self.forwarded.lock().clone()
    }
}

/// How a key reaches an entry: directly, or forwarded through a cast.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) entry: Arc<Entry>,
    pub(crate) cast: Option<Cast>,
}

impl Binding {
    pub(crate) fn direct(entry: Arc<Entry>) -> Self {
        Self { entry, cast: None }
    }

    pub(crate) fn forwarded(entry: Arc<Entry>, cast: Cast) -> Self {
        Self { entry, cast: Some(cast) }
    }
}

/// Service registry holding all bindings of one container
#[derive(Default)]
pub(crate) struct Registry {
    bindings: FastMap<Key, Binding>,
    /// Registration order, for diagnostics
    order: Vec<Key>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a binding, returning the one it replaced.
    pub(crate) fn insert(&mut self, key: Key, binding: Binding) -> Option<Binding> {
        let replaced = self.bindings.insert(key.clone(), binding);
        if replaced.is_none() {
            self.order.push(key);
        }
        replaced
    }

    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<Binding> {
        self.bindings.get(key).cloned()
    }

    #[inline]
    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.bindings.contains_key(key)
    }

    /// Keys in registration order.
    pub(crate) fn keys(&self) -> Vec<Key> {
        self.order.clone()
    }

    /// Every entry registered directly (forwarded bindings excluded).
    pub(crate) fn entries(&self) -> Vec<Arc<Entry>> {
        self.order
            .iter()
            .filter_map(|key| self.bindings.get(key))
            .filter(|binding| binding.cast.is_none())
            .map(|binding| binding.entry.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }
}
