use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Behavior;
use crate::error::DiError;
use crate::internal::FastMap;
use crate::key::Key;
use crate::object_scope::ObjectScope;
use crate::provider::{Container, ResolverContext};
use crate::registration::{AnyArc, Factory};
use crate::traits::{downcast_service, ResolverCore};

/// Name prefix tagging an entry as a collection contribution.
pub(crate) const COLLECTION_ITEM_PREFIX: &str = "weft.collection.item#";

/// Name of the aggregate entry registered per collected service type.
pub(crate) const COLLECTION_KEY_NAME: &str = "weft.collection";

/// Type-erased instances of one collection, parent contributions first.
pub(crate) struct ErasedCollection(Vec<AnyArc>);

impl ErasedCollection {
    pub(crate) fn instances(&self) -> &[AnyArc] {
        &self.0
    }
}

/// Aggregates collection contributions into one entry per service type.
///
/// On the first contribution for a service type in a container, the
/// collector registers a transient aggregate entry. Resolving it resolves the
/// parent container's aggregate (if any), then every contribution of this
/// container in registration order, each honoring its own object scope.
pub struct ServiceCollector {
    items: Mutex<FastMap<Key, Arc<Mutex<Vec<Key>>>>>,
}

impl ServiceCollector {
    pub fn new() -> Self {
        Self { items: Mutex::new(FastMap::default()) }
    }

    fn aggregate_factory(items: Arc<Mutex<Vec<Key>>>, aggregate: Key) -> Factory {
        Arc::new(move |ctx: &ResolverContext<'_>, _: &dyn Any| {
            let mut instances = Vec::new();

            if let Some(parent) = ctx.container().parent() {
                match parent.resolve_any(&aggregate, &()) {
                    Ok(any) => {
                        let inherited = downcast_service::<ErasedCollection>(any)?;
                        instances.extend(inherited.instances().iter().cloned());
                    }
                    Err(DiError::ResolutionFailure(missing)) if missing == aggregate => {}
                    Err(err) => return Err(err),
                }
            }

            let keys = items.lock().clone();
            for key in &keys {
                instances.push(ctx.resolve_any(key, &())?);
            }

            Ok(Arc::new(Arc::new(ErasedCollection(instances))) as AnyArc)
        })
    }
}

impl Default for ServiceCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for ServiceCollector {
    fn on_register(&self, container: &Container, key: &Key, _scope: ObjectScope) {
        let is_item = key
            .service_name()
            .map_or(false, |name| name.starts_with(COLLECTION_ITEM_PREFIX));
        if !is_item {
            return;
        }

        let aggregate = key.renamed(Some(COLLECTION_KEY_NAME.into()));
        let (items, first) = {
            let mut map = self.items.lock();
            match map.get(&aggregate) {
                Some(items) => (items.clone(), false),
                None => {
                    let items = Arc::new(Mutex::new(Vec::new()));
                    map.insert(aggregate.clone(), items.clone());
                    (items, true)
                }
            }
        };
        items.lock().push(key.clone());

        if first {
            tracing::debug!(service = %aggregate, "registering service collection");
            let factory = Self::aggregate_factory(items, aggregate.clone());
            container.register_erased(aggregate, ObjectScope::Transient, factory, None);
        }
    }
}

/// Ordered instances contributed to one service type.
///
/// Produced by [`Resolver::resolve_collection`](crate::Resolver::resolve_collection).
pub struct ServiceCollection<S: ?Sized> {
    entries: Vec<Arc<S>>,
}

impl<S: ?Sized> ServiceCollection<S> {
    pub(crate) fn new(entries: Vec<Arc<S>>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<S>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Arc<S>> {
        self.entries
    }
}

impl<S: ?Sized> Default for ServiceCollection<S> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<S: ?Sized> Clone for ServiceCollection<S> {
    fn clone(&self) -> Self {
        Self { entries: self.entries.clone() }
    }
}

impl<S: ?Sized> IntoIterator for ServiceCollection<S> {
    type Item = Arc<S>;
    type IntoIter = std::vec::IntoIter<Arc<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, S: ?Sized> IntoIterator for &'a ServiceCollection<S> {
    type Item = &'a Arc<S>;
    type IntoIter = std::slice::Iter<'a, Arc<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<S: ?Sized> std::fmt::Debug for ServiceCollection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCollection").field("len", &self.entries.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Resolver;

    #[test]
    fn empty_collection_for_unknown_type() {
        let container = Container::new();
        assert!(container.resolve_collection::<u8>().is_empty());
    }

    #[test]
    fn contributions_keep_their_scope() {
        let container = Container::new();
        container.register_into_collection::<String, _>(ObjectScope::Container, |_| Arc::new("shared".into()));
        container.register_into_collection::<String, _>(ObjectScope::Transient, |_| Arc::new("fresh".into()));

        let first = container.resolve_collection::<String>().into_vec();
        let second = container.resolve_collection::<String>().into_vec();

        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert!(!Arc::ptr_eq(&first[1], &second[1]));
    }

    #[test]
    fn child_collection_includes_parent_first() {
        let parent = Container::new();
        parent.register_into_collection::<u32, _>(ObjectScope::Transient, |_| Arc::new(1));
        let child = parent.child();
        child.register_into_collection::<u32, _>(ObjectScope::Transient, |_| Arc::new(2));
        child.register_into_collection::<u32, _>(ObjectScope::Transient, |_| Arc::new(3));

        let values: Vec<u32> = child.resolve_collection::<u32>().iter().map(|v| **v).collect();
        assert_eq!(values, [1, 2, 3]);
        let values: Vec<u32> = parent.resolve_collection::<u32>().iter().map(|v| **v).collect();
        assert_eq!(values, [1]);
    }

    #[test]
    fn child_without_contributions_sees_parent() {
        let parent = Container::new();
        parent.register_into_collection::<u32, _>(ObjectScope::Transient, |_| Arc::new(5));
        let child = parent.child();

        assert_eq!(child.resolve_collection::<u32>().len(), 1);
    }
}
