use std::collections::HashSet;

use parking_lot::Mutex;

use super::Behavior;
use crate::error::{DiError, DiResult, UnfulfilledAbstract};
use crate::key::Key;
use crate::object_scope::ObjectScope;
use crate::provider::Container;
use crate::registration::Factory;

struct AbstractRegistration {
    key: Key,
    source_label: String,
    // Key and factory of the "absent" value registered for optional abstracts.
    absent: Option<(Key, Factory)>,
}

#[derive(Default)]
struct Tracker {
    pending: Vec<AbstractRegistration>,
    concrete: HashSet<Key>,
}

/// Tracks abstract registrations against the concrete registrations of one
/// container.
///
/// An abstract registration declares that some module must eventually
/// register a key concretely. It is consumed the moment a matching concrete
/// registration happens, and [`validate`](Self::validate) reports every one
/// still outstanding once all modules have registered.
///
/// # Examples
///
/// ```
/// use weft_di::{Container, DiError, ObjectScope};
/// use std::sync::Arc;
///
/// trait Mailer: Send + Sync {}
/// struct Smtp;
/// impl Mailer for Smtp {}
///
/// let container = Container::new();
/// container.register_abstract::<dyn Mailer>();
/// container.register_abstract_named::<String>("greeting");
///
/// container.register::<dyn Mailer, _>(ObjectScope::Container, |_| Arc::new(Smtp));
///
/// match container.validate_abstract_registrations() {
///     Err(DiError::AbstractRegistrationUnfulfilled(list)) => {
///         assert_eq!(list.len(), 1);
///         assert_eq!(list[0].key.service_name(), Some("greeting"));
///     }
///     _ => unreachable!(),
/// }
/// ```
pub struct AbstractRegistrationContainer {
    tracker: Mutex<Tracker>,
}

impl AbstractRegistrationContainer {
    pub fn new() -> Self {
        Self { tracker: Mutex::new(Tracker::default()) }
    }

    pub(crate) fn declare(&self, key: Key, source_label: String, absent: Option<(Key, Factory)>) {
        let mut tracker = self.tracker.lock();
        if tracker.concrete.contains(&key) {
            tracing::trace!(service = %key, "abstract registration already fulfilled");
            return;
        }
        if tracker.pending.iter().any(|pending| pending.key == key) {
            return;
        }
        tracing::debug!(service = %key, source = %source_label, "abstract registration");
        tracker.pending.push(AbstractRegistration { key, source_label, absent });
    }

    /// Abstract registrations still waiting for a concrete one, optional ones included.
    pub fn unfulfilled(&self) -> Vec<UnfulfilledAbstract> {
        self.tracker
            .lock()
            .pending
            .iter()
            .map(|pending| UnfulfilledAbstract {
                key: pending.key.clone(),
                source_label: pending.source_label.clone(),
            })
            .collect()
    }

    /// Checks every outstanding abstract registration against `container`.
    ///
    /// Keys resolvable from `container` or its ancestors count as fulfilled.
    /// Optional abstracts without a concrete registration get their absent
    /// value registered. Everything else is reported in one aggregate error.
    pub fn validate(&self, container: &Container) -> DiResult<()> {
        let pending = std::mem::take(&mut self.tracker.lock().pending);

        let mut remaining = Vec::new();
        let mut absent = Vec::new();
        for registration in pending {
            if container.contains(&registration.key) {
                continue;
            }
            match registration.absent {
                Some(value) => absent.push(value),
                None => remaining.push(registration),
            }
        }

        // Registering notifies this tracker again, so the lock must be free.
        for (key, factory) in absent {
            if !container.contains(&key) {
                tracing::debug!(service = %key, "optional abstract registration resolved as absent");
                container.register_erased(key, ObjectScope::Container, factory, None);
            }
        }

        if remaining.is_empty() {
            return Ok(());
        }
        let unfulfilled = remaining
            .iter()
            .map(|registration| UnfulfilledAbstract {
                key: registration.key.clone(),
                source_label: registration.source_label.clone(),
            })
            .collect();
        self.tracker.lock().pending.extend(remaining);
        Err(DiError::AbstractRegistrationUnfulfilled(unfulfilled))
    }
}

impl Default for AbstractRegistrationContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for AbstractRegistrationContainer {
    fn on_register(&self, _container: &Container, key: &Key, _scope: ObjectScope) {
        let mut tracker = self.tracker.lock();
        tracker.concrete.insert(key.clone());
        tracker.pending.retain(|pending| &pending.key != key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Resolver;
    use std::sync::Arc;

    trait Analytics: Send + Sync {
        fn id(&self) -> u8;
    }

    struct Noop;
    impl Analytics for Noop {
        fn id(&self) -> u8 {
            7
        }
    }

    #[test]
    fn concrete_registration_consumes_abstract() {
        let container = Container::new();
        container.register_abstract::<u8>();
        assert_eq!(container.abstract_registrations().unfulfilled().len(), 1);

        container.register::<u8, _>(ObjectScope::Transient, |_| Arc::new(1));
        assert!(container.abstract_registrations().unfulfilled().is_empty());
        assert!(container.validate_abstract_registrations().is_ok());
    }

    #[test]
    fn source_label_points_at_declaration() {
        let container = Container::new();
        container.register_abstract::<u16>();
        let list = container.abstract_registrations().unfulfilled();
        assert!(list[0].source_label.contains("abstract_registration.rs"));
    }

    #[test]
    fn optional_abstract_resolves_absent() {
        let container = Container::new();
        container.register_abstract_optional::<dyn Analytics>();

        assert!(container.validate_abstract_registrations().is_ok());
        assert!(container.try_resolve_optional::<dyn Analytics>().unwrap().is_none());
        assert!(container.resolve::<dyn Analytics>().is_none());
    }

    #[test]
    fn optional_abstract_uses_concrete_when_present() {
        let container = Container::new();
        container.register_abstract_optional::<dyn Analytics>();
        container.register::<dyn Analytics, _>(ObjectScope::Container, |_| Arc::new(Noop));

        assert!(container.validate_abstract_registrations().is_ok());
        assert_eq!(container.resolve_optional::<dyn Analytics>().map(|a| a.id()), Some(7));
    }

    #[test]
    fn parent_registrations_fulfil_child_abstracts() {
        let parent = Container::new();
        parent.register::<u8, _>(ObjectScope::Container, |_| Arc::new(3));
        let child = parent.child();
        child.register_abstract::<u8>();

        assert!(child.validate_abstract_registrations().is_ok());
    }
}
