use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Behavior;
use crate::key::Key;
use crate::object_scope::ObjectScope;
use crate::provider::Container;

/// Callback invoked with each duplicate key.
pub type DuplicateCallback = Arc<dyn Fn(&Key) + Send + Sync>;

/// Detects keys registered twice in the same container.
///
/// The seen-set belongs to one container: a child registering a key its
/// parent already has is shadowing, not duplicating, as long as each
/// container gets its own detector. Duplicates are reported, never rejected;
/// the later registration replaces the earlier one.
///
/// # Examples
///
/// ```
/// use weft_di::{Container, DuplicateRegistrationDetector, Key, ObjectScope};
/// use std::sync::Arc;
///
/// let detector = Arc::new(DuplicateRegistrationDetector::new());
/// let container = Container::new();
/// container.add_behavior(detector.clone());
///
/// container.register::<u8, _>(ObjectScope::Container, |_| Arc::new(1));
/// container.register::<u8, _>(ObjectScope::Container, |_| Arc::new(2));
///
/// assert_eq!(detector.detected(), vec![Key::of::<u8>()]);
/// ```
pub struct DuplicateRegistrationDetector {
    ignored: HashSet<TypeId>,
    callback: Option<DuplicateCallback>,
    state: Mutex<DetectorState>,
}

#[derive(Default)]
struct DetectorState {
    seen: HashSet<Key>,
    detected: Vec<Key>,
}

impl DuplicateRegistrationDetector {
    pub fn new() -> Self {
        Self {
            ignored: HashSet::new(),
            callback: None,
            state: Mutex::new(DetectorState::default()),
        }
    }

    /// Excludes every key whose service type is `T` from detection.
    pub fn ignoring<T: ?Sized + 'static>(mut self) -> Self {
        self.ignored.insert(TypeId::of::<T>());
        self
    }

    /// Invokes `callback` for each duplicate, in addition to recording it.
    pub fn with_callback(mut self, callback: DuplicateCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Duplicates seen so far, in detection order.
    pub fn detected(&self) -> Vec<Key> {
        self.state.lock().detected.clone()
    }

    pub fn has_duplicates(&self) -> bool {
        !self.state.lock().detected.is_empty()
    }
}

impl Default for DuplicateRegistrationDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for DuplicateRegistrationDetector {
    fn on_register(&self, _container: &Container, key: &Key, _scope: ObjectScope) {
        if self.ignored.contains(&key.service_type_id()) {
            return;
        }

        let duplicate = {
            let mut state = self.state.lock();
            if state.seen.insert(key.clone()) {
                false
            } else {
                state.detected.push(key.clone());
                true
            }
        };

        if duplicate {
            tracing::warn!(service = %key, "duplicate registration");
            if let Some(callback) = &self.callback {
                callback(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignored_types_are_not_reported() {
        let detector = Arc::new(DuplicateRegistrationDetector::new().ignoring::<u8>());
        let container = Container::new();
        container.add_behavior(detector.clone());

        container.register::<u8, _>(ObjectScope::Transient, |_| Arc::new(1));
        container.register::<u8, _>(ObjectScope::Transient, |_| Arc::new(2));
        container.register::<u16, _>(ObjectScope::Transient, |_| Arc::new(1));
        container.register::<u16, _>(ObjectScope::Transient, |_| Arc::new(2));

        assert_eq!(detector.detected(), vec![Key::of::<u16>()]);
    }

    #[test]
    fn names_distinguish_keys() {
        let detector = Arc::new(DuplicateRegistrationDetector::new());
        let container = Container::new();
        container.add_behavior(detector.clone());

        container.register_named::<u8, _>("a", ObjectScope::Transient, |_| Arc::new(1));
        container.register_named::<u8, _>("b", ObjectScope::Transient, |_| Arc::new(2));

        assert!(!detector.has_duplicates());
    }

    #[test]
    fn callback_sees_each_duplicate() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let sink = hits.clone();
        let detector = DuplicateRegistrationDetector::new()
            .with_callback(Arc::new(move |key: &Key| sink.lock().push(key.to_string())));
        let container = Container::new();
        container.add_behavior(Arc::new(detector));

        for _ in 0..3 {
            container.register::<u32, _>(ObjectScope::Transient, |_| Arc::new(0));
        }

        assert_eq!(*hits.lock(), ["u32", "u32"]);
    }
}
