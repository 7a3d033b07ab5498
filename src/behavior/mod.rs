//! Registration behaviors.
//!
//! A [`Behavior`] is notified of every registration made in the container it
//! was added to, including forwarded type keys. Behaviors are added before
//! modules register so they see the complete registration stream.
//!
//! Every container carries an [`AbstractRegistrationContainer`] and a
//! [`ServiceCollector`]. The module assembler adds a
//! [`DuplicateRegistrationDetector`]; other behaviors are opt-in.

use crate::key::Key;
use crate::object_scope::ObjectScope;
use crate::provider::Container;

mod abstract_registration;
mod collector;
mod duplicate;
mod logging;

pub use abstract_registration::AbstractRegistrationContainer;
pub use collector::{ServiceCollection, ServiceCollector};
pub(crate) use collector::{ErasedCollection, COLLECTION_ITEM_PREFIX, COLLECTION_KEY_NAME};
pub use duplicate::{DuplicateCallback, DuplicateRegistrationDetector};
pub use logging::LoggingBehavior;

/// Hook invoked on every registration.
///
/// # Examples
///
/// ```
/// use weft_di::{Behavior, Container, Key, ObjectScope};
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
///
/// let container = Container::new();
/// container.add_behavior(Arc::new(move |_: &Container, key: &Key, scope: ObjectScope| {
///     sink.lock().unwrap().push(format!("{} [{}]", key, scope));
/// }));
/// container.register::<u8, _>(ObjectScope::Container, |_| Arc::new(1));
///
/// assert_eq!(*seen.lock().unwrap(), ["u8 [container]"]);
/// ```
pub trait Behavior: Send + Sync {
    /// Called after `key` was registered in `container`.
    ///
    /// The registry lock is released at this point, so a behavior may
    /// register further entries into `container`.
    fn on_register(&self, container: &Container, key: &Key, scope: ObjectScope);
}

impl<F> Behavior for F
where
    F: Fn(&Container, &Key, ObjectScope) + Send + Sync,
{
    fn on_register(&self, container: &Container, key: &Key, scope: ObjectScope) {
        self(container, key, scope)
    }
}
