use super::Behavior;
use crate::key::Key;
use crate::object_scope::ObjectScope;
use crate::provider::Container;

/// Behavior that emits a `tracing` event for every registration.
///
/// Events are logged at `debug` level under the `weft_di::registration`
/// target with the key, scope and an optional prefix.
pub struct LoggingBehavior {
    prefix: String,
}

impl LoggingBehavior {
    pub fn new() -> Self {
        Self::with_prefix("weft-di")
    }

    /// Creates a logging behavior whose events carry `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for LoggingBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl Behavior for LoggingBehavior {
    fn on_register(&self, container: &Container, key: &Key, scope: ObjectScope) {
        tracing::debug!(
            target: "weft_di::registration",
            prefix = %self.prefix,
            service = %key,
            scope = %scope,
            child = container.parent().is_some(),
            "registration"
        );
    }
}
