//! Object scope definitions.

/// Instance-sharing policy of a registration.
///
/// # Scope Characteristics
///
/// - **Transient**: Never cached; the factory runs on every resolution
/// - **Graph**: Shared within one top-level resolve call (the object graph)
/// - **Container**: Created once and owned by the container for its lifetime
/// - **Weak**: Shared while at least one consumer still holds the instance
///
/// # Examples
///
/// ```rust
/// use weft_di::{Container, ObjectScope, Resolver};
/// use std::sync::Arc;
///
/// struct Pool;
/// struct Repo { pool: Arc<Pool> }
/// struct Handler { a: Arc<Repo>, b: Arc<Repo> }
///
/// let container = Container::new();
/// container.register::<Pool, _>(ObjectScope::Container, |_| Arc::new(Pool));
/// container.register::<Repo, _>(ObjectScope::Graph, |r| {
///     Arc::new(Repo { pool: r.resolve_required::<Pool>() })
/// });
/// container.register::<Handler, _>(ObjectScope::Transient, |r| Arc::new(Handler {
///     a: r.resolve_required::<Repo>(),
///     b: r.resolve_required::<Repo>(),
/// }));
///
/// let first = container.resolve_required::<Handler>();
/// let second = container.resolve_required::<Handler>();
///
/// // Graph: same instance inside one resolve call, new one on the next call
/// assert!(Arc::ptr_eq(&first.a, &first.b));
/// assert!(!Arc::ptr_eq(&first.a, &second.a));
/// // Container: always the same instance
/// assert!(Arc::ptr_eq(&first.a.pool, &second.a.pool));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ObjectScope {
    /// New instance per resolution, never cached
    Transient,
    /// Single instance per object graph
    ///
    /// Every nested resolution triggered by one top-level `resolve` call shares
    /// the instance. This is what lets two services built in the same call
    /// point at each other through an `init_completed` hook.
    #[default]
    Graph,
    /// Single instance per container, cached until the container is dropped
    /// or the scope is reset
    Container,
    /// Reused while someone else keeps it alive; the container only holds a
    /// weak reference
    Weak,
}

impl ObjectScope {
    /// Lowercase label used in logs and graph dumps.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectScope::Transient => "transient",
            ObjectScope::Graph => "graph",
            ObjectScope::Container => "container",
            ObjectScope::Weak => "weak",
        }
    }
}

impl std::fmt::Display for ObjectScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
