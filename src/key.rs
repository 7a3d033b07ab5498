//! Service key types for the resolution container.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Key for service storage and lookup.
///
/// A key is the triple `(service type, argument types, name)`. Two
/// registrations with equal keys in the same container are duplicates; a
/// child container may register an equal key to shadow its parent.
///
/// The argument signature is the `TypeId` of the argument tuple a factory
/// takes (`()` for factories without runtime arguments), so `Database` and
/// `Database` built from a `(u32,)` are distinct services.
///
/// Equality and hashing only look at the `TypeId`s and the name; the type
/// name strings are carried for diagnostics.
///
/// # Examples
///
/// ```rust
/// use weft_di::Key;
///
/// struct Database;
///
/// let plain = Key::of::<Database>();
/// let primary = Key::named::<Database>("primary");
/// let by_port = Key::with_args::<Database, (u16,)>(None);
///
/// assert_ne!(plain, primary);
/// assert_ne!(plain, by_port);
/// assert_eq!(primary.service_name(), Some("primary"));
/// assert!(plain.display_name().ends_with("Database"));
/// ```
#[derive(Debug, Clone)]
pub struct Key {
    service: TypeId,
    service_type: &'static str,
    arguments: TypeId,
    arguments_type: &'static str,
    name: Option<Cow<'static, str>>,
}

impl Key {
    /// Key for an unnamed service without runtime arguments.
    #[inline]
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self::with_args::<S, ()>(None)
    }

    /// Key for a named service without runtime arguments.
    #[inline]
    pub fn named<S: ?Sized + 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::with_args::<S, ()>(Some(name.into()))
    }

    /// Key for a service whose factory takes the argument tuple `A`.
    #[inline]
    pub fn with_args<S: ?Sized + 'static, A: 'static>(name: Option<Cow<'static, str>>) -> Self {
        Self {
            service: TypeId::of::<S>(),
            service_type: std::any::type_name::<S>(),
            arguments: TypeId::of::<A>(),
            arguments_type: std::any::type_name::<A>(),
            name,
        }
    }

    /// Returns a copy of this key carrying `name` instead of its current name.
    pub fn renamed(&self, name: Option<Cow<'static, str>>) -> Self {
        Self { name, ..self.clone() }
    }

    /// Key for `U` that keeps this key's argument signature.
    pub(crate) fn forwarded<U: ?Sized + 'static>(&self, name: Option<Cow<'static, str>>) -> Self {
        Self {
            service: TypeId::of::<U>(),
            service_type: std::any::type_name::<U>(),
            name,
            ..self.clone()
        }
    }

    /// The `TypeId` of the service type.
    #[inline]
    pub fn service_type_id(&self) -> TypeId {
        self.service
    }

    /// The `TypeId` of the argument tuple.
    #[inline]
    pub fn arguments_type_id(&self) -> TypeId {
        self.arguments
    }

    /// Get the service type name for display.
    pub fn display_name(&self) -> &'static str {
        self.service_type
    }

    /// Get the registration name for named services, or None for unnamed services.
    pub fn service_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether this key carries a registration name.
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Whether the factory behind this key takes runtime arguments.
    pub fn has_arguments(&self) -> bool {
        self.arguments != TypeId::of::<()>()
    }
}

impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.service == other.service && self.arguments == other.arguments && self.name == other.name
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service.hash(state);
        self.arguments.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Sorted by readable names first so diagnostic listings are stable.
impl Ord for Key {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.service_type
            .cmp(other.service_type)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.arguments_type.cmp(other.arguments_type))
            .then_with(|| self.service.cmp(&other.service))
            .then_with(|| self.arguments.cmp(&other.arguments))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&short_type_name(self.service_type))?;
        if self.has_arguments() {
            write!(f, " with arguments {}", short_type_name(self.arguments_type))?;
        }
        if let Some(name) = &self.name {
            write!(f, " (name: \"{}\")", name)?;
        }
        Ok(())
    }
}

/// Strips module paths from a `std::any::type_name` string.
///
/// `my_app::db::Pool<my_app::db::Postgres>` becomes `Pool<Postgres>`.
pub(crate) fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            c if c.is_alphanumeric() || c == '_' => segment.push(c),
            other => {
                out.push_str(&segment);
                segment.clear();
                out.push(other);
            }
        }
    }
    out.push_str(&segment);
    out
}
