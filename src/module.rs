//! Modules: units of registration with declared dependencies.
//!
//! A [`Module`] registers services into a [`Container`] and declares,
//! statically, which other modules it needs and which it can stand in for.
//! Module identity is the Rust type; [`ModuleType`] carries that identity
//! together with the static declarations so the graph builder can walk
//! modules it has no instance of yet.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::DiResult;
use crate::key::short_type_name;
use crate::provider::Container;

/// A unit bundling service registrations with declared dependencies.
///
/// Only [`assemble`](Module::assemble) is required. The associated functions
/// describe the module type and are read before any instance exists.
///
/// # Example
///
/// ```rust
/// use weft_di::{Container, DiResult, Module, ModuleType, ObjectScope};
/// use std::sync::Arc;
///
/// struct Settings { url: String }
/// struct Database { url: String }
///
/// struct SettingsModule;
/// impl Module for SettingsModule {
///     fn assemble(&self, container: &Container) -> DiResult<()> {
///         container.register::<Settings, _>(ObjectScope::Container, |_| {
///             Arc::new(Settings { url: "postgres://localhost".into() })
///         });
///         Ok(())
///     }
///
///     // Auto-constructible: the assembler may create it when only depended upon.
///     fn construct() -> Option<Self> {
///         Some(SettingsModule)
///     }
/// }
///
/// struct DatabaseModule;
/// impl Module for DatabaseModule {
///     fn assemble(&self, container: &Container) -> DiResult<()> {
///         container.register_abstract::<Settings>();
///         container.register::<Database, _>(ObjectScope::Container, |r| {
///             use weft_di::Resolver;
///             Arc::new(Database { url: r.resolve_required::<Settings>().url.clone() })
///         });
///         Ok(())
///     }
///
///     fn dependencies() -> Vec<ModuleType> {
///         vec![ModuleType::of::<SettingsModule>()]
///     }
/// }
///
/// assert_eq!(ModuleType::of::<DatabaseModule>().dependencies(), [ModuleType::of::<SettingsModule>()]);
/// ```
pub trait Module: Send + Sync + 'static {
    /// Registers this module's services.
    fn assemble(&self, container: &Container) -> DiResult<()>;

    /// Modules whose registrations this module needs.
    fn dependencies() -> Vec<ModuleType>
    where
        Self: Sized,
    {
        Vec::new()
    }

    /// Modules this module can substitute for, e.g. a test fake.
    fn replaces() -> Vec<ModuleType>
    where
        Self: Sized,
    {
        Vec::new()
    }

    /// Module substituted for this one when the override policy allows it.
    ///
    /// The override must list this module in its [`replaces`](Module::replaces).
    fn default_override() -> Option<ModuleType>
    where
        Self: Sized,
    {
        None
    }

    /// The resolver scope this module's services belong to.
    fn resolver_scope() -> ResolverScope
    where
        Self: Sized,
    {
        ResolverScope::root()
    }

    /// Creates an instance without caller input, if the module supports it.
    fn construct() -> Option<Self>
    where
        Self: Sized,
    {
        None
    }
}

/// Marker for the default resolver scope.
pub struct RootScope;

/// Tag naming the resolver a module's services are meant for.
///
/// A scoped assembler only accepts modules with its own tag, so services for
/// one scope are never wired into another scope's container.
#[derive(Clone, Copy)]
pub struct ResolverScope {
    id: TypeId,
    name: &'static str,
}

impl ResolverScope {
    /// The scope identified by marker type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: std::any::type_name::<T>() }
    }

    /// The default scope.
    pub fn root() -> Self {
        Self::of::<RootScope>()
    }

    pub fn name(&self) -> String {
        short_type_name(self.name)
    }
}

impl PartialEq for ResolverScope {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ResolverScope {}

impl Hash for ResolverScope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ResolverScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResolverScope({})", self.name())
    }
}

impl fmt::Display for ResolverScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Stable identity of a module type plus its static declarations.
#[derive(Clone, Copy)]
pub struct ModuleType {
    id: TypeId,
    type_name: &'static str,
    dependencies: fn() -> Vec<ModuleType>,
    replaces: fn() -> Vec<ModuleType>,
    default_override: fn() -> Option<ModuleType>,
    resolver_scope: fn() -> ResolverScope,
    construct: fn() -> Option<ModuleInstance>,
}

fn construct_erased<M: Module>() -> Option<ModuleInstance> {
    M::construct().map(ModuleInstance::new)
}

impl ModuleType {
    pub fn of<M: Module>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            type_name: std::any::type_name::<M>(),
            dependencies: M::dependencies,
            replaces: M::replaces,
            default_override: M::default_override,
            resolver_scope: M::resolver_scope,
            construct: construct_erased::<M>,
        }
    }

    /// Short type name, without module paths.
    pub fn name(&self) -> String {
        short_type_name(self.type_name)
    }

    /// Fully qualified type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Declared dependencies, excluding any module this one replaces.
    pub fn dependencies(&self) -> Vec<ModuleType> {
        let replaces = (self.replaces)();
        (self.dependencies)()
            .into_iter()
            .filter(|dependency| !replaces.contains(dependency))
            .collect()
    }

    pub fn replaces(&self) -> Vec<ModuleType> {
        (self.replaces)()
    }

    pub fn does_replace(&self, other: &ModuleType) -> bool {
        self != other && (self.replaces)().contains(other)
    }

    pub fn default_override(&self) -> Option<ModuleType> {
        (self.default_override)()
    }

    pub fn resolver_scope(&self) -> ResolverScope {
        (self.resolver_scope)()
    }

    /// An instance created without caller input, for auto-constructible modules.
    pub fn construct(&self) -> Option<ModuleInstance> {
        (self.construct)()
    }
}

impl PartialEq for ModuleType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModuleType {}

impl Hash for ModuleType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleType({})", self.name())
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A module instance paired with its type.
#[derive(Clone)]
pub struct ModuleInstance {
    module_type: ModuleType,
    module: Arc<dyn Module>,
}

impl ModuleInstance {
    pub fn new<M: Module>(module: M) -> Self {
        Self { module_type: ModuleType::of::<M>(), module: Arc::new(module) }
    }

    pub fn module_type(&self) -> ModuleType {
        self.module_type
    }

    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }

    pub(crate) fn assemble(&self, container: &Container) -> DiResult<()> {
        self.module.assemble(container)
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleInstance").field(&self.module_type).finish()
    }
}
