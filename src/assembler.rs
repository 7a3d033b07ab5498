//! Module assembly: from root modules to a finished resolver.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, info};

use crate::behavior::{Behavior, DuplicateCallback, DuplicateRegistrationDetector};
use crate::config::AssemblerConfig;
use crate::error::{DiError, DiResult};
use crate::graph::{DependencyGraph, DependencyGraphBuilder, OverridePolicy};
use crate::key::Key;
use crate::module::{Module, ModuleInstance, ModuleType, ResolverScope};
use crate::provider::{Container, WeakResolver};
use crate::traits::ResolverCore;

type PostAssembleHook = Box<dyn FnOnce(&Container) -> DiResult<()> + Send>;

/// A container assembled from modules.
///
/// The assembler runs the [`DependencyGraphBuilder`], creates the container
/// (a child of the parent assembler's container when one is given), installs
/// the registration behaviors, registers every module in dependency order and
/// validates the abstract registrations the modules declared.
///
/// `ModuleAssembler` is cheap to clone and resolves services itself.
///
/// # Examples
///
/// ```
/// use weft_di::{Container, DiResult, Module, ModuleAssembler, ModuleType, ObjectScope, Resolver};
/// use std::sync::Arc;
///
/// struct Greeting(String);
/// struct Greeter { greeting: Arc<Greeting> }
///
/// struct GreetingModule;
/// impl Module for GreetingModule {
///     fn assemble(&self, container: &Container) -> DiResult<()> {
///         container.register::<Greeting, _>(ObjectScope::Container, |_| Arc::new(Greeting("hello".into())));
///         Ok(())
///     }
///     fn construct() -> Option<Self> { Some(GreetingModule) }
/// }
///
/// struct GreeterModule;
/// impl Module for GreeterModule {
///     fn assemble(&self, container: &Container) -> DiResult<()> {
///         container.register_abstract::<Greeting>();
///         container.register::<Greeter, _>(ObjectScope::Graph, |r| {
///             Arc::new(Greeter { greeting: r.resolve_required::<Greeting>() })
///         });
///         Ok(())
///     }
///     fn dependencies() -> Vec<ModuleType> { vec![ModuleType::of::<GreetingModule>()] }
/// }
///
/// let assembler = ModuleAssembler::builder().module(GreeterModule).build();
/// assert_eq!(assembler.resolve_required::<Greeter>().greeting.0, "hello");
/// assert!(assembler.is_registered(&ModuleType::of::<GreetingModule>()));
/// ```
#[derive(Clone)]
pub struct ModuleAssembler {
    inner: Arc<AssemblerInner>,
}

struct AssemblerInner {
    container: Container,
    graph: DependencyGraph,
    duplicates: Arc<DuplicateRegistrationDetector>,
    scope: Option<ResolverScope>,
    parent: Option<ModuleAssembler>,
}

impl ModuleAssembler {
    /// Starts an assembler accepting modules of any resolver scope.
    pub fn builder() -> ModuleAssemblerBuilder {
        ModuleAssemblerBuilder::new(None)
    }

    /// Starts an assembler accepting only modules of resolver scope `S`.
    pub fn scoped<S: ?Sized + 'static>() -> ModuleAssemblerBuilder {
        ModuleAssemblerBuilder::new(Some(ResolverScope::of::<S>()))
    }

    /// The assembled container.
    pub fn resolver(&self) -> &Container {
        &self.inner.container
    }

    /// A resolver handle that does not keep the container alive.
    pub fn weak_resolver(&self) -> WeakResolver {
        self.inner.container.downgrade()
    }

    /// The module graph this assembler registered.
    pub fn graph(&self) -> &DependencyGraph {
        &self.inner.graph
    }

    /// Keys registered more than once while the modules assembled.
    pub fn duplicates(&self) -> Vec<Key> {
        self.inner.duplicates.detected()
    }

    /// The resolver scope this assembler was restricted to, if any.
    pub fn resolver_scope(&self) -> Option<ResolverScope> {
        self.inner.scope
    }

    pub fn parent(&self) -> Option<&ModuleAssembler> {
        self.inner.parent.as_ref()
    }

    /// Whether `module_type` was registered by this assembler or an ancestor.
    pub fn is_registered(&self, module_type: &ModuleType) -> bool {
        let mut current = Some(self);
        while let Some(assembler) = current {
            if assembler.inner.graph.contains(module_type) {
                return true;
            }
            current = assembler.parent();
        }
        false
    }
}

impl ResolverCore for ModuleAssembler {
    fn resolve_any(&self, key: &Key, arguments: &dyn Any) -> DiResult<Arc<dyn Any + Send + Sync>> {
        self.inner.container.resolve_any(key, arguments)
    }

    fn diagnostics(&self) -> Option<String> {
        self.inner.container.diagnostics()
    }
}

impl std::fmt::Debug for ModuleAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleAssembler")
            .field("modules", &self.inner.graph.module_types())
            .field("scope", &self.inner.scope)
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

/// Builder for [`ModuleAssembler`].
pub struct ModuleAssemblerBuilder {
    scope: Option<ResolverScope>,
    parent: Option<ModuleAssembler>,
    modules: Vec<ModuleInstance>,
    config: AssemblerConfig,
    on_duplicate: Option<DuplicateCallback>,
    post_assemble: Option<PostAssembleHook>,
    behaviors: Vec<Arc<dyn Behavior>>,
}

impl ModuleAssemblerBuilder {
    fn new(scope: Option<ResolverScope>) -> Self {
        Self {
            scope,
            parent: None,
            modules: Vec::new(),
            config: AssemblerConfig::default(),
            on_duplicate: None,
            post_assemble: None,
            behaviors: Vec::new(),
        }
    }

    /// Builds a child of `parent`: its container falls back to the parent's,
    /// and modules the parent already registered are skipped.
    pub fn parent(mut self, parent: &ModuleAssembler) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Adds a root module.
    pub fn module<M: Module>(mut self, module: M) -> Self {
        self.modules.push(ModuleInstance::new(module));
        self
    }

    pub fn module_instance(mut self, module: ModuleInstance) -> Self {
        self.modules.push(module);
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: AssemblerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn override_policy(mut self, policy: OverridePolicy) -> Self {
        self.config.override_policy = policy;
        self
    }

    /// Marks the assembly as running under test, for [`OverridePolicy::Contextual`].
    pub fn testing(mut self, testing: bool) -> Self {
        self.config.testing = testing;
        self
    }

    /// Invokes `callback` for every duplicate registration.
    pub fn on_duplicate<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Key) + Send + Sync + 'static,
    {
        self.on_duplicate = Some(Arc::new(callback));
        self
    }

    /// Runs `hook` after all modules registered and before abstract
    /// registrations are validated.
    pub fn post_assemble<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&Container) -> DiResult<()> + Send + 'static,
    {
        self.post_assemble = Some(Box::new(hook));
        self
    }

    /// Adds a behavior installed before any module registers.
    pub fn behavior(mut self, behavior: Arc<dyn Behavior>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    /// Assembles the modules.
    ///
    /// # Errors
    ///
    /// [`DiError::InvalidConfig`] for an invalid configuration, structural
    /// errors from the graph builder, [`DiError::ScopeMismatch`]
    /// for modules of the wrong resolver scope, [`DiError::Assembly`] when a
    /// module fails to register, [`DiError::DuplicateRegistration`] when
    /// duplicates are configured to fail, and
    /// [`DiError::AbstractRegistrationUnfulfilled`] for unmet abstract
    /// registrations.
    pub fn try_build(self) -> DiResult<ModuleAssembler> {
        self.config.validate()?;
        if let Some(scope) = self.scope {
            check_scopes(scope, self.modules.iter().map(ModuleInstance::module_type))?;
        }

        let mut graph_builder = DependencyGraphBuilder::new(self.config.override_policy)
            .testing(self.config.testing);
        for module in self.modules {
            graph_builder = graph_builder.module_instance(module);
        }
        if let Some(parent) = &self.parent {
            let parent = parent.clone();
            graph_builder = graph_builder.registered_in_parent(move |module_type| parent.is_registered(module_type));
        }
        let graph = graph_builder.build()?;

        if let Some(scope) = self.scope {
            check_scopes(scope, graph.module_types())?;
        }

        let container = match &self.parent {
            Some(parent) => parent.resolver().child(),
            None => Container::with_max_resolution_depth(self.config.max_resolution_depth),
        };

        let mut detector = DuplicateRegistrationDetector::new();
        if let Some(callback) = self.on_duplicate {
            detector = detector.with_callback(callback);
        }
        let duplicates = Arc::new(detector);
        container.add_behavior(duplicates.clone());
        for behavior in self.behaviors {
            container.add_behavior(behavior);
        }
        container.attach_graph_description(graph.describe());

        for module in graph.modules() {
            let module_type = module.module_type();
            debug!(module = %module_type, "assembling module");
            module.assemble(&container).map_err(|err| DiError::Assembly {
                module: module_type.name(),
                message: err.to_string(),
            })?;
        }

        if let Some(hook) = self.post_assemble {
            hook(&container)?;
        }

        if self.config.fail_on_duplicates {
            if let Some(key) = duplicates.detected().into_iter().next() {
                return Err(DiError::DuplicateRegistration(key));
            }
        }

        container.validate_abstract_registrations()?;

        info!(
            modules = graph.len(),
            registrations = container.registrations().len(),
            duplicates = duplicates.detected().len(),
            "module assembly finished"
        );

        Ok(ModuleAssembler {
            inner: Arc::new(AssemblerInner {
                container,
                graph,
                duplicates,
                scope: self.scope,
                parent: self.parent,
            }),
        })
    }

    /// Assembles the modules, treating any error as fatal.
    ///
    /// # Panics
    ///
    /// Panics with a formatted description of the error returned by
    /// [`try_build`](Self::try_build).
    #[track_caller]
    pub fn build(self) -> ModuleAssembler {
        match self.try_build() {
            Ok(assembler) => assembler,
            Err(err) => {
                tracing::error!(error = %err, "module assembly failed");
                panic!("{}", fatal_message(&err))
            }
        }
    }
}

fn check_scopes(expected: ResolverScope, modules: impl IntoIterator<Item = ModuleType>) -> DiResult<()> {
    for module_type in modules {
        let actual = module_type.resolver_scope();
        if actual != expected {
            return Err(DiError::ScopeMismatch {
                module: module_type.name(),
                expected: expected.name(),
                actual: actual.name(),
            });
        }
    }
    Ok(())
}

fn fatal_message(err: &DiError) -> String {
    let hint = match err {
        DiError::MissingModule { .. } => {
            "\nSupply the module to the assembler or make it auto-constructible with `Module::construct`."
        }
        DiError::InvalidOverride { .. } => "\nAn override module must list the module it stands in for in `Module::replaces`.",
        DiError::AbstractRegistrationUnfulfilled(_) => {
            "\nRegister the listed services in one of the assembled modules or in a parent assembler."
        }
        DiError::ScopeMismatch { .. } => "\nAssemble the module with an assembler of its own resolver scope.",
        _ => "",
    };
    format!("Module assembly failed: {}{}", err, hint)
}
