//! Module dependency graph builder.
//!
//! Given the modules supplied by the caller, the builder computes the full,
//! ordered set of modules to assemble: every transitively required module
//! exactly once, each after all of its dependencies, with overrides and
//! replacements applied and the provenance of every module recorded.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{DiError, DiResult};
use crate::internal::FastMap;
use crate::module::{Module, ModuleInstance, ModuleType};

/// When default overrides declared by modules are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OverridePolicy {
    /// Always substitute default overrides
    Always,
    /// Never substitute default overrides
    Never,
    /// Substitute default overrides only when building for tests
    #[default]
    Contextual,
}

impl OverridePolicy {
    /// Whether default overrides apply, given whether the build runs under test.
    pub fn allows_overrides(&self, testing: bool) -> bool {
        match self {
            OverridePolicy::Always => true,
            OverridePolicy::Never => false,
            OverridePolicy::Contextual => testing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverridePolicy::Always => "always",
            OverridePolicy::Never => "never",
            OverridePolicy::Contextual => "contextual",
        }
    }
}

impl FromStr for OverridePolicy {
    type Err = DiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" | "on" => Ok(OverridePolicy::Always),
            "never" | "off" => Ok(OverridePolicy::Never),
            "contextual" | "when-testing" | "whentesting" => Ok(OverridePolicy::Contextual),
            other => Err(DiError::InvalidConfig(format!("unknown override policy `{}`", other))),
        }
    }
}

impl std::fmt::Display for OverridePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a module came to replace another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// The replaced module's `default_override`, applied by policy
    Default,
    /// A module supplied by the caller that lists the replaced one in `replaces`
    Explicit,
}

impl OverrideKind {
    fn label(&self) -> &'static str {
        match self {
            OverrideKind::Default => "default override",
            OverrideKind::Explicit => "replaced by input",
        }
    }
}

/// A substitution applied while building the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Override {
    pub original: ModuleType,
    pub replacement: ModuleType,
    pub kind: OverrideKind,
}

#[derive(Clone, Copy)]
struct Edge {
    requested: ModuleType,
    resolved: ModuleType,
    inherited: bool,
}

/// Builder for a [`DependencyGraph`].
///
/// # Examples
///
/// ```
/// use weft_di::{Container, DependencyGraphBuilder, DiResult, Module, ModuleType, OverridePolicy};
///
/// struct Logging;
/// impl Module for Logging {
///     fn assemble(&self, _: &Container) -> DiResult<()> { Ok(()) }
///     fn construct() -> Option<Self> { Some(Logging) }
/// }
///
/// struct Http;
/// impl Module for Http {
///     fn assemble(&self, _: &Container) -> DiResult<()> { Ok(()) }
///     fn dependencies() -> Vec<ModuleType> { vec![ModuleType::of::<Logging>()] }
/// }
///
/// let graph = DependencyGraphBuilder::new(OverridePolicy::Never)
///     .module(Http)
///     .build()
///     .unwrap();
///
/// assert_eq!(graph.module_types(), [ModuleType::of::<Logging>(), ModuleType::of::<Http>()]);
/// assert_eq!(graph.source_of(&ModuleType::of::<Logging>()), Some(ModuleType::of::<Http>()));
/// ```
pub struct DependencyGraphBuilder {
    policy: OverridePolicy,
    testing: bool,
    inputs: Vec<ModuleInstance>,
    registered_in_parent: Option<Box<dyn Fn(&ModuleType) -> bool + Send + Sync>>,
}

impl DependencyGraphBuilder {
    pub fn new(policy: OverridePolicy) -> Self {
        Self { policy, testing: false, inputs: Vec::new(), registered_in_parent: None }
    }

    /// Marks the build as running under test, for [`OverridePolicy::Contextual`].
    pub fn testing(mut self, testing: bool) -> Self {
        self.testing = testing;
        self
    }

    /// Adds a root module.
    pub fn module<M: Module>(self, module: M) -> Self {
        self.module_instance(ModuleInstance::new(module))
    }

    pub fn module_instance(mut self, module: ModuleInstance) -> Self {
        self.inputs.push(module);
        self
    }

    /// Reports module types already assembled into a parent container.
    ///
    /// Such modules are skipped, together with their dependencies.
    pub fn registered_in_parent<F>(mut self, check: F) -> Self
    where
        F: Fn(&ModuleType) -> bool + Send + Sync + 'static,
    {
        self.registered_in_parent = Some(Box::new(check));
        self
    }

    /// Walks the dependencies of every root and instantiates the result.
    ///
    /// # Errors
    ///
    /// * [`DiError::InvalidOverride`] - a default override does not list the module in its `replaces`
    /// * [`DiError::ModuleCycle`] - modules depend on each other in a cycle
    /// * [`DiError::MissingModule`] - a required module was neither supplied nor auto-constructible
    pub fn build(self) -> DiResult<DependencyGraph> {
        let overrides_enabled = self.policy.allows_overrides(self.testing);
        let mut walk = Walk {
            inputs: self.inputs.iter().map(ModuleInstance::module_type).collect(),
            overrides_enabled,
            registered_in_parent: self.registered_in_parent.as_deref(),
            order: Vec::new(),
            present: HashSet::new(),
            sources: FastMap::default(),
            children: FastMap::default(),
            overrides: Vec::new(),
            inherited: Vec::new(),
        };

        let mut roots = Vec::new();
        let mut stack = Vec::new();
        for root in walk.inputs.clone() {
            roots.push(walk.visit(root, None, &mut stack)?);
        }

        // A real module is dropped in favor of any discovered module replacing it.
        let override_types: Vec<ModuleType> =
            walk.order.iter().copied().filter(|t| !t.replaces().is_empty()).collect();
        let mut replaced = Vec::new();
        walk.order.retain(|module_type| {
            match override_types.iter().find(|o| o.does_replace(module_type)) {
                Some(by) => {
                    replaced.push((*module_type, *by));
                    false
                }
                None => true,
            }
        });

        let mut modules: Vec<ModuleInstance> = Vec::with_capacity(walk.order.len());
        for module_type in &walk.order {
            let instance = self
                .inputs
                .iter()
                .find(|input| {
                    let input_type = input.module_type();
                    input_type == *module_type || input_type.does_replace(module_type)
                })
                .cloned()
                .or_else(|| {
                    if overrides_enabled {
                        module_type.default_override().and_then(|o| o.construct())
                    } else {
                        None
                    }
                })
                .or_else(|| module_type.construct());

            let Some(instance) = instance else {
                return Err(DiError::MissingModule {
                    module: module_type.name(),
                    path: walk.path_to(module_type),
                });
            };
            if modules.iter().any(|m| m.module_type() == instance.module_type()) {
                continue;
            }
            modules.push(instance);
        }

        debug!(
            modules = modules.len(),
            overrides = walk.overrides.len(),
            inherited = walk.inherited.len(),
            "built module dependency graph"
        );

        Ok(DependencyGraph {
            modules,
            sources: walk.sources,
            children: walk.children,
            roots,
            overrides: walk.overrides,
            inherited: walk.inherited,
            replaced,
        })
    }
}

struct Walk<'a> {
    inputs: Vec<ModuleType>,
    overrides_enabled: bool,
    registered_in_parent: Option<&'a (dyn Fn(&ModuleType) -> bool + Send + Sync)>,
    order: Vec<ModuleType>,
    present: HashSet<ModuleType>,
    sources: FastMap<ModuleType, Option<ModuleType>>,
    children: FastMap<ModuleType, Vec<Edge>>,
    overrides: Vec<Override>,
    inherited: Vec<ModuleType>,
}

impl Walk<'_> {
    fn visit(
        &mut self,
        requested: ModuleType,
        source: Option<ModuleType>,
        stack: &mut Vec<ModuleType>,
    ) -> DiResult<Edge> {
        let module = self.substitute(requested)?;

        if self.registered_in_parent.map_or(false, |check| check(&module)) {
            if !self.inherited.contains(&module) {
                self.inherited.push(module);
            }
            return Ok(Edge { requested, resolved: module, inherited: true });
        }
        if self.present.contains(&module) {
            return Ok(Edge { requested, resolved: module, inherited: false });
        }
        if let Some(start) = stack.iter().position(|m| *m == module) {
            let mut cycle: Vec<String> = stack[start..].iter().map(ModuleType::name).collect();
            cycle.push(module.name());
            return Err(DiError::ModuleCycle(cycle));
        }

        self.sources.entry(module).or_insert(source);
        stack.push(module);
        let mut edges = Vec::new();
        for dependency in module.dependencies() {
            edges.push(self.visit(dependency, Some(module), stack)?);
        }
        stack.pop();

        self.children.insert(module, edges);
        self.present.insert(module);
        self.order.push(module);
        Ok(Edge { requested, resolved: module, inherited: false })
    }

    fn substitute(&mut self, requested: ModuleType) -> DiResult<ModuleType> {
        // A caller-supplied replacement wins over any default override.
        if let Some(replacement) = self.inputs.iter().copied().find(|input| input.does_replace(&requested)) {
            self.record(requested, replacement, OverrideKind::Explicit);
            return Ok(replacement);
        }

        if !self.overrides_enabled || self.inputs.contains(&requested) {
            return Ok(requested);
        }
        let Some(replacement) = requested.default_override() else {
            return Ok(requested);
        };
        if !replacement.does_replace(&requested) {
            return Err(DiError::InvalidOverride {
                override_module: replacement.name(),
                module: requested.name(),
            });
        }
        self.record(requested, replacement, OverrideKind::Default);
        Ok(replacement)
    }

    fn record(&mut self, original: ModuleType, replacement: ModuleType, kind: OverrideKind) {
        let applied = Override { original, replacement, kind };
        if !self.overrides.contains(&applied) {
            if kind == OverrideKind::Default {
                warn!(module = %original, replacement = %replacement, "applying default module override");
            }
            self.overrides.push(applied);
        }
    }

    fn path_to(&self, module_type: &ModuleType) -> String {
        path_to(&self.sources, module_type)
    }
}

fn path_to(sources: &FastMap<ModuleType, Option<ModuleType>>, module_type: &ModuleType) -> String {
    let mut path = vec![module_type.name()];
    let mut current = *module_type;
    while let Some(Some(source)) = sources.get(&current) {
        if path.len() > sources.len() {
            break;
        }
        path.push(source.name());
        current = *source;
    }
    path.reverse();
    path.join(" -> ")
}

/// The ordered, instantiated module set produced by [`DependencyGraphBuilder`].
pub struct DependencyGraph {
    modules: Vec<ModuleInstance>,
    sources: FastMap<ModuleType, Option<ModuleType>>,
    children: FastMap<ModuleType, Vec<Edge>>,
    roots: Vec<Edge>,
    overrides: Vec<Override>,
    inherited: Vec<ModuleType>,
    replaced: Vec<(ModuleType, ModuleType)>,
}

impl DependencyGraph {
    /// Module instances in registration order.
    pub fn modules(&self) -> &[ModuleInstance] {
        &self.modules
    }

    /// Module types in registration order.
    pub fn module_types(&self) -> Vec<ModuleType> {
        self.modules.iter().map(ModuleInstance::module_type).collect()
    }

    /// The module that pulled `module_type` in, or `None` for roots and
    /// modules never discovered.
    pub fn source_of(&self, module_type: &ModuleType) -> Option<ModuleType> {
        self.sources.get(module_type).copied().flatten()
    }

    /// Discovery path from a root to `module_type`, e.g. `App -> Http -> Logging`.
    pub fn path_to(&self, module_type: &ModuleType) -> String {
        path_to(&self.sources, module_type)
    }

    /// Substitutions applied while walking the graph.
    pub fn overrides(&self) -> &[Override] {
        &self.overrides
    }

    /// Modules skipped because a parent assembler already registered them.
    pub fn inherited(&self) -> &[ModuleType] {
        &self.inherited
    }

    /// Whether the graph registers `module_type`, directly or through a
    /// module that replaces it.
    pub fn contains(&self, module_type: &ModuleType) -> bool {
        self.modules.iter().any(|m| {
            let t = m.module_type();
            t == *module_type || t.does_replace(module_type)
        })
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Human-readable tree of which module pulled in which.
    ///
    /// ```text
    /// App
    ///   Http
    ///     Logging
    ///   Storage => FakeStorage [default override]
    ///   Logging (see above)
    /// Registration order:
    ///   1. Logging
    ///   ...
    /// ```
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let mut expanded = HashSet::new();
        for root in &self.roots {
            self.describe_edge(root, 0, &mut expanded, &mut out);
        }
        out.push_str("Registration order:\n");
        for (index, module) in self.modules.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", index + 1, module.module_type());
        }
        if !self.replaced.is_empty() {
            out.push_str("Dropped:\n");
            for (module, by) in &self.replaced {
                let _ = writeln!(out, "  {} (replaced by {})", module, by);
            }
        }
        out
    }

    fn describe_edge(&self, edge: &Edge, depth: usize, expanded: &mut HashSet<ModuleType>, out: &mut String) {
        let indent = "  ".repeat(depth);
        let mut line = format!("{}{}", indent, edge.requested);
        if edge.resolved != edge.requested {
            let kind = self
                .overrides
                .iter()
                .find(|o| o.original == edge.requested && o.replacement == edge.resolved)
                .map_or("override", |o| o.kind.label());
            let _ = write!(line, " => {} [{}]", edge.resolved, kind);
        }
        if edge.inherited {
            line.push_str(" (registered in parent)");
            let _ = writeln!(out, "{}", line);
            return;
        }
        if let Some((_, by)) = self.replaced.iter().find(|(module, _)| *module == edge.resolved) {
            let _ = write!(line, " (replaced by {})", by);
        }
        if !expanded.insert(edge.resolved) {
            let has_children = self.children.get(&edge.resolved).map_or(false, |c| !c.is_empty());
            if has_children {
                line.push_str(" (see above)");
            }
            let _ = writeln!(out, "{}", line);
            return;
        }
        let _ = writeln!(out, "{}", line);
        if let Some(children) = self.children.get(&edge.resolved) {
            for child in children {
                self.describe_edge(child, depth + 1, expanded, out);
            }
        }
    }

    /// Serializes the graph (modules, provenance, overrides) to JSON.
    #[cfg(feature = "graph-export")]
    pub fn to_json(&self) -> DiResult<String> {
        #[derive(serde::Serialize)]
        struct OverrideExport {
            original: String,
            replacement: String,
            kind: &'static str,
        }

        #[derive(serde::Serialize)]
        struct ModuleExport {
            name: String,
            type_name: &'static str,
            source: Option<String>,
            dependencies: Vec<String>,
        }

        #[derive(serde::Serialize)]
        struct GraphExport {
            modules: Vec<ModuleExport>,
            overrides: Vec<OverrideExport>,
            inherited: Vec<String>,
        }

        let export = GraphExport {
            modules: self
                .modules
                .iter()
                .map(|m| {
                    let t = m.module_type();
                    ModuleExport {
                        name: t.name(),
                        type_name: t.type_name(),
                        source: self.source_of(&t).map(|s| s.name()),
                        dependencies: t.dependencies().iter().map(ModuleType::name).collect(),
                    }
                })
                .collect(),
            overrides: self
                .overrides
                .iter()
                .map(|o| OverrideExport {
                    original: o.original.name(),
                    replacement: o.replacement.name(),
                    kind: o.kind.label(),
                })
                .collect(),
            inherited: self.inherited.iter().map(ModuleType::name).collect(),
        };

        serde_json::to_string_pretty(&export)
            .map_err(|e| DiError::InvalidConfig(format!("graph serialization failed: {}", e)))
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("modules", &self.module_types())
            .field("overrides", &self.overrides)
            .finish()
    }
}
