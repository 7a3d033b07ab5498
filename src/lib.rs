//! # weft-di
//!
//! Module-based dependency injection: declare services in modules, let the
//! assembler compute which modules to register and in what order, and resolve
//! fully wired object graphs with well-defined scoping.
//!
//! ## Features
//!
//! - **Modules**: units of registration with declared dependencies, replacements and default overrides
//! - **Dependency graph builder**: topological ordering, diamond de-duplication, cycle reporting and provenance
//! - **Object scopes**: `Transient`, `Graph`, `Container` and `Weak` instance sharing
//! - **Circular object graphs**: two-phase construction through `init_completed` hooks
//! - **Hierarchical containers**: child containers shadow their parents
//! - **Behaviors**: duplicate detection, abstract-registration validation and service collections
//! - **Thread-safe**: one reentrant lock per container hierarchy
//!
//! ## Quick Start
//!
//! ```rust
//! use weft_di::{Container, DiResult, Module, ModuleAssembler, ModuleType, ObjectScope, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! struct DatabaseModule;
//! impl Module for DatabaseModule {
//!     fn assemble(&self, container: &Container) -> DiResult<()> {
//!         container.register::<Database, _>(ObjectScope::Container, |_| {
//!             Arc::new(Database { connection_string: "postgres://localhost".to_string() })
//!         });
//!         Ok(())
//!     }
//!     fn construct() -> Option<Self> {
//!         Some(DatabaseModule)
//!     }
//! }
//!
//! struct UserModule;
//! impl Module for UserModule {
//!     fn assemble(&self, container: &Container) -> DiResult<()> {
//!         container.register::<UserService, _>(ObjectScope::Graph, |r| {
//!             UserService { db: r.resolve_required::<Database>() }.into()
//!         });
//!         Ok(())
//!     }
//!     fn dependencies() -> Vec<ModuleType> {
//!         vec![ModuleType::of::<DatabaseModule>()]
//!     }
//! }
//!
//! // DatabaseModule is pulled in and registered before UserModule
//! let assembler = ModuleAssembler::builder().module(UserModule).build();
//! let users = assembler.resolve_required::<UserService>();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Object Scopes
//!
//! - **Transient**: Created fresh on every resolution
//! - **Graph**: Shared within one top-level resolve call (the default)
//! - **Container**: Created once and owned by the container
//! - **Weak**: Shared while some consumer still holds it
//!
//! ## Overrides
//!
//! ```rust
//! use weft_di::{Container, DiResult, Module, ModuleAssembler, ModuleType, ObjectScope, OverridePolicy, Resolver};
//! use std::sync::Arc;
//!
//! trait Mailer: Send + Sync { fn transport(&self) -> &'static str; }
//! struct Smtp;
//! impl Mailer for Smtp { fn transport(&self) -> &'static str { "smtp" } }
//! struct Recording;
//! impl Mailer for Recording { fn transport(&self) -> &'static str { "memory" } }
//!
//! struct MailModule;
//! impl Module for MailModule {
//!     fn assemble(&self, c: &Container) -> DiResult<()> {
//!         c.register::<dyn Mailer, _>(ObjectScope::Container, |_| Arc::new(Smtp));
//!         Ok(())
//!     }
//!     fn default_override() -> Option<ModuleType> { Some(ModuleType::of::<FakeMailModule>()) }
//!     fn construct() -> Option<Self> { Some(MailModule) }
//! }
//!
//! struct FakeMailModule;
//! impl Module for FakeMailModule {
//!     fn assemble(&self, c: &Container) -> DiResult<()> {
//!         c.register::<dyn Mailer, _>(ObjectScope::Container, |_| Arc::new(Recording));
//!         Ok(())
//!     }
//!     fn replaces() -> Vec<ModuleType> { vec![ModuleType::of::<MailModule>()] }
//!     fn construct() -> Option<Self> { Some(FakeMailModule) }
//! }
//!
//! struct App;
//! impl Module for App {
//!     fn assemble(&self, _: &Container) -> DiResult<()> { Ok(()) }
//!     fn dependencies() -> Vec<ModuleType> { vec![ModuleType::of::<MailModule>()] }
//! }
//!
//! let production = ModuleAssembler::builder().module(App).build();
//! assert_eq!(production.resolve_required::<dyn Mailer>().transport(), "smtp");
//!
//! let test = ModuleAssembler::builder()
//!     .override_policy(OverridePolicy::Contextual)
//!     .testing(true)
//!     .module(App)
//!     .build();
//! assert_eq!(test.resolve_required::<dyn Mailer>().transport(), "memory");
//! ```

// Module declarations
pub mod assembler;
pub mod behavior;
pub mod config;
pub mod error;
pub mod graph;
pub mod key;
pub mod module;
pub mod object_scope;
pub mod provider;
pub mod traits;

// Internal modules
mod internal;
mod registration;

// Re-export core types
pub use assembler::{ModuleAssembler, ModuleAssemblerBuilder};
pub use behavior::{
    AbstractRegistrationContainer, Behavior, DuplicateCallback, DuplicateRegistrationDetector, LoggingBehavior,
    ServiceCollection, ServiceCollector,
};
pub use config::AssemblerConfig;
pub use error::{DiError, DiResult, UnfulfilledAbstract};
pub use graph::{DependencyGraph, DependencyGraphBuilder, Override, OverrideKind, OverridePolicy};
pub use internal::ObjectGraphId;
pub use key::Key;
pub use module::{Module, ModuleInstance, ModuleType, ResolverScope, RootScope};
pub use object_scope::ObjectScope;
pub use provider::{Container, EntryHandle, ResolverContext, WeakResolver};
pub use traits::{Resolver, ResolverCore};
