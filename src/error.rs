//! Error types for module assembly and service resolution.

use thiserror::Error;

use crate::key::Key;

/// Dependency injection errors.
///
/// Structural errors (`MissingModule`, `InvalidOverride`, `ScopeMismatch`,
/// `ModuleCycle`) come out of assembling a module graph. Validation and
/// resolution errors come out of a finished container.
///
/// # Examples
///
/// ```rust
/// use weft_di::{Container, DiError, Resolver};
///
/// let container = Container::new();
/// match container.try_resolve::<String>() {
///     Err(DiError::ResolutionFailure(key)) => assert_eq!(key.to_string(), "String"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// No registration for the key in the container or any ancestor
    #[error("Service not found: {0}")]
    ResolutionFailure(Key),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// A weak resolver outlived the container backing it
    #[error("Container already released while resolving {0}")]
    ReleasedContainer(Key),
    /// Resolution recursed past the configured maximum depth
    #[error(
        "Maximum resolution depth {depth} exceeded while resolving {key}. This usually means a \
         circular dependency; construct one side first and complete it from an `init_completed` hook"
    )]
    CycleDepthExceeded { depth: usize, key: Key },
    /// A required module was neither supplied nor auto-constructible
    #[error("Missing module {module} (dependency path: {path})")]
    MissingModule { module: String, path: String },
    /// An override module does not declare the module it stands in for
    #[error("{override_module} cannot override {module}: {module} is not listed in its `replaces`")]
    InvalidOverride { override_module: String, module: String },
    /// A module belongs to a different resolver scope than the assembler
    #[error("Module {module} targets resolver scope {actual}, but the assembler builds {expected}")]
    ScopeMismatch { module: String, expected: String, actual: String },
    /// Modules depend on each other in a cycle
    #[error("Module dependency cycle: {}", .0.join(" -> "))]
    ModuleCycle(Vec<String>),
    /// A key was registered twice in the same container
    #[error("Duplicate registration for {0}")]
    DuplicateRegistration(Key),
    /// Abstract registrations without a concrete registration
    #[error("{}", describe_unfulfilled(.0))]
    AbstractRegistrationUnfulfilled(Vec<UnfulfilledAbstract>),
    /// A module's registration procedure failed
    #[error("Module {module} failed to assemble: {message}")]
    Assembly { module: String, message: String },
    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// An abstract registration that never received a concrete registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnfulfilledAbstract {
    /// The key that still needs a concrete registration
    pub key: Key,
    /// Where the abstract registration was declared (`file:line`)
    pub source_label: String,
}

fn describe_unfulfilled(list: &[UnfulfilledAbstract]) -> String {
    let mut out = format!("{} abstract registration(s) were not fulfilled:", list.len());
    for item in list {
        out.push_str(&format!("\n  - {} (declared at {})", item.key, item.source_label));
    }
    out
}

/// Result type for DI operations
///
/// # Examples
///
/// ```rust
/// use weft_di::{DiResult, DiError, Key};
///
/// fn lookup() -> DiResult<()> {
///     Err(DiError::ResolutionFailure(Key::of::<u8>()))
/// }
///
/// assert!(lookup().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
